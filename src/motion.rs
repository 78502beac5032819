//! Dual-cursor motion model: the head follows the pointer, the tail chases it.

use serde::Serialize;

use crate::geometry::Track;

/// 37.8 px/cm at 1 cm/s.
pub const DEFAULT_MAX_SPEED: f64 = 37.8;
pub const DEFAULT_STIFFNESS: f64 = 4.0;
pub const DEFAULT_DEADBAND: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChaseParams {
    pub max_speed: f64,
    pub stiffness: f64,
    pub deadband: f64,
}

impl Default for ChaseParams {
    fn default() -> Self {
        Self {
            max_speed: DEFAULT_MAX_SPEED,
            stiffness: DEFAULT_STIFFNESS,
            deadband: DEFAULT_DEADBAND,
        }
    }
}

/// Visually stretched slider body as (offset, length).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Span {
    pub offset: f64,
    pub length: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CursorPair {
    pub head: f64,
    pub tail: f64,
    pub tail_velocity: f64,
}

impl CursorPair {
    pub fn resting_at(x: f64) -> Self {
        Self {
            head: x,
            tail: x,
            tail_velocity: 0.0,
        }
    }

    pub fn set_head_clamped(&mut self, x: f64, track: &Track) {
        self.head = track.clamp(x);
    }

    /// Unclamped; used when a settle animation drives the head onto a stop.
    pub fn set_head(&mut self, x: f64) {
        self.head = x;
    }

    pub fn set_tail(&mut self, x: f64) {
        self.tail = x;
    }

    pub fn span(&self, handle_size: f64) -> Span {
        Span {
            offset: self.head.min(self.tail) - handle_size / 2.0,
            length: (self.head - self.tail).abs() + handle_size,
        }
    }

    pub fn coincident(&self, tolerance: f64) -> bool {
        (self.head - self.tail).abs() < tolerance
    }

    /// One frame of the tail-follow integration. Returns true if the tail moved.
    pub fn step(&mut self, dt: f64, p: &ChaseParams) -> bool {
        let distance = self.head - self.tail;
        if distance.abs() < p.deadband {
            self.tail_velocity = 0.0;
            return false;
        }
        if dt <= 0.0 {
            return false;
        }

        let target_velocity = distance.signum() * p.max_speed;
        let easing = 1.0 - (-p.stiffness * dt).exp();
        self.tail_velocity += (target_velocity - self.tail_velocity) * easing;

        let before = self.tail;
        self.tail += self.tail_velocity * dt;

        // contact stop: the tail may reach the head but never pass it
        let overshot = (distance > 0.0 && self.tail > self.head)
            || (distance < 0.0 && self.tail < self.head);
        if overshot {
            self.tail = self.head;
            self.tail_velocity = 0.0;
        }
        self.tail != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_is_envelope_of_head_and_tail() {
        let c = CursorPair {
            head: 301.0,
            tail: 200.0,
            tail_velocity: 0.0,
        };
        assert_eq!(
            c.span(30.0),
            Span {
                offset: 185.0,
                length: 131.0
            }
        );
        let r = CursorPair::resting_at(315.0);
        assert_eq!(r.span(30.0).length, 30.0);
    }

    #[test]
    fn deadband_zeroes_velocity() {
        let mut c = CursorPair {
            head: 100.5,
            tail: 100.0,
            tail_velocity: 12.0,
        };
        assert!(!c.step(0.016, &ChaseParams::default()));
        assert_eq!(c.tail_velocity, 0.0);
        assert_eq!(c.tail, 100.0);
    }

    #[test]
    fn tail_accelerates_toward_head() {
        let mut c = CursorPair {
            head: 500.0,
            tail: 100.0,
            tail_velocity: 0.0,
        };
        let p = ChaseParams::default();
        let mut last_v = 0.0;
        for _ in 0..30 {
            assert!(c.step(1.0 / 60.0, &p));
            assert!(c.tail_velocity > last_v);
            assert!(c.tail_velocity <= p.max_speed);
            last_v = c.tail_velocity;
        }
        assert!(c.tail > 100.0 && c.tail < 500.0);
    }

    #[test]
    fn tail_never_crosses_head() {
        let p = ChaseParams::default();
        let mut c = CursorPair {
            head: 103.0,
            tail: 100.0,
            tail_velocity: 400.0,
        };
        for dt in [0.016, 0.05, 0.2, 1.0, 0.001] {
            let before = (c.head - c.tail).signum();
            c.step(dt, &p);
            let after = c.head - c.tail;
            assert!(after == 0.0 || after.signum() == before);
        }
        assert_eq!(c.tail, c.head);
        assert_eq!(c.tail_velocity, 0.0);
    }

    #[test]
    fn framerate_independent_convergence() {
        let p = ChaseParams::default();
        let run = |dt: f64| {
            let mut c = CursorPair {
                head: 600.0,
                tail: 0.0,
                tail_velocity: 0.0,
            };
            let steps = (2.0 / dt).round() as usize;
            for _ in 0..steps {
                c.step(dt, &p);
            }
            c.tail
        };
        let fast = run(1.0 / 120.0);
        let slow = run(1.0 / 30.0);
        assert!((fast - slow).abs() < 2.0, "{fast} vs {slow}");
    }
}
