//! Time-based interpolations used while the slider settles onto a stop.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Linear,
    EaseInOut,
}

impl Curve {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Curve::Linear => t,
            Curve::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tween {
    pub from: f64,
    pub to: f64,
    pub start: Instant,
    pub duration: Duration,
    pub curve: Curve,
}

impl Tween {
    pub fn new(from: f64, to: f64, start: Instant, duration: Duration, curve: Curve) -> Self {
        Self {
            from,
            to,
            start,
            duration,
            curve,
        }
    }

    /// Current value and whether the tween has finished.
    pub fn sample(&self, now: Instant) -> (f64, bool) {
        let elapsed = now.saturating_duration_since(self.start);
        if self.duration.is_zero() || elapsed >= self.duration {
            return (self.to, true);
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        (self.from + (self.to - self.from) * self.curve.apply(t), false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettleFrame {
    pub head: f64,
    pub tail: f64,
    /// Set exactly once: on the frame where the tail has landed and the head
    /// has landed too.
    pub evaluate: bool,
    pub finished: bool,
}

/// Head and tail tweens converging on one stop, joined explicitly.
///
/// The head never lands after the tail: `head.duration = max(min, tail.duration)`.
/// Sequence evaluation is armed when the tail lands and fires at the join,
/// so it always observes the head on its final position.
#[derive(Debug, Clone)]
pub struct SettlePair {
    pub stop: usize,
    head: Tween,
    tail: Tween,
    tail_landed: bool,
    evaluated: bool,
}

impl SettlePair {
    pub fn new(
        stop: usize,
        target: f64,
        head_from: f64,
        tail_from: f64,
        speed: f64,
        min_head: Duration,
        now: Instant,
    ) -> Self {
        let tail_duration = travel_time(tail_from, target, speed);
        let head_duration = min_head.max(tail_duration);
        Self {
            stop,
            head: Tween::new(head_from, target, now, head_duration, Curve::EaseInOut),
            tail: Tween::new(tail_from, target, now, tail_duration, Curve::Linear),
            tail_landed: false,
            evaluated: false,
        }
    }

    pub fn head_duration(&self) -> Duration {
        self.head.duration
    }

    pub fn tail_duration(&self) -> Duration {
        self.tail.duration
    }

    pub fn target(&self) -> f64 {
        self.tail.to
    }

    pub fn poll(&mut self, now: Instant) -> SettleFrame {
        let (head, head_done) = self.head.sample(now);
        let (tail, tail_done) = self.tail.sample(now);
        if tail_done {
            self.tail_landed = true;
        }
        let evaluate = self.tail_landed && head_done && !self.evaluated;
        if evaluate {
            self.evaluated = true;
        }
        SettleFrame {
            head,
            tail,
            evaluate,
            finished: head_done && tail_done,
        }
    }
}

/// Constant-speed travel time between two positions; zero when coincident.
/// Saturates at `Duration::MAX` for distances no clock could cover.
pub fn travel_time(from: f64, to: f64, speed: f64) -> Duration {
    let distance = (to - from).abs();
    if distance == 0.0 || speed <= 0.0 || !distance.is_finite() {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(distance / speed).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ease_in_out_is_symmetric_and_pinned() {
        let c = Curve::EaseInOut;
        assert_eq!(c.apply(0.0), 0.0);
        assert_eq!(c.apply(1.0), 1.0);
        assert!((c.apply(0.5) - 0.5).abs() < 1e-12);
        assert!((c.apply(0.25) + c.apply(0.75) - 1.0).abs() < 1e-12);
        assert!(c.apply(0.1) < Curve::Linear.apply(0.1));
    }

    #[test]
    fn zero_duration_tween_finishes_immediately() {
        let now = Instant::now();
        let t = Tween::new(10.0, 10.0, now, Duration::ZERO, Curve::Linear);
        assert_eq!(t.sample(now), (10.0, true));
    }

    #[test]
    fn linear_tween_midpoint() {
        let now = Instant::now();
        let t = Tween::new(0.0, 100.0, now, Duration::from_secs(2), Curve::Linear);
        let (v, done) = t.sample(now + Duration::from_secs(1));
        assert!(!done);
        assert!((v - 50.0).abs() < 1e-9);
        assert_eq!(t.sample(now + Duration::from_secs(3)), (100.0, true));
    }

    #[test]
    fn head_duration_is_at_least_tail_duration() {
        let now = Instant::now();
        let long = SettlePair::new(3, 315.0, 301.0, 200.0, 37.8, Duration::from_secs(3), now);
        assert_eq!(long.head_duration(), long.tail_duration());
        assert!((long.tail_duration().as_secs_f64() - 115.0 / 37.8).abs() < 1e-6);

        let short = SettlePair::new(3, 315.0, 301.0, 310.0, 37.8, Duration::from_secs(3), now);
        assert_eq!(short.head_duration(), Duration::from_secs(3));
        assert!(short.tail_duration() < short.head_duration());
    }

    #[test]
    fn huge_distance_saturates_instead_of_overflowing() {
        assert_eq!(travel_time(0.0, 1e29, 37.8), Duration::MAX);

        let now = Instant::now();
        let mut pair = SettlePair::new(0, 15.0, 1e29, 1e29, 37.8, Duration::from_secs(3), now);
        assert_eq!(pair.tail_duration(), Duration::MAX);
        let f = pair.poll(now + Duration::from_secs(1));
        assert!(f.tail.is_finite());
        assert!(!f.finished);
    }

    #[test]
    fn evaluation_fires_once_at_the_join() {
        let now = Instant::now();
        let mut pair = SettlePair::new(0, 15.0, 40.0, 15.0, 37.8, Duration::from_secs(3), now);

        let f = pair.poll(now + Duration::from_millis(10));
        assert_eq!(f.tail, 15.0);
        assert!(!f.evaluate);
        assert!(!f.finished);

        let f = pair.poll(now + Duration::from_secs(3));
        assert!(f.evaluate);
        assert!(f.finished);
        assert_eq!(f.head, 15.0);

        let f = pair.poll(now + Duration::from_secs(4));
        assert!(!f.evaluate);
    }
}
