//! Legacy swipe/tap classification for the `geste_*` control messages.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Tap,
    Right,
    Left,
    Down,
    Up,
}

impl Direction {
    pub fn token(self) -> &'static str {
        match self {
            Direction::Tap => "tap",
            Direction::Right => "rechts",
            Direction::Left => "links",
            Direction::Down => "runter",
            Direction::Up => "hoch",
        }
    }
}

/// Classify a net drag offset. Screen coordinates: positive `dy` points down.
pub fn classify(dx: f64, dy: f64, min_dist: f64) -> Direction {
    let ax = dx.abs();
    let ay = dy.abs();
    if ax <= min_dist && ay <= min_dist {
        return Direction::Tap;
    }
    if ax >= ay {
        if dx > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        }
    } else if dy > 0.0 {
        Direction::Down
    } else {
        Direction::Up
    }
}

pub fn gesture_token(segment: &str, direction: Direction) -> String {
    format!("geste_{segment}_{}", direction.token())
}
