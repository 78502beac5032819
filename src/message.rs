//! Outbound control messages and their wire payloads.

pub const CONTROL_TOPIC: &str = "zotac/pico/control";
pub const FADE_TOPIC: &str = "zotac/pico/fading";

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Normalized tail position in `[0, 1]`.
    Position(f64),
    /// Zero-based stop index; rendered 1-based on the wire.
    SequenceTrigger(usize),
    /// Legacy `geste_{segment}_{direction}` token.
    Gesture(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Control,
    Fade,
}

impl Outbound {
    pub fn stream(&self) -> Stream {
        match self {
            Outbound::Position(_) => Stream::Fade,
            Outbound::SequenceTrigger(_) | Outbound::Gesture(_) => Stream::Control,
        }
    }

    pub fn payload(&self) -> String {
        match self {
            Outbound::Position(v) => format_fade(*v),
            Outbound::SequenceTrigger(i) => format!("Initialize Sequence {}", i + 1),
            Outbound::Gesture(token) => token.clone(),
        }
    }
}

pub fn format_fade(v: f64) -> String {
    let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
    format!("{v:.3}")
}

/// `tail / width`, clamped; `None` while the width is degenerate.
pub fn normalize(tail: f64, width: f64) -> Option<f64> {
    if width <= 0.0 || !tail.is_finite() {
        return None;
    }
    Some((tail / width).clamp(0.0, 1.0))
}
