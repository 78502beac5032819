//! Cancellable per-frame task driving the tail chase.
//!
//! At most one run is live at a time. Every run is tagged with a generation;
//! a token from a cancelled or superseded run never matches again.

use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameToken(u64);

#[derive(Debug, Default)]
pub struct FrameLoop {
    generation: u64,
    current: Option<FrameToken>,
    last_frame: Option<Instant>,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever is running, then start a fresh run.
    pub fn start(&mut self) -> FrameToken {
        self.cancel();
        self.generation += 1;
        let token = FrameToken(self.generation);
        self.current = Some(token);
        token
    }

    /// Returns true if a run was actually cancelled.
    pub fn cancel(&mut self) -> bool {
        self.last_frame = None;
        self.current.take().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_current(&self, token: FrameToken) -> bool {
        self.current == Some(token)
    }

    /// Frame delta in seconds; `0.0` on the first frame of a run.
    pub fn advance(&mut self, now: Instant) -> Option<f64> {
        self.current?;
        let dt = match self.last_frame {
            Some(prev) => now.saturating_duration_since(prev).as_secs_f64(),
            None => 0.0,
        };
        self.last_frame = Some(now);
        Some(dt)
    }
}
