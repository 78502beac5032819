//! Fire-and-forget emission of outbound messages.

use log::{debug, info, warn};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::message::{Outbound, Stream};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Anything that can push a text payload onto a topic.
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError>;

    fn close(&mut self) {}
}

#[derive(Debug, Clone)]
pub struct Topics {
    pub control: String,
    pub fade: String,
}

impl Topics {
    fn for_stream(&self, s: Stream) -> &str {
        match s {
            Stream::Control => &self.control,
            Stream::Fade => &self.fade,
        }
    }
}

/// Monotonic-clock gate. Calls inside the window are rejected, not deferred.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        let open = match self.last {
            Some(prev) => now.saturating_duration_since(prev) > self.interval,
            None => true,
        };
        if open {
            self.last = Some(now);
        }
        open
    }

    /// The last-open timestamp is kept, so a shorter interval cannot burst.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }
}

pub struct Emitter {
    publisher: Box<dyn Publisher>,
    topics: Topics,
    connected: bool,
    initial_fade: f64,
    initial_published: bool,
    position_gate: Throttle,
}

impl Emitter {
    pub fn new(
        publisher: Box<dyn Publisher>,
        topics: Topics,
        throttle: Duration,
        initial_fade: f64,
    ) -> Self {
        Self {
            publisher,
            topics,
            connected: false,
            initial_fade,
            initial_published: false,
            position_gate: Throttle::new(throttle),
        }
    }

    pub fn set_topics(&mut self, topics: Topics) {
        self.topics = topics;
    }

    pub fn close(&mut self) {
        self.connected = false;
        self.publisher.close();
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        if connected != self.connected {
            info!(
                "outbound channel {}",
                if connected { "connected" } else { "disconnected" }
            );
        }
        self.connected = connected;
    }

    /// Publishes the resting position once per process. Stays armed until the
    /// channel is up; the caller decides when geometry is ready for it.
    pub fn publish_initial(&mut self) -> bool {
        if !self.connected || self.initial_published {
            return false;
        }
        self.initial_published = true;
        self.emit(&Outbound::Position(self.initial_fade))
    }

    pub fn set_throttle(&mut self, interval: Duration) {
        self.position_gate.set_interval(interval);
    }

    pub fn set_initial_fade(&mut self, value: f64) {
        self.initial_fade = value;
    }

    /// Throttled position emission. Returns true if a publish was attempted.
    pub fn emit_position(&mut self, value: f64, now: Instant) -> bool {
        if !self.position_gate.ready(now) {
            return false;
        }
        self.emit(&Outbound::Position(value))
    }

    /// Best effort: failures are logged and dropped.
    pub fn emit(&mut self, msg: &Outbound) -> bool {
        let topic = self.topics.for_stream(msg.stream());
        let payload = msg.payload();
        if !self.connected {
            debug!("dropping {topic} <- {payload}: not connected");
            return false;
        }
        match self.publisher.publish(topic, &payload) {
            Ok(()) => {
                debug!("published {topic} <- {payload}");
                true
            }
            Err(e) => {
                warn!("publish to {topic} failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    pub type Log = Rc<RefCell<Vec<(String, String)>>>;

    pub struct Recorder {
        pub log: Log,
        pub fail: bool,
    }

    impl Publisher for Recorder {
        fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::Rejected("broker said no".into()));
            }
            self.log
                .borrow_mut()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    pub fn recording_emitter(throttle_ms: u64) -> (Emitter, Log) {
        let log: Log = Rc::default();
        let rec = Recorder {
            log: log.clone(),
            fail: false,
        };
        let topics = Topics {
            control: crate::message::CONTROL_TOPIC.into(),
            fade: crate::message::FADE_TOPIC.into(),
        };
        (
            Emitter::new(
                Box::new(rec),
                topics,
                Duration::from_millis(throttle_ms),
                0.5,
            ),
            log,
        )
    }
}
