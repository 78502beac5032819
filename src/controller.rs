//! Gesture lifecycle and emission policy for the two-point slider.
//!
//! `Idle -> Dragging -> Settling -> Idle`. While dragging, the head follows the
//! pointer and a frame task pulls the tail after it. On release both ends are
//! animated onto the closest stop; when they meet exactly on a stop the stop's
//! sequence is triggered.

use log::debug;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::classify::{self, gesture_token};
use crate::config::Profile;
use crate::emitter::{Emitter, Topics};
use crate::frames::{FrameLoop, FrameToken};
use crate::geometry::Track;
use crate::message::{self, Outbound};
use crate::motion::{ChaseParams, CursorPair, Span};
use crate::transport::TransportEvent;
use crate::tween::{SettleFrame, SettlePair};

#[derive(Debug, Clone)]
pub struct Settings {
    pub handle_size: f64,
    pub stop_count: usize,
    pub segments: Vec<String>,
    pub chase: ChaseParams,
    pub settle_min: Duration,
    pub snap_tolerance: f64,
    pub activation: Duration,
    pub throttle: Duration,
    pub initial_fade: f64,
    pub legacy_gestures: bool,
    pub tap_min_dist: f64,
}

impl Settings {
    pub fn from_profile(p: &Profile) -> Self {
        Self {
            handle_size: p.track.handle_size,
            stop_count: p.track.stop_count,
            segments: p.track.segments.clone(),
            chase: p.chase_params(),
            settle_min: Duration::from_millis(p.motion.settle_min_ms),
            snap_tolerance: p.motion.snap_tolerance,
            activation: Duration::from_millis(p.emission.activation_ms),
            throttle: Duration::from_millis(p.emission.throttle_ms),
            initial_fade: p.emission.initial_fade,
            legacy_gestures: p.emission.legacy_gestures,
            tap_min_dist: p.emission.tap_min_dist,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DragSession {
    /// Pointer position at pointer-down, container-local.
    pub start: (f64, f64),
    chase: FrameToken,
}

#[derive(Debug)]
pub enum Phase {
    Idle,
    Dragging(DragSession),
    Settling(SettlePair),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Dragging(_) => "dragging",
            Phase::Settling(_) => "settling",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SliderStatus {
    pub phase: &'static str,
    pub width: f64,
    pub head: f64,
    pub tail: f64,
    pub span: Span,
    pub stops: Vec<f64>,
    pub active: Vec<bool>,
    pub chasing: bool,
    pub connected: bool,
}

pub struct SliderController {
    settings: Settings,
    track: Track,
    cursors: CursorPair,
    phase: Phase,
    frames: FrameLoop,
    emitter: Emitter,
    activation: Vec<Option<Instant>>,
}

impl SliderController {
    pub fn new(settings: Settings, width: f64, emitter: Emitter) -> Self {
        let mut c = Self {
            track: Track::new(0.0, settings.handle_size, settings.stop_count),
            settings,
            cursors: CursorPair::default(),
            phase: Phase::Idle,
            frames: FrameLoop::new(),
            emitter,
            activation: Vec::new(),
        };
        c.set_width(width);
        c
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn cursors(&self) -> &CursorPair {
        &self.cursors
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn span(&self) -> Span {
        self.cursors.span(self.settings.handle_size)
    }

    pub fn is_chasing(&self) -> bool {
        self.frames.is_running()
    }

    pub fn is_activated(&self, stop: usize, now: Instant) -> bool {
        self.activation
            .get(stop)
            .copied()
            .flatten()
            .is_some_and(|until| now < until)
    }

    /// Swap in new settings (profile reload). Geometry is rebuilt from scratch.
    pub fn reconfigure(&mut self, settings: Settings, width: f64) {
        self.emitter.set_throttle(settings.throttle);
        self.emitter.set_initial_fade(settings.initial_fade);
        self.settings = settings;
        self.set_width(width);
    }

    /// Layout change: recompute stops and return to the resting position.
    pub fn set_width(&mut self, width: f64) {
        self.frames.cancel();
        self.phase = Phase::Idle;
        self.track = Track::new(width, self.settings.handle_size, self.settings.stop_count);
        self.activation = vec![None; self.track.stop_count()];
        self.cursors = match self.track.resting_position() {
            Some(rest) if self.track.is_valid() => CursorPair::resting_at(rest),
            _ => CursorPair::default(),
        };
        debug!(
            "layout: width={} stops={:?}",
            self.track.width,
            self.track.stops()
        );
        self.publish_initial();
    }

    /// The resting fade is held back until the track has a usable width.
    fn publish_initial(&mut self) {
        if self.track.is_valid() {
            self.emitter.publish_initial();
        }
    }

    pub fn on_transport(&mut self, evt: &TransportEvent) {
        match evt {
            TransportEvent::Connected => {
                self.emitter.set_connected(true);
                self.publish_initial();
            }
            TransportEvent::Disconnected(reason) => {
                debug!("transport down: {reason}");
                self.emitter.set_connected(false);
            }
        }
    }

    pub fn pointer_down(&mut self, x: f64, y: f64, _now: Instant) {
        if !self.track.is_valid() {
            return;
        }
        if let Phase::Dragging(_) = self.phase {
            debug!("pointer down ignored: gesture already active");
            return;
        }
        // head jumps to the pointer; the tail stays where it last rested
        self.cursors.set_head_clamped(x, &self.track);
        self.cursors.tail_velocity = 0.0;
        let chase = self.frames.start();
        self.phase = Phase::Dragging(DragSession {
            start: (x, y),
            chase,
        });
        debug!("drag start at ({x:.1}, {y:.1})");
    }

    pub fn pointer_move(&mut self, x: f64, _y: f64, _now: Instant) {
        if let Phase::Dragging(_) = self.phase {
            self.cursors.set_head_clamped(x, &self.track);
        }
    }

    pub fn pointer_up(&mut self, x: f64, y: f64, now: Instant) {
        let Phase::Dragging(session) = &self.phase else {
            return;
        };
        let start = session.start;
        if self.settings.legacy_gestures {
            self.emit_legacy_gesture(start, (x, y));
        }
        self.begin_settle(now);
    }

    /// Pointer lost mid-drag: snap like a release, without the legacy token.
    pub fn pointer_cancel(&mut self, now: Instant) {
        if let Phase::Dragging(_) = self.phase {
            self.begin_settle(now);
        }
    }

    pub fn set_topics(&mut self, topics: Topics) {
        self.emitter.set_topics(topics);
    }

    /// Teardown: no frame step or settle sample runs after this.
    pub fn shutdown(&mut self) {
        self.frames.cancel();
        self.phase = Phase::Idle;
        self.emitter.close();
    }

    pub fn tick(&mut self, now: Instant) {
        self.expire_activations(now);
        match &mut self.phase {
            Phase::Idle => {}
            Phase::Dragging(session) => {
                let token = session.chase;
                self.chase_frame(token, now);
            }
            Phase::Settling(pair) => {
                let frame = pair.poll(now);
                self.settle_frame(frame, now);
            }
        }
    }

    pub fn snapshot(&self, now: Instant) -> SliderStatus {
        SliderStatus {
            phase: self.phase.name(),
            width: self.track.width,
            head: self.cursors.head,
            tail: self.cursors.tail,
            span: self.span(),
            stops: self.track.stops().to_vec(),
            active: (0..self.activation.len())
                .map(|i| self.is_activated(i, now))
                .collect(),
            chasing: self.is_chasing(),
            connected: self.emitter.is_connected(),
        }
    }

    fn begin_settle(&mut self, now: Instant) {
        self.frames.cancel();
        self.cursors.tail_velocity = 0.0;
        let Some(stop) = self.track.closest_stop(self.cursors.head) else {
            self.phase = Phase::Idle;
            return;
        };
        let pair = SettlePair::new(
            stop,
            self.track.stops()[stop],
            self.cursors.head,
            self.cursors.tail,
            self.settings.chase.max_speed,
            self.settings.settle_min,
            now,
        );
        debug!(
            "settle to stop {} ({:.1}px): head {:?}, tail {:?}",
            pair.stop,
            pair.target(),
            pair.head_duration(),
            pair.tail_duration()
        );
        self.phase = Phase::Settling(pair);
    }

    fn chase_frame(&mut self, token: FrameToken, now: Instant) {
        if !self.frames.is_current(token) {
            return;
        }
        let Some(dt) = self.frames.advance(now) else {
            return;
        };
        if self.cursors.step(dt, &self.settings.chase) {
            self.emit_position(now);
        }
    }

    fn settle_frame(&mut self, frame: SettleFrame, now: Instant) {
        self.cursors.set_head(frame.head);
        let moved = self.cursors.tail != frame.tail;
        self.cursors.set_tail(frame.tail);
        if moved {
            self.emit_position(now);
        }
        if frame.evaluate {
            self.evaluate_sequence(now);
        }
        if frame.finished {
            debug!("settled at {:.1}", self.cursors.tail);
            self.phase = Phase::Idle;
        }
    }

    fn evaluate_sequence(&mut self, now: Instant) {
        let tol = self.settings.snap_tolerance;
        let span = self.span();
        let minimal = (span.length - self.settings.handle_size).abs() < tol;
        if !(minimal && self.cursors.coincident(tol)) {
            return;
        }
        let Some(stop) = self.track.stop_at(self.cursors.head, tol) else {
            return;
        };
        debug!("sequence {} activated", stop + 1);
        self.emitter.emit(&Outbound::SequenceTrigger(stop));
        if let Some(slot) = self.activation.get_mut(stop) {
            *slot = Some(now + self.settings.activation);
        }
    }

    fn expire_activations(&mut self, now: Instant) {
        for slot in &mut self.activation {
            if slot.is_some_and(|until| now >= until) {
                *slot = None;
            }
        }
    }

    fn emit_position(&mut self, now: Instant) {
        if let Some(v) = message::normalize(self.cursors.tail, self.track.width) {
            self.emitter.emit_position(v, now);
        }
    }

    fn emit_legacy_gesture(&mut self, start: (f64, f64), end: (f64, f64)) {
        let Some(segment) = self.track.segment_at(start.0, &self.settings.segments) else {
            return;
        };
        let direction = classify::classify(
            end.0 - start.0,
            end.1 - start.1,
            self.settings.tap_min_dist,
        );
        let token = gesture_token(segment, direction);
        debug!("legacy gesture {token}");
        self.emitter.emit(&Outbound::Gesture(token));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::testing::{Log, recording_emitter};
    use crate::message::{CONTROL_TOPIC, FADE_TOPIC};

    const FRAME: Duration = Duration::from_millis(16);

    fn controller(legacy: bool) -> (SliderController, Log) {
        let mut profile = Profile::builtin().unwrap();
        profile.emission.legacy_gestures = legacy;
        let (emitter, log) = recording_emitter(50);
        let mut c = SliderController::new(Settings::from_profile(&profile), 630.0, emitter);
        c.on_transport(&TransportEvent::Connected);
        (c, log)
    }

    fn run_until_idle(c: &mut SliderController, mut now: Instant, limit: Duration) -> Instant {
        let end = now + limit;
        while now < end {
            now += FRAME;
            c.tick(now);
            if let Phase::Idle = c.phase() {
                break;
            }
        }
        now
    }

    fn control_messages(log: &Log) -> Vec<String> {
        log.borrow()
            .iter()
            .filter(|(t, _)| t == CONTROL_TOPIC)
            .map(|(_, p)| p.clone())
            .collect()
    }

    #[test]
    fn starts_resting_on_middle_stop_and_publishes_initial_fade() {
        let (c, log) = controller(false);
        assert_eq!(c.cursors().head, 315.0);
        assert_eq!(c.cursors().tail, 315.0);
        assert_eq!(
            log.borrow()[0],
            (FADE_TOPIC.to_string(), "0.500".to_string())
        );
    }

    #[test]
    fn release_with_lagging_tail_triggers_sequence_four() {
        let (mut c, log) = controller(false);
        let t0 = Instant::now();
        c.pointer_down(301.0, 40.0, t0);
        c.cursors.tail = 200.0;
        c.pointer_up(301.0, 40.0, t0);

        let Phase::Settling(pair) = c.phase() else {
            panic!("expected settling");
        };
        assert_eq!(pair.stop, 3);
        assert!((pair.tail_duration().as_secs_f64() - 115.0 / 37.8).abs() < 1e-6);
        assert!(pair.head_duration() >= Duration::from_secs(3));

        let done = run_until_idle(&mut c, t0, Duration::from_secs(5));
        assert!(matches!(c.phase(), Phase::Idle));
        assert_eq!(c.cursors().head, 315.0);
        assert_eq!(c.cursors().tail, 315.0);
        assert_eq!(control_messages(&log), vec!["Initialize Sequence 4"]);

        assert!(c.is_activated(3, done));
        assert!(!c.is_activated(2, done));
        let later = done + Duration::from_millis(600);
        c.tick(later);
        assert!(!c.is_activated(3, later));
        assert!(!c.snapshot(later).active.iter().any(|a| *a));
    }

    #[test]
    fn tail_positions_are_throttled_while_settling() {
        let (mut c, log) = controller(false);
        let t0 = Instant::now();
        c.pointer_down(20.0, 40.0, t0);
        c.pointer_up(20.0, 40.0, t0);
        run_until_idle(&mut c, t0, Duration::from_secs(10));

        let fades: Vec<f64> = log
            .borrow()
            .iter()
            .skip(1)
            .filter(|(t, _)| t == FADE_TOPIC)
            .map(|(_, p)| p.parse().unwrap())
            .collect();
        // 300px at 37.8px/s is roughly 7.9s; at most one per 50ms window
        assert!(fades.len() <= 8 * 20 + 1, "{}", fades.len());
        assert!(fades.len() > 50);
        assert!(fades.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(control_messages(&log), vec!["Initialize Sequence 1"]);
    }

    #[test]
    fn chase_pulls_tail_without_crossing_head() {
        let (mut c, log) = controller(false);
        let mut now = Instant::now();
        c.pointer_down(600.0, 40.0, now);
        assert_eq!(c.cursors().head, 600.0);
        assert!(c.is_chasing());
        for _ in 0..60 {
            now += FRAME;
            c.tick(now);
            assert!(c.cursors().tail <= c.cursors().head);
        }
        assert!(c.cursors().tail > 315.0);
        assert!(c.cursors().tail < 600.0);
        assert!(log.borrow().len() > 1);
    }

    #[test]
    fn head_is_clamped_while_dragging() {
        let (mut c, _) = controller(false);
        let now = Instant::now();
        c.pointer_down(-50.0, 0.0, now);
        assert_eq!(c.cursors().head, 15.0);
        c.pointer_move(10_000.0, 0.0, now);
        assert_eq!(c.cursors().head, 615.0);
    }

    #[test]
    fn second_pointer_down_keeps_single_chase() {
        let (mut c, _) = controller(false);
        let now = Instant::now();
        c.pointer_down(400.0, 0.0, now);
        c.pointer_down(100.0, 0.0, now);
        assert_eq!(c.cursors().head, 400.0);
        assert!(c.is_chasing());
    }

    #[test]
    fn pointer_down_while_settling_restarts_drag() {
        let (mut c, _) = controller(false);
        let t0 = Instant::now();
        c.pointer_down(500.0, 0.0, t0);
        c.pointer_up(500.0, 0.0, t0);
        assert!(!c.is_chasing());
        c.tick(t0 + Duration::from_millis(500));
        c.pointer_down(100.0, 0.0, t0 + Duration::from_millis(520));
        assert!(matches!(c.phase(), Phase::Dragging(_)));
        assert!(c.is_chasing());
        assert_eq!(c.cursors().head, 100.0);
    }

    #[test]
    fn tap_on_resting_stop_retriggers_after_head_lands() {
        let (mut c, log) = controller(false);
        let t0 = Instant::now();
        c.pointer_down(320.0, 40.0, t0);
        c.pointer_up(320.0, 40.0, t0);
        c.tick(t0 + FRAME);
        assert!(control_messages(&log).is_empty());
        run_until_idle(&mut c, t0, Duration::from_secs(4));
        assert_eq!(control_messages(&log), vec!["Initialize Sequence 4"]);
    }

    #[test]
    fn legacy_gesture_emitted_when_enabled() {
        let (mut c, log) = controller(true);
        let t0 = Instant::now();
        c.pointer_down(320.0, 50.0, t0);
        c.pointer_up(322.0, 51.0, t0);
        assert_eq!(control_messages(&log), vec!["geste_gruen_tap"]);

        let (mut c, log) = controller(true);
        c.pointer_down(20.0, 50.0, t0);
        c.pointer_up(220.0, 60.0, t0);
        assert_eq!(control_messages(&log), vec!["geste_rot_rechts"]);
    }

    #[test]
    fn cancel_snaps_without_legacy_token() {
        let (mut c, log) = controller(true);
        let t0 = Instant::now();
        c.pointer_down(420.0, 50.0, t0);
        c.pointer_cancel(t0);
        assert!(matches!(c.phase(), Phase::Settling(_)));
        assert!(control_messages(&log).is_empty());
    }

    #[test]
    fn shutdown_stops_all_frame_work() {
        let (mut c, _) = controller(false);
        let mut now = Instant::now();
        c.pointer_down(600.0, 0.0, now);
        now += FRAME;
        c.tick(now);
        c.shutdown();
        let tail = c.cursors().tail;
        for _ in 0..10 {
            now += FRAME;
            c.tick(now);
        }
        assert_eq!(c.cursors().tail, tail);
        assert!(!c.is_chasing());
    }

    #[test]
    fn zero_width_suppresses_input_and_emission() {
        let (mut c, log) = controller(false);
        let before = log.borrow().len();
        c.set_width(0.0);
        let now = Instant::now();
        c.pointer_down(100.0, 0.0, now);
        c.tick(now + FRAME);
        assert!(matches!(c.phase(), Phase::Idle));
        assert_eq!(log.borrow().len(), before);
    }

    #[test]
    fn initial_fade_waits_for_a_usable_width() {
        let profile = Profile::builtin().unwrap();
        let (emitter, log) = recording_emitter(50);
        let mut c = SliderController::new(Settings::from_profile(&profile), 0.0, emitter);
        c.on_transport(&TransportEvent::Connected);
        assert!(log.borrow().is_empty());

        c.set_width(630.0);
        assert_eq!(
            log.borrow().as_slice(),
            &[(FADE_TOPIC.to_string(), "0.500".to_string())]
        );
        c.set_width(800.0);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn release_on_enormous_track_settles_without_panicking() {
        let (mut c, _log) = controller(false);
        c.set_width(1e30);
        let t0 = Instant::now();
        c.pointer_down(1e29, 0.0, t0);
        c.pointer_up(1e29, 0.0, t0);
        let Phase::Settling(pair) = c.phase() else {
            panic!("expected settling");
        };
        assert_eq!(pair.tail_duration(), Duration::MAX);
        c.tick(t0 + FRAME);
        assert!(c.cursors().tail.is_finite());
    }

    #[test]
    fn reconfigure_applies_new_throttle() {
        let mut profile = Profile::builtin().unwrap();
        let (mut c, log) = controller(false);
        profile.emission.throttle_ms = 1000;
        c.reconfigure(Settings::from_profile(&profile), 630.0);
        log.borrow_mut().clear();

        let t0 = Instant::now();
        c.pointer_down(615.0, 0.0, t0);
        let mut now = t0;
        for _ in 0..60 {
            now += FRAME;
            c.tick(now);
        }
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn disconnected_controller_still_settles() {
        let (mut c, log) = controller(false);
        c.on_transport(&TransportEvent::Disconnected("gone".into()));
        let before = log.borrow().len();
        let t0 = Instant::now();
        c.pointer_down(120.0, 0.0, t0);
        c.pointer_up(120.0, 0.0, t0);
        run_until_idle(&mut c, t0, Duration::from_secs(10));
        assert!(matches!(c.phase(), Phase::Idle));
        assert_eq!(c.cursors().tail, 115.0);
        assert_eq!(log.borrow().len(), before);
    }
}
