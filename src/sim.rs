//! Offline drag simulation on a synthetic clock.

use anyhow::{Result, anyhow};
use std::time::{Duration, Instant};

use crate::config::Profile;
use crate::controller::{Phase, Settings, SliderController};
use crate::emitter::Emitter;
use crate::transport::{StdoutPublisher, TransportEvent};

/// Press at `from_x`, drag to `to_x` over `hold`, release, then run frames
/// until the slider has settled. Messages are printed as they are emitted.
pub fn run_drag(profile: &Profile, from_x: f64, to_x: f64, hold: Duration) -> Result<()> {
    let emitter = Emitter::new(
        Box::new(StdoutPublisher),
        profile.topics(),
        Duration::from_millis(profile.emission.throttle_ms),
        profile.emission.initial_fade,
    );
    let mut ctrl = SliderController::new(Settings::from_profile(profile), profile.track.width, emitter);
    if !ctrl.track().is_valid() {
        return Err(anyhow!("track.width must be positive to simulate"));
    }
    ctrl.on_transport(&TransportEvent::Connected);

    let frame = profile.frame_interval();
    let y = profile.track.height / 2.0;
    let t0 = Instant::now();
    let mut now = t0;

    ctrl.pointer_down(from_x, y, now);
    let frames = (hold.as_secs_f64() / frame.as_secs_f64()).ceil() as u32;
    for i in 1..=frames {
        now += frame;
        let t = f64::from(i) / f64::from(frames);
        ctrl.pointer_move(from_x + (to_x - from_x) * t, y, now);
        ctrl.tick(now);
    }
    ctrl.pointer_up(to_x, y, now);
    println!(
        "# released: head={:.1} tail={:.1} span={:.1}",
        ctrl.cursors().head,
        ctrl.cursors().tail,
        ctrl.span().length
    );

    let limit = now + Duration::from_secs(120);
    while now < limit {
        now += frame;
        ctrl.tick(now);
        if let Phase::Idle = ctrl.phase() {
            break;
        }
    }

    let done = ctrl.snapshot(now);
    let active: Vec<usize> = done
        .active
        .iter()
        .enumerate()
        .filter_map(|(i, a)| a.then_some(i + 1))
        .collect();
    println!(
        "# settled after {:.2}s: head={:.1} tail={:.1} active={:?}",
        (now - t0).as_secs_f64(),
        done.head,
        done.tail,
        active
    );
    Ok(())
}
