use anyhow::Result;
use log::{info, warn};
use std::{sync::mpsc::Sender, thread, time::Duration};

use evdev::{AbsoluteAxisCode, Device, EventType, SynchronizationCode};

use super::server::DaemonEvent;
use crate::input;
use crate::tracker::PointerTracker;

/// Reads every detected touch device and forwards pointer transitions to the
/// daemon loop. Returns when the daemon goes away.
pub fn run_pipeline(tx_evt: Sender<DaemonEvent>) -> Result<()> {
    let devices = input::discover_pointers();
    if devices.is_empty() {
        warn!("no touch pointer devices detected; use `slidectl pointer` to inject input");
        return Ok(());
    }

    let mut devs: Vec<(Device, PointerTracker)> = vec![];
    for d in devices {
        match Device::open(&d.path) {
            Ok(mut dev) => {
                let _ = dev.set_nonblocking(true);
                let tracker = tracker_for(&dev);
                info!("pointer input: {} ({})", d.name, d.path);
                devs.push((dev, tracker));
            }
            Err(e) => warn!("failed to open {}: {e}", d.path),
        }
    }
    if devs.is_empty() {
        warn!("failed to open all detected devices; pointer pipeline idle");
        return Ok(());
    }

    loop {
        let mut any_event = false;

        for (dev, tracker) in devs.iter_mut() {
            let Ok(events) = dev.fetch_events() else {
                continue;
            };
            for ev in events {
                any_event = true;
                let out = if ev.event_type() == EventType::ABSOLUTE {
                    match ev.code() {
                        c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => tracker.on_slot(ev.value()),
                        c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => {
                            tracker.on_tracking_id(ev.value())
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => {
                            tracker.on_pos_x(ev.value())
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_Y.0 => {
                            tracker.on_pos_y(ev.value())
                        }
                        _ => {}
                    }
                    None
                } else if ev.event_type() == EventType::SYNCHRONIZATION {
                    match ev.code() {
                        c if c == SynchronizationCode::SYN_REPORT.0 => tracker.on_syn_report(),
                        c if c == SynchronizationCode::SYN_DROPPED.0 => tracker.on_dropped(),
                        _ => None,
                    }
                } else {
                    None
                };

                if let Some(p) = out {
                    if tx_evt.send(DaemonEvent::Pointer(p)).is_err() {
                        return Ok(());
                    }
                }
            }
        }

        if !any_event {
            thread::sleep(Duration::from_millis(4));
        }
    }
}

fn tracker_for(dev: &Device) -> PointerTracker {
    let mut tracker = PointerTracker::new();
    if let Ok(abs) = dev.get_abs_state() {
        let x = abs[AbsoluteAxisCode::ABS_MT_POSITION_X.0 as usize];
        let y = abs[AbsoluteAxisCode::ABS_MT_POSITION_Y.0 as usize];
        tracker.set_norm_ranges(x.minimum, x.maximum, y.minimum, y.maximum);
    }
    tracker
}
