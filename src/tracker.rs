//! Single-pointer tracking over the multitouch slot protocol.
//!
//! Only the first touch to land is followed; other slots are ignored until it
//! lifts.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// Pointer sample in normalized `[0, 1]` device coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub x_norm: f64,
    pub y_norm: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    tracking_id: i32, // -1 = inactive
    x_norm: f64,
    y_norm: f64,
}

impl Slot {
    fn active(&self) -> bool {
        self.tracking_id >= 0
    }
}

#[derive(Debug)]
pub struct PointerTracker {
    slots: Vec<Slot>,
    cur_slot: usize,
    primary: Option<usize>,
    reported: Option<(f64, f64)>,
    // normalization
    x_min: i32,
    x_max: i32,
    y_min: i32,
    y_max: i32,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerTracker {
    pub fn new() -> Self {
        Self {
            slots: vec![
                Slot {
                    tracking_id: -1,
                    ..Slot::default()
                };
                10
            ],
            cur_slot: 0,
            primary: None,
            reported: None,
            x_min: 0,
            x_max: 4096,
            y_min: 0,
            y_max: 4096,
        }
    }

    pub fn set_norm_ranges(&mut self, x_min: i32, x_max: i32, y_min: i32, y_max: i32) {
        self.x_min = x_min;
        self.x_max = x_max.max(x_min + 1);
        self.y_min = y_min;
        self.y_max = y_max.max(y_min + 1);
    }

    pub fn on_slot(&mut self, slot: i32) {
        self.cur_slot = slot.clamp(0, self.slots.len() as i32 - 1) as usize;
    }

    pub fn on_tracking_id(&mut self, tracking_id: i32) {
        let s = &mut self.slots[self.cur_slot];
        if tracking_id < 0 {
            s.tracking_id = -1;
        } else {
            s.tracking_id = tracking_id;
            if self.primary.is_none() {
                self.primary = Some(self.cur_slot);
            }
        }
    }

    pub fn on_pos_x(&mut self, raw: i32) {
        let nx = normalize(raw, self.x_min, self.x_max);
        self.slots[self.cur_slot].x_norm = nx;
    }

    pub fn on_pos_y(&mut self, raw: i32) {
        let ny = normalize(raw, self.y_min, self.y_max);
        self.slots[self.cur_slot].y_norm = ny;
    }

    /// Lost sync with the device: abandon the current gesture.
    pub fn on_dropped(&mut self) -> Option<PointerEvent> {
        self.primary = None;
        let (x, y) = self.reported.take()?;
        for s in &mut self.slots {
            s.tracking_id = -1;
        }
        Some(PointerEvent {
            phase: PointerPhase::Cancel,
            x_norm: x,
            y_norm: y,
        })
    }

    /// End of an input frame: report what happened to the primary pointer.
    pub fn on_syn_report(&mut self) -> Option<PointerEvent> {
        let idx = self.primary?;
        let s = self.slots[idx];
        let pos = (s.x_norm, s.y_norm);

        let phase = match (s.active(), self.reported) {
            (true, None) => PointerPhase::Down,
            (true, Some(prev)) if prev != pos => PointerPhase::Move,
            (true, Some(_)) => return None,
            (false, Some(_)) => PointerPhase::Up,
            (false, None) => {
                self.primary = None;
                return None;
            }
        };

        if s.active() {
            self.reported = Some(pos);
        } else {
            self.reported = None;
            self.primary = None;
        }
        Some(PointerEvent {
            phase,
            x_norm: pos.0,
            y_norm: pos.1,
        })
    }
}

fn normalize(raw: i32, min: i32, max: i32) -> f64 {
    ((raw - min) as f64 / (max - min) as f64).clamp(0.0, 1.0)
}
