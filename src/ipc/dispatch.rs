use log::{error, info};
use serde::Deserialize;
use std::time::Instant;

use super::runtime::socket_path;
use super::server::DaemonState;
use crate::controller::SliderController;
use crate::tracker::PointerPhase;

/// One line of the control socket protocol.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum IpcRequest {
    Status,
    Reload,
    Use {
        profile: String,
    },
    List,
    Doctor,
    Shutdown,
    Pointer {
        phase: PointerPhase,
        x: f64,
        #[serde(default)]
        y: f64,
    },
    Layout {
        width: f64,
    },
}

pub fn apply_pointer(
    ctrl: &mut SliderController,
    phase: PointerPhase,
    x: f64,
    y: f64,
    now: Instant,
) {
    match phase {
        PointerPhase::Down => ctrl.pointer_down(x, y, now),
        PointerPhase::Move => ctrl.pointer_move(x, y, now),
        PointerPhase::Up => ctrl.pointer_up(x, y, now),
        PointerPhase::Cancel => ctrl.pointer_cancel(now),
    }
}

fn ok(data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({"ok": true, "data": data})
}

fn fail(msg: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({"ok": false, "error": msg.to_string()})
}

/// Runs a request against the daemon state. The flag asks the loop to exit.
pub fn handle_request(
    req: IpcRequest,
    st: &mut DaemonState,
    now: Instant,
) -> (serde_json::Value, bool) {
    let resp = match req {
        IpcRequest::Status => ok(serde_json::json!({
            "active_profile": st.cfg.active_name,
            "profile_name": st.cfg.profile.meta.name,
            "profile_path": st.cfg.active_profile_path(),
            "socket": socket_path().ok(),
            "devices": st.cfg.detected_devices,
            "slider": st.controller.snapshot(now),
        })),
        IpcRequest::Reload => match st.reload() {
            Ok(()) => ok(serde_json::json!({"active_profile": st.cfg.active_name})),
            Err(e) => {
                error!("reload failed: {e:#}");
                fail(format!("{e:#}"))
            }
        },
        IpcRequest::Use { profile } => match st.cfg.set_active(&profile) {
            Ok(()) => {
                st.apply_profile();
                info!("switched active profile to {}", st.cfg.active_name);
                ok(serde_json::json!({"active_profile": st.cfg.active_name}))
            }
            Err(e) => fail(format!("{e:#}")),
        },
        IpcRequest::List => ok(serde_json::json!({
            "profiles": st.cfg.list_profiles(),
            "active": st.cfg.active_name,
        })),
        IpcRequest::Doctor => ok(st.cfg.doctor_report()),
        IpcRequest::Shutdown => return (ok("shutting down".into()), true),
        IpcRequest::Pointer { phase, x, y } => {
            if !(x.is_finite() && y.is_finite()) {
                return (fail("pointer coordinates must be finite"), false);
            }
            apply_pointer(&mut st.controller, phase, x, y, now);
            ok(serde_json::json!({"phase": st.controller.phase().name()}))
        }
        IpcRequest::Layout { width } => {
            if !(width.is_finite() && width >= 0.0) {
                return (fail("width must be a non-negative number"), false);
            }
            st.set_layout_width(width);
            ok(serde_json::json!({"stops": st.controller.track().stops()}))
        }
    };
    (resp, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_requests() {
        let r: IpcRequest = serde_json::from_str(r#"{"op":"use","profile":"stage"}"#).unwrap();
        assert!(matches!(r, IpcRequest::Use { profile } if profile == "stage"));

        let r: IpcRequest =
            serde_json::from_str(r#"{"op":"pointer","phase":"down","x":120.5}"#).unwrap();
        assert!(matches!(
            r,
            IpcRequest::Pointer { phase: PointerPhase::Down, x, y } if x == 120.5 && y == 0.0
        ));

        let r: IpcRequest = serde_json::from_str(r#"{"op":"layout","width":800}"#).unwrap();
        assert!(matches!(r, IpcRequest::Layout { width } if width == 800.0));

        assert!(serde_json::from_str::<IpcRequest>(r#"{"op":"explode"}"#).is_err());
    }
}
