use anyhow::{Result, anyhow};
use log::{error, info, warn};
use notify::{EventKind, RecursiveMode, Watcher};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    io::{BufRead, BufReader, ErrorKind, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::PathBuf,
    sync::mpsc::{self, Receiver, Sender},
    thread,
    time::{Duration, Instant},
};

use super::dispatch::{self, IpcRequest};
use super::pipeline::run_pipeline;
use super::runtime::socket_path;
use crate::config::DaemonConfigState;
use crate::controller::{Settings, SliderController};
use crate::emitter::Emitter;
use crate::tracker::PointerEvent;
use crate::transport::{MqttTransport, TransportEvent};

/// Everything the daemon loop reacts to, funnelled through one channel.
pub enum DaemonEvent {
    Pointer(PointerEvent),
    Request(IpcRequest, Sender<serde_json::Value>),
    ProfileChanged(Vec<PathBuf>),
    Shutdown,
}

pub struct DaemonState {
    pub cfg: DaemonConfigState,
    pub controller: SliderController,
    layout_width: Option<f64>,
}

impl DaemonState {
    fn new(cfg: DaemonConfigState, emitter: Emitter) -> Self {
        let p = &cfg.profile;
        let controller = SliderController::new(Settings::from_profile(p), p.track.width, emitter);
        Self {
            cfg,
            controller,
            layout_width: None,
        }
    }

    fn width(&self) -> f64 {
        self.layout_width.unwrap_or(self.cfg.profile.track.width)
    }

    /// Push the active profile into the controller. Transport endpoint changes
    /// need a restart; topics apply immediately.
    pub fn apply_profile(&mut self) {
        let width = self.width();
        let p = &self.cfg.profile;
        self.controller.reconfigure(Settings::from_profile(p), width);
        self.controller.set_topics(p.topics());
    }

    /// Keeps the last good profile on error.
    pub fn reload(&mut self) -> Result<()> {
        self.cfg.reload()?;
        self.apply_profile();
        info!("profile '{}' reloaded", self.cfg.active_name);
        Ok(())
    }

    pub fn set_layout_width(&mut self, width: f64) {
        self.layout_width = Some(width);
        self.controller.set_width(width);
    }

    fn on_pointer(&mut self, p: PointerEvent, now: Instant) {
        let x = p.x_norm * self.width();
        let y = p.y_norm * self.cfg.profile.track.height;
        dispatch::apply_pointer(&mut self.controller, p.phase, x, y, now);
    }
}

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path()?;
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    listener.set_nonblocking(true)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let cfg = DaemonConfigState::load_or_install_default()?;
    info!("daemon: active profile '{}'", cfg.active_name);

    // channels
    let (tx_evt, rx_evt) = mpsc::channel::<DaemonEvent>();
    let (tx_link, rx_link) = mpsc::channel::<TransportEvent>();

    let transport = MqttTransport::connect(&cfg.profile.transport, tx_link)?;
    let emitter = Emitter::new(
        Box::new(transport),
        cfg.profile.topics(),
        Duration::from_millis(cfg.profile.emission.throttle_ms),
        cfg.profile.emission.initial_fade,
    );
    let mut state = DaemonState::new(cfg, emitter);

    spawn_pointer_thread(tx_evt.clone())?;
    spawn_signal_thread(tx_evt.clone())?;
    let _watcher = watch_profiles(&state.cfg, tx_evt.clone())
        .inspect_err(|e| warn!("profile watcher disabled: {e:#}"))
        .ok();

    let result = event_loop(&listener, &mut state, &tx_evt, &rx_evt, &rx_link);
    state.controller.shutdown();
    let _ = std::fs::remove_file(&sock);
    info!("daemon: stopped");
    result
}

fn event_loop(
    listener: &UnixListener,
    state: &mut DaemonState,
    tx_evt: &Sender<DaemonEvent>,
    rx_evt: &Receiver<DaemonEvent>,
    rx_link: &Receiver<TransportEvent>,
) -> Result<()> {
    loop {
        let frame_start = Instant::now();

        match listener.accept() {
            Ok((stream, _)) => {
                let tx = tx_evt.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_client(stream, tx) {
                        error!("ipc client error: {e}");
                    }
                });
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => warn!("ipc accept failed: {e}"),
        }

        while let Ok(evt) = rx_link.try_recv() {
            state.controller.on_transport(&evt);
        }

        while let Ok(evt) = rx_evt.try_recv() {
            let now = Instant::now();
            match evt {
                DaemonEvent::Pointer(p) => state.on_pointer(p, now),
                DaemonEvent::Request(req, reply) => {
                    let (resp, stop) = dispatch::handle_request(req, state, now);
                    let _ = reply.send(resp);
                    if stop {
                        return Ok(());
                    }
                }
                DaemonEvent::ProfileChanged(paths) => {
                    if !paths.iter().any(|p| state.cfg.is_active_profile(p)) {
                        continue;
                    }
                    if let Err(e) = state.reload() {
                        error!("reload failed: {e:#}");
                    }
                }
                DaemonEvent::Shutdown => return Ok(()),
            }
        }

        state.controller.tick(Instant::now());

        let frame = state.cfg.profile.frame_interval();
        let spent = frame_start.elapsed();
        if spent < frame {
            thread::sleep(frame - spent);
        }
    }
}

fn handle_client(mut stream: UnixStream, tx_evt: Sender<DaemonEvent>) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }

    let resp = match serde_json::from_str::<IpcRequest>(&line) {
        Ok(req) => {
            let (tx, rx) = mpsc::channel();
            tx_evt
                .send(DaemonEvent::Request(req, tx))
                .map_err(|_| anyhow!("daemon loop is gone"))?;
            rx.recv_timeout(Duration::from_secs(2))
                .unwrap_or_else(|_| serde_json::json!({"ok": false, "error": "daemon busy"}))
        }
        Err(e) => serde_json::json!({"ok": false, "error": format!("bad request: {e}")}),
    };

    writeln!(stream, "{resp}")?;
    Ok(())
}

fn spawn_pointer_thread(tx_evt: Sender<DaemonEvent>) -> Result<()> {
    thread::Builder::new()
        .name("pointer-input".into())
        .spawn(move || {
            if let Err(e) = run_pipeline(tx_evt) {
                error!("pointer pipeline failed: {e}");
            }
        })?;
    Ok(())
}

fn spawn_signal_thread(tx_evt: Sender<DaemonEvent>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("daemon: caught signal {sig}, shutting down");
                let _ = tx_evt.send(DaemonEvent::Shutdown);
            }
        })?;
    Ok(())
}

fn watch_profiles(
    cfg: &DaemonConfigState,
    tx_evt: Sender<DaemonEvent>,
) -> Result<notify::RecommendedWatcher> {
    let dir = cfg.profiles_dir.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let Ok(event) = res else {
            return;
        };
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return;
        }
        let paths: Vec<PathBuf> = event
            .paths
            .into_iter()
            .filter(|p| p.extension().is_some_and(|e| e == "toml"))
            .collect();
        if !paths.is_empty() {
            let _ = tx_evt.send(DaemonEvent::ProfileChanged(paths));
        }
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    info!("watching {} for profile edits", dir.display());
    Ok(watcher)
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path()?;
    if !sock.exists() {
        return Err(anyhow!(
            "slidectl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
