use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::Deserialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::emitter::Topics;
use crate::geometry::{self, Track};
use crate::input;
use crate::message;
use crate::motion::{self, ChaseParams};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub width: f64,
    pub height: f64,
    pub handle_size: f64,
    pub stop_count: usize,
    pub segments: Vec<String>,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            width: 630.0,
            height: 120.0,
            handle_size: geometry::DEFAULT_HANDLE_SIZE,
            stop_count: geometry::DEFAULT_STOP_COUNT,
            segments: geometry::default_segments(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub max_speed: f64,
    pub stiffness: f64,
    pub deadband: f64,
    pub settle_min_ms: u64,
    pub snap_tolerance: f64,
    pub frame_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            max_speed: motion::DEFAULT_MAX_SPEED,
            stiffness: motion::DEFAULT_STIFFNESS,
            deadband: motion::DEFAULT_DEADBAND,
            settle_min_ms: 3000,
            snap_tolerance: 1.0,
            frame_ms: 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmissionConfig {
    pub throttle_ms: u64,
    pub initial_fade: f64,
    pub activation_ms: u64,
    pub legacy_gestures: bool,
    pub tap_min_dist: f64,
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 50,
            initial_fade: 0.5,
            activation_ms: 500,
            legacy_gestures: false,
            tap_min_dist: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub control_topic: String,
    pub fade_topic: String,
    pub keep_alive_s: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "slidectl".into(),
            control_topic: message::CONTROL_TOPIC.into(),
            fade_topic: message::FADE_TOPIC.into(),
            keep_alive_s: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub track: TrackConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub emission: EmissionConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Profile {
    /// The profile shipped inside the binary.
    pub fn builtin() -> Result<Self> {
        Self::parse(default_profile_text())
    }

    pub fn parse(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn track(&self, width: f64) -> Track {
        Track::new(width, self.track.handle_size, self.track.stop_count)
    }

    pub fn chase_params(&self) -> ChaseParams {
        ChaseParams {
            max_speed: self.motion.max_speed,
            stiffness: self.motion.stiffness,
            deadband: self.motion.deadband,
        }
    }

    pub fn topics(&self) -> Topics {
        Topics {
            control: self.transport.control_topic.clone(),
            fade: self.transport.fade_topic.clone(),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.motion.frame_ms)
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
    pub detected_devices: Vec<String>,
}

fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("slidectl"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir()?;
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;
        let detected_devices = input::discover_pointers()
            .into_iter()
            .map(|d| format!("{} ({})", d.name, d.path))
            .collect();

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
            detected_devices,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn active_profile_path(&self) -> PathBuf {
        self.profiles_dir.join(format!("{}.toml", self.active_name))
    }

    /// Edits to other profiles in the directory must not disturb the slider.
    pub fn is_active_profile(&self, path: &Path) -> bool {
        path.parent() == Some(self.profiles_dir.as_path())
            && path.file_name() == self.active_profile_path().file_name()
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let t = &self.profile.transport;
        serde_json::json!({
            "input_dir_present": Path::new("/dev/input").exists(),
            "input_group_member": check_in_input_group(),
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "devices": self.detected_devices,
            "broker": format!("{}:{}", t.host, t.port),
            "topics": { "control": t.control_topic, "fade": t.fade_topic },
            "hints": {
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input",
                "inject_without_device": "slidectl pointer down <x> <y>"
            }
        })
    }
}

fn load_profile(dir: &Path, name: &str) -> Result<Profile> {
    let path = dir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Profile::parse(&txt).with_context(|| format!("failed to load {}", path.display()))
}

fn validate_profile(p: &Profile) -> Result<()> {
    let t = &p.track;
    if !(t.width >= 0.0 && t.height >= 0.0) {
        return Err(anyhow!("track.width and track.height must be >= 0"));
    }
    if !(t.handle_size > 0.0) {
        return Err(anyhow!("track.handle_size must be positive"));
    }
    if t.stop_count == 0 {
        return Err(anyhow!("track.stop_count must be at least 1"));
    }
    if t.segments.is_empty() || t.segments.iter().any(|s| s.trim().is_empty()) {
        return Err(anyhow!("track.segments must be a non-empty list of names"));
    }

    let m = &p.motion;
    if !(m.max_speed > 0.0 && m.stiffness > 0.0 && m.deadband >= 0.0) {
        return Err(anyhow!(
            "motion.max_speed and motion.stiffness must be positive"
        ));
    }
    if m.frame_ms == 0 {
        return Err(anyhow!("motion.frame_ms must be a positive duration"));
    }
    if !(m.snap_tolerance > 0.0) {
        return Err(anyhow!("motion.snap_tolerance must be positive"));
    }

    let e = &p.emission;
    if e.throttle_ms == 0 || e.activation_ms == 0 {
        return Err(anyhow!("emission durations must be positive"));
    }
    if !(0.0..=1.0).contains(&e.initial_fade) {
        return Err(anyhow!("emission.initial_fade must be in [0,1]"));
    }

    let tr = &p.transport;
    if tr.host.trim().is_empty() {
        return Err(anyhow!("transport.host is empty"));
    }
    if tr.control_topic.trim().is_empty() || tr.fade_topic.trim().is_empty() {
        return Err(anyhow!("transport topics must not be empty"));
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    let Ok(s) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let Ok(user) = whoami::fallible::username() else {
        return false;
    };
    s.lines()
        .filter(|line| line.starts_with("input:"))
        .any(|line| line.split(':').nth(3).unwrap_or("").split(',').any(|u| u == user))
}
