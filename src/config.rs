//! Configuration loading and management
//!
//! Settings are a typed record with per-field defaults: any subset of
//! fields may be supplied as JSON and the rest keep their defaults.
//! Out-of-range values are clamped, never rejected.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::gesture::GestureThresholds;
use crate::pointer::ControlZone;

/// Environment variable holding inline JSON settings
pub const SETTINGS_ENV: &str = "GESTURE_POINTER_SETTINGS";
/// Environment variable forcing the dry-run backend
pub const DRY_RUN_ENV: &str = "GESTURE_POINTER_DRY_RUN";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Pipeline tuning
    pub settings: Settings,
}

/// Pipeline settings, grouped per subsystem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sensitivity: SensitivitySettings,
    pub gestures: GestureThresholds,
    pub timing: TimingSettings,
    pub detection: DetectionSettings,
    pub control_zone: ControlZone,
    /// Log actions instead of performing them
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivitySettings {
    /// Pointer movement multiplier, 0.1 to 3.0
    pub mouse_movement: f64,
    /// Wheel notches per unit of normalized vertical movement
    pub scroll_sensitivity: f64,
}

impl Default for SensitivitySettings {
    fn default() -> Self {
        Self {
            mouse_movement: 1.0,
            scroll_sensitivity: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Minimum seconds between clicks
    pub click_cooldown: f64,
    /// Minimum seconds between scroll or zoom steps
    pub scroll_cooldown: f64,
    /// Seconds a stabilized gesture must persist to count as held
    pub gesture_hold_threshold: f64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            click_cooldown: 0.3,
            scroll_cooldown: 0.1,
            gesture_hold_threshold: 0.5,
        }
    }
}

impl TimingSettings {
    pub fn click_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.click_cooldown)
    }

    pub fn scroll_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.scroll_cooldown)
    }

    pub fn hold_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.gesture_hold_threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Stabilization window capacity
    pub smoothing_frames: usize,
    /// Dead-zone radius in pixels
    pub movement_threshold: f64,
    /// Flip normalized x, for cameras that are not mirrored upstream
    pub mirror_x: bool,
    /// Normalized travel across the window that counts as a swipe
    pub swipe_distance: f64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            smoothing_frames: 5,
            movement_threshold: 5.0,
            mirror_x: false,
            swipe_distance: 0.1,
        }
    }
}

impl Settings {
    /// Parse settings from (possibly partial) JSON and clamp them
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings =
            serde_json::from_str(json).context("failed to parse settings JSON")?;
        Ok(settings.clamped())
    }

    /// Clamp every numeric field into its valid range
    pub fn clamped(mut self) -> Self {
        let s = &mut self.sensitivity;
        s.mouse_movement = clamp(s.mouse_movement, 0.1, 3.0, 1.0);
        s.scroll_sensitivity = clamp(s.scroll_sensitivity, 0.1, 100.0, 5.0);

        let g = &mut self.gestures;
        g.click_threshold = clamp(g.click_threshold, 0.0, 1000.0, 40.0);
        g.drag_threshold = clamp(g.drag_threshold, 0.0, 1000.0, 30.0);
        g.zoom_in_distance = clamp(g.zoom_in_distance, 0.0, 1000.0, 60.0);
        g.zoom_out_distance = clamp(g.zoom_out_distance, 0.0, g.zoom_in_distance, 30.0);

        let t = &mut self.timing;
        t.click_cooldown = clamp(t.click_cooldown, 0.0, 10.0, 0.3);
        t.scroll_cooldown = clamp(t.scroll_cooldown, 0.0, 10.0, 0.1);
        t.gesture_hold_threshold = clamp(t.gesture_hold_threshold, 0.0, 10.0, 0.5);

        let d = &mut self.detection;
        d.smoothing_frames = d.smoothing_frames.clamp(1, 60);
        d.movement_threshold = clamp(d.movement_threshold, 0.0, 100.0, 5.0);
        d.swipe_distance = clamp(d.swipe_distance, 0.01, 1.5, 0.1);

        let z = &mut self.control_zone;
        z.x = clamp(z.x, 0.0, 0.95, 0.2);
        z.y = clamp(z.y, 0.0, 0.95, 0.2);
        z.width = clamp(z.width, 0.05, 1.0 - z.x, 0.6);
        z.height = clamp(z.height, 0.05, 1.0 - z.y, 0.6);

        self
    }
}

/// Clamp into `[lo, hi]`, replacing non-finite values with `default`
fn clamp(value: f64, lo: f64, hi: f64, default: f64) -> f64 {
    let value = if value.is_finite() { value } else { default };
    value.clamp(lo, hi.max(lo))
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let settings_json = std::env::var(SETTINGS_ENV).ok();
        let dry_run = std::env::var(DRY_RUN_ENV).ok();
        Self::from_parts(&home, settings_json.as_deref(), dry_run.as_deref())
    }

    fn from_parts(home: &str, settings_json: Option<&str>, dry_run: Option<&str>) -> Result<Self> {
        let data_dir = PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("gesture-pointer");

        let socket_path = data_dir.join("daemon.sock");

        let mut settings = match settings_json {
            Some(json) if !json.trim().is_empty() => Settings::from_json(json)?,
            _ => Settings::default(),
        };

        if let Some(flag) = dry_run {
            settings.dry_run = matches!(flag.trim(), "1" | "true" | "yes");
        }

        Ok(Self {
            socket_path,
            data_dir,
            settings,
        })
    }
}
