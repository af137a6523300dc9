//! Normalized-to-screen coordinate mapping

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::gesture::NormalizedPoint;

/// Moving-average window for screen positions
const SMOOTHING_WINDOW: usize = 3;

/// Lowest accepted sensitivity
pub const MIN_SENSITIVITY: f64 = 0.1;
/// Highest accepted sensitivity
pub const MAX_SENSITIVITY: f64 = 3.0;

/// Integer pixel position on screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &ScreenPoint) -> f64 {
        f64::from(other.x - self.x).hypot(f64::from(other.y - self.y))
    }
}

/// Screen dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }
}

/// Sub-rectangle of the camera frame stretched over the whole screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlZone {
    pub enabled: bool,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for ControlZone {
    fn default() -> Self {
        Self {
            enabled: false,
            x: 0.2,
            y: 0.2,
            width: 0.6,
            height: 0.6,
        }
    }
}

impl ControlZone {
    /// Remap a frame-normalized point into zone-normalized coordinates
    pub fn remap(&self, point: NormalizedPoint) -> NormalizedPoint {
        if !self.enabled || self.width <= 0.0 || self.height <= 0.0 {
            return point;
        }
        NormalizedPoint::new(
            (point.x - self.x) / self.width,
            (point.y - self.y) / self.height,
        )
    }
}

/// Dead-zone gate: true when there is no previous position or the new one
/// is at least `threshold` pixels away from it
pub fn should_move(new_pos: ScreenPoint, last_pos: Option<ScreenPoint>, threshold: f64) -> bool {
    match last_pos {
        None => true,
        Some(last) => new_pos.distance_to(&last) >= threshold,
    }
}

/// Maps normalized positions to smoothed screen coordinates
#[derive(Debug, Default)]
pub struct PointerMapper {
    history: VecDeque<(f64, f64)>,
}

impl PointerMapper {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(SMOOTHING_WINDOW),
        }
    }

    /// Scale, clamp and smooth a normalized position
    pub fn map(
        &mut self,
        position: NormalizedPoint,
        sensitivity: f64,
        screen: ScreenSize,
    ) -> ScreenPoint {
        let scaled = scale_and_clamp(position, sensitivity, screen);
        if self.history.len() >= SMOOTHING_WINDOW {
            self.history.pop_front();
        }
        self.history.push_back(scaled);

        let n = self.history.len() as f64;
        let (sum_x, sum_y) = self
            .history
            .iter()
            .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
        ScreenPoint::new((sum_x / n).round() as i32, (sum_y / n).round() as i32)
    }

    /// Scale and clamp without touching the moving average
    pub fn to_screen(
        &self,
        position: NormalizedPoint,
        sensitivity: f64,
        screen: ScreenSize,
    ) -> ScreenPoint {
        let (x, y) = scale_and_clamp(position, sensitivity, screen);
        ScreenPoint::new(x.round() as i32, y.round() as i32)
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

fn scale_and_clamp(position: NormalizedPoint, sensitivity: f64, screen: ScreenSize) -> (f64, f64) {
    let max_x = f64::from(screen.width.saturating_sub(1));
    let max_y = f64::from(screen.height.saturating_sub(1));
    let x = position.x * f64::from(screen.width) * sensitivity;
    let y = position.y * f64::from(screen.height) * sensitivity;
    (clamp_finite(x, max_x), clamp_finite(y, max_y))
}

fn clamp_finite(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max)
}
