//! Stateless gesture classification
//!
//! Rules are evaluated in a fixed priority order and the first match wins.
//! With the default thresholds the click test (< 40 px) runs before the
//! drag test (< 30 px), so a pinch tight enough for drag is reported as
//! click. `drag_before_click` swaps the two tests.

use serde::{Deserialize, Serialize};

use super::label::GestureLabel;
use super::pose::FingerState;

const POINTING: [u8; 5] = [0, 1, 0, 0, 0];
const TWO_FINGERS: [u8; 5] = [0, 1, 1, 0, 0];
const THREE_FINGERS: [u8; 5] = [0, 1, 1, 1, 0];

/// Pinch thresholds and rule ordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureThresholds {
    /// Thumb-index distance (px) below which a pinch is a click
    pub click_threshold: f64,
    /// Thumb-index distance (px) below which a pinch is a drag
    pub drag_threshold: f64,
    /// Thumb-index distance (px) above which zoom means zoom in
    pub zoom_in_distance: f64,
    /// Thumb-index distance (px) below which zoom means zoom out
    pub zoom_out_distance: f64,
    /// Test drag before click so tight pinches can reach drag
    pub drag_before_click: bool,
}

impl Default for GestureThresholds {
    fn default() -> Self {
        Self {
            click_threshold: 40.0,
            drag_threshold: 30.0,
            zoom_in_distance: 60.0,
            zoom_out_distance: 30.0,
            drag_before_click: false,
        }
    }
}

/// Classify one frame's finger state.
///
/// Total: always returns a label. `index_middle_dist` is accepted for
/// parity with the sample data but no rule currently reads it.
pub fn classify(
    fingers: FingerState,
    thumb_index_dist: f64,
    _index_middle_dist: f64,
    thresholds: &GestureThresholds,
) -> GestureLabel {
    if fingers.matches(POINTING) {
        return GestureLabel::Pointing;
    }

    let pinch_ready = fingers.thumb() && fingers.index();
    let is_click = pinch_ready && thumb_index_dist < thresholds.click_threshold;
    let is_drag = pinch_ready && thumb_index_dist < thresholds.drag_threshold;

    if thresholds.drag_before_click {
        if is_drag {
            return GestureLabel::Drag;
        }
        if is_click {
            return GestureLabel::Click;
        }
    } else {
        if is_click {
            return GestureLabel::Click;
        }
        if is_drag {
            return GestureLabel::Drag;
        }
    }

    if fingers.matches(TWO_FINGERS) {
        return GestureLabel::Scroll;
    }

    let extended = fingers.count();
    if extended >= 4 {
        return GestureLabel::OpenPalm;
    }
    if fingers.matches(THREE_FINGERS) {
        return GestureLabel::Zoom;
    }
    if extended == 0 {
        return GestureLabel::Fist;
    }

    GestureLabel::Unknown
}
