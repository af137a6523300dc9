//! Events module for pipeline transitions
//!
//! Structured events emitted by the control thread: stabilized gesture
//! changes, dispatcher mode transitions, button press/release and
//! operator actions such as toggling control or an emergency stop.

use serde::{Deserialize, Serialize};

use crate::control::Mode;
use crate::gesture::{GestureLabel, SwipeDirection};

/// Events emitted by the gesture pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Stabilized gesture changed
    GestureChanged {
        from: GestureLabel,
        to: GestureLabel,
    },

    /// Hand travel across the window crossed the swipe distance
    Swiped { direction: SwipeDirection },

    /// Stabilized gesture has persisted past the hold threshold
    GestureHeld {
        gesture: GestureLabel,
        /// Hold threshold that was crossed, in milliseconds
        held_ms: u64,
    },

    /// Dispatcher entered a new mode
    ModeChanged { from: Mode, to: Mode },

    /// Primary button pressed for a drag
    ButtonPressed,

    /// Primary button released
    ButtonReleased {
        /// Duration in milliseconds the button was held
        duration_ms: u64,
    },

    /// A click was issued
    Clicked { x: i32, y: i32 },

    /// An action was rejected by the input backend
    ActionFailed { command: String, error: String },

    /// Gesture control switched on or off
    ControlToggled { enabled: bool },

    /// Stabilizer and dispatcher were reset
    RecognizerReset,

    /// All held input was force-released
    EmergencyStop,
}

impl std::fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineEvent::GestureChanged { from, to } => {
                write!(f, "GESTURE_CHANGED ({} -> {})", from, to)
            }
            PipelineEvent::GestureHeld { gesture, held_ms } => {
                write!(f, "GESTURE_HELD ({} for {}ms)", gesture, held_ms)
            }
            PipelineEvent::ModeChanged { from, to } => {
                write!(f, "MODE_CHANGED ({} -> {})", from, to)
            }
            PipelineEvent::Swiped { direction } => write!(f, "SWIPED ({})", direction),
            PipelineEvent::ButtonPressed => write!(f, "BUTTON_PRESSED"),
            PipelineEvent::ButtonReleased { duration_ms } => {
                write!(f, "BUTTON_RELEASED ({}ms)", duration_ms)
            }
            PipelineEvent::Clicked { x, y } => write!(f, "CLICKED ({}, {})", x, y),
            PipelineEvent::ActionFailed { command, error } => {
                write!(f, "ACTION_FAILED ({}: {})", command, error)
            }
            PipelineEvent::ControlToggled { enabled } => {
                write!(f, "CONTROL_{}", if *enabled { "ENABLED" } else { "DISABLED" })
            }
            PipelineEvent::RecognizerReset => write!(f, "RECOGNIZER_RESET"),
            PipelineEvent::EmergencyStop => write!(f, "EMERGENCY_STOP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::ButtonReleased { duration_ms: 1500 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("button_released"));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"gesture_changed","from":"none","to":"open_palm"}"#;
        let event: PipelineEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            PipelineEvent::GestureChanged {
                from: GestureLabel::None,
                to: GestureLabel::OpenPalm,
            }
        );
    }

    #[test]
    fn test_event_display() {
        let event = PipelineEvent::ControlToggled { enabled: false };
        assert_eq!(event.to_string(), "CONTROL_DISABLED");
        let event = PipelineEvent::Swiped {
            direction: SwipeDirection::Left,
        };
        assert_eq!(event.to_string(), "SWIPED (left)");
    }
}
