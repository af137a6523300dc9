//! Commands sent to the OS-control backend

use serde::{Deserialize, Serialize};

/// Keys that can appear in a hotkey chord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Control,
    Plus,
    Minus,
}

impl Key {
    pub fn as_str(&self) -> &'static str {
        match self {
            Key::Control => "ctrl",
            Key::Plus => "+",
            Key::Minus => "-",
        }
    }

    pub fn is_modifier(&self) -> bool {
        matches!(self, Key::Control)
    }
}

/// A discrete pointer or keyboard action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionCommand {
    /// Move the pointer without pressing anything
    MoveTo { x: i32, y: i32 },
    /// Press and hold the primary button
    ButtonDown,
    /// Release the primary button
    ButtonUp,
    /// Press and release the primary button at the current position
    Click,
    /// Move the pointer with the primary button held
    DragTo { x: i32, y: i32, duration_ms: u64 },
    /// Scroll by whole wheel notches, positive is up
    Scroll { amount: i32 },
    /// Press the keys in order, then release them in reverse
    Hotkey { keys: Vec<Key> },
}

impl std::fmt::Display for ActionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionCommand::MoveTo { x, y } => write!(f, "MOVE_TO ({}, {})", x, y),
            ActionCommand::ButtonDown => write!(f, "BUTTON_DOWN"),
            ActionCommand::ButtonUp => write!(f, "BUTTON_UP"),
            ActionCommand::Click => write!(f, "CLICK"),
            ActionCommand::DragTo { x, y, duration_ms } => {
                write!(f, "DRAG_TO ({}, {}) over {}ms", x, y, duration_ms)
            }
            ActionCommand::Scroll { amount } => write!(f, "SCROLL ({})", amount),
            ActionCommand::Hotkey { keys } => {
                let names: Vec<&str> = keys.iter().map(Key::as_str).collect();
                write!(f, "HOTKEY ({})", names.join(" + "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let cmd = ActionCommand::DragTo {
            x: 10,
            y: 20,
            duration_ms: 10,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("drag_to"));
        assert!(json.contains("duration_ms"));
    }

    #[test]
    fn test_hotkey_display() {
        let cmd = ActionCommand::Hotkey {
            keys: vec![Key::Control, Key::Plus],
        };
        assert_eq!(cmd.to_string(), "HOTKEY (ctrl + +)");
    }
}
