//! Gesture label definitions

use serde::{Deserialize, Serialize};

/// Discrete gesture recognized for a frame or a stabilized window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureLabel {
    /// No hand, or no label with a clear majority
    None,
    /// Only the index finger extended
    Pointing,
    /// Thumb and index pinched
    Click,
    /// Thumb and index pinched tightly
    Drag,
    /// Index and middle extended
    Scroll,
    /// Index, middle and ring extended
    Zoom,
    /// Index and middle extended (shadowed by scroll)
    Peace,
    /// Four or more fingers extended
    OpenPalm,
    /// No fingers extended
    Fist,
    /// Anything else
    Unknown,
}

impl GestureLabel {
    /// Number of distinct labels
    pub const COUNT: usize = 10;

    /// Every label, in declaration order
    pub const ALL: [GestureLabel; Self::COUNT] = [
        GestureLabel::None,
        GestureLabel::Pointing,
        GestureLabel::Click,
        GestureLabel::Drag,
        GestureLabel::Scroll,
        GestureLabel::Zoom,
        GestureLabel::Peace,
        GestureLabel::OpenPalm,
        GestureLabel::Fist,
        GestureLabel::Unknown,
    ];

    /// Dense index used by vote counters
    pub fn index(self) -> usize {
        self as usize
    }

    /// Wire name of the label
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureLabel::None => "none",
            GestureLabel::Pointing => "pointing",
            GestureLabel::Click => "click",
            GestureLabel::Drag => "drag",
            GestureLabel::Scroll => "scroll",
            GestureLabel::Zoom => "zoom",
            GestureLabel::Peace => "peace",
            GestureLabel::OpenPalm => "open_palm",
            GestureLabel::Fist => "fist",
            GestureLabel::Unknown => "unknown",
        }
    }
}

impl Default for GestureLabel {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dominant direction of hand travel across the position window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    None,
    Left,
    Right,
    Up,
    Down,
}

impl Default for SwipeDirection {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for SwipeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SwipeDirection::None => "none",
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
        };
        f.write_str(name)
    }
}
