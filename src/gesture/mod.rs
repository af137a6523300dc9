//! Gesture recognition module
//!
//! Turns one frame's hand pose into a raw gesture label and stabilizes
//! labels across frames:
//! - pose: keypoints, hand poses and finger-state extraction
//! - classifier: stateless finger-state + distance rules
//! - stabilizer: windowed majority vote with a consensus gate, plus
//!   swipe direction over the same position window

mod classifier;
mod label;
mod pose;
mod stabilizer;

pub use classifier::{classify, GestureThresholds};
pub use label::{GestureLabel, SwipeDirection};
pub use pose::{FingerState, HandPose, Keypoint, NormalizedPoint};
pub use stabilizer::{GestureSample, TemporalStabilizer};
