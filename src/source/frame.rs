//! Pose frame wire format
//!
//! One JSON object per line:
//! `{"hands_found": true, "landmarks": [{"id": 0, "x": 320, "y": 240}, ...], "frame_size": [640, 480]}`

use serde::{Deserialize, Serialize};

use crate::gesture::Keypoint;

/// Errors decoding a frame
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame size must be non-zero, got {0}x{1}")]
    EmptyFrame(u32, u32),
}

/// One frame of pose-estimation output for the primary hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub hands_found: bool,
    /// Landmarks of hand 0, ordered by id
    #[serde(default)]
    pub landmarks: Vec<Keypoint>,
    /// Camera frame (width, height) in pixels
    pub frame_size: (u32, u32),
}

impl PoseFrame {
    /// Decode and validate one line of input
    pub fn from_json_line(line: &str) -> Result<Self, FrameError> {
        let frame: PoseFrame = serde_json::from_str(line)?;
        let (width, height) = frame.frame_size;
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyFrame(width, height));
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_without_hand() {
        let frame = PoseFrame::from_json_line(r#"{"hands_found":false,"frame_size":[640,480]}"#)
            .unwrap();
        assert!(!frame.hands_found);
        assert!(frame.landmarks.is_empty());
        assert_eq!(frame.frame_size, (640, 480));
    }

    #[test]
    fn test_landmarks_decoded() {
        let line = r#"{"hands_found":true,"landmarks":[{"id":0,"x":1.5,"y":2},{"id":1,"x":3,"y":4,"z":-0.1}],"frame_size":[640,480]}"#;
        let frame = PoseFrame::from_json_line(line).unwrap();
        assert_eq!(frame.landmarks.len(), 2);
        assert_eq!(frame.landmarks[0], Keypoint::new(0, 1.5, 2.0));
        assert_eq!(frame.landmarks[1].z, -0.1);
    }

    #[test]
    fn test_invalid_frames_rejected() {
        assert!(matches!(
            PoseFrame::from_json_line(r#"{"hands_found":false,"frame_size":[0,480]}"#),
            Err(FrameError::EmptyFrame(0, 480))
        ));
        assert!(matches!(
            PoseFrame::from_json_line("not json"),
            Err(FrameError::Json(_))
        ));
    }
}
