//! Hand pose primitives and finger-state extraction

use serde::{Deserialize, Serialize};

/// Number of keypoints in a hand pose
pub const KEYPOINT_COUNT: usize = 21;

/// Keypoint ids used by the pipeline
pub mod ids {
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_TIP: usize = 16;
    pub const PINKY_TIP: usize = 20;

    /// Tips of index, middle, ring and pinky
    pub const FINGER_TIPS: [usize; 4] = [INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];
    /// PIP joints paired with `FINGER_TIPS`
    pub const FINGER_PIPS: [usize; 4] = [6, 10, 14, 18];
}

/// One tracked hand landmark in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub id: u8,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Keypoint {
    pub fn new(id: u8, x: f64, y: f64) -> Self {
        Self { id, x, y, z: 0.0 }
    }

    /// Euclidean distance in the image plane
    pub fn distance_to(&self, other: &Keypoint) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// A point in normalized frame space, nominally [0,1] x [0,1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// All 21 keypoints of one hand for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct HandPose {
    keypoints: Vec<Keypoint>,
}

impl HandPose {
    /// Build a pose from landmarks ordered by id.
    ///
    /// Returns `None` when fewer than 21 landmarks are present; extra
    /// landmarks are ignored.
    pub fn from_landmarks(mut landmarks: Vec<Keypoint>) -> Option<Self> {
        if landmarks.len() < KEYPOINT_COUNT {
            return None;
        }
        landmarks.truncate(KEYPOINT_COUNT);
        Some(Self { keypoints: landmarks })
    }

    pub fn keypoint(&self, id: usize) -> &Keypoint {
        &self.keypoints[id]
    }

    pub fn thumb_index_distance(&self) -> f64 {
        self.keypoint(ids::THUMB_TIP)
            .distance_to(self.keypoint(ids::INDEX_TIP))
    }

    pub fn index_middle_distance(&self) -> f64 {
        self.keypoint(ids::INDEX_TIP)
            .distance_to(self.keypoint(ids::MIDDLE_TIP))
    }

    /// Index fingertip divided by the frame size
    pub fn normalized_index_tip(&self, frame_size: (u32, u32)) -> NormalizedPoint {
        let tip = self.keypoint(ids::INDEX_TIP);
        let (width, height) = frame_size;
        NormalizedPoint {
            x: tip.x / f64::from(width.max(1)),
            y: tip.y / f64::from(height.max(1)),
        }
    }
}

/// Extended/flexed state of each finger, thumb to pinky
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FingerState(pub [bool; 5]);

impl FingerState {
    /// Derive finger states from a pose.
    ///
    /// The thumb is compared horizontally against its IP joint; the other
    /// fingers are extended when the tip sits above the PIP joint.
    pub fn from_pose(pose: &HandPose) -> Self {
        let mut fingers = [false; 5];
        fingers[0] = pose.keypoint(ids::THUMB_TIP).x < pose.keypoint(ids::THUMB_IP).x;
        for (slot, (tip, pip)) in ids::FINGER_TIPS.iter().zip(ids::FINGER_PIPS).enumerate() {
            fingers[slot + 1] = pose.keypoint(*tip).y < pose.keypoint(pip).y;
        }
        Self(fingers)
    }

    /// Build from a 0/1 pattern
    pub fn from_pattern(pattern: [u8; 5]) -> Self {
        Self(pattern.map(|bit| bit != 0))
    }

    /// Number of extended fingers
    pub fn count(&self) -> usize {
        self.0.iter().filter(|extended| **extended).count()
    }

    /// Exact match against a 0/1 pattern
    pub fn matches(&self, pattern: [u8; 5]) -> bool {
        *self == Self::from_pattern(pattern)
    }

    pub fn thumb(&self) -> bool {
        self.0[0]
    }

    pub fn index(&self) -> bool {
        self.0[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pose with every finger curled: tips below their PIP joints and the
    /// thumb tip to the right of its IP joint.
    fn curled_pose() -> Vec<Keypoint> {
        (0..KEYPOINT_COUNT as u8)
            .map(|id| Keypoint::new(id, 100.0 + f64::from(id), 200.0 + f64::from(id)))
            .collect()
    }

    #[test]
    fn test_short_landmark_list_rejected() {
        let mut landmarks = curled_pose();
        landmarks.pop();
        assert!(HandPose::from_landmarks(landmarks).is_none());
    }

    #[test]
    fn test_curled_pose_is_fist() {
        let pose = HandPose::from_landmarks(curled_pose()).unwrap();
        let fingers = FingerState::from_pose(&pose);
        assert_eq!(fingers.count(), 0);
    }

    #[test]
    fn test_index_extended() {
        let mut landmarks = curled_pose();
        landmarks[ids::INDEX_TIP].y = 50.0;
        let pose = HandPose::from_landmarks(landmarks).unwrap();
        let fingers = FingerState::from_pose(&pose);
        assert!(fingers.matches([0, 1, 0, 0, 0]));
    }

    #[test]
    fn test_thumb_compared_horizontally() {
        let mut landmarks = curled_pose();
        landmarks[ids::THUMB_TIP].x = 10.0;
        let pose = HandPose::from_landmarks(landmarks).unwrap();
        assert!(FingerState::from_pose(&pose).thumb());
    }

    #[test]
    fn test_distances_and_normalization() {
        let mut landmarks = curled_pose();
        landmarks[ids::THUMB_TIP] = Keypoint::new(4, 0.0, 0.0);
        landmarks[ids::INDEX_TIP] = Keypoint::new(8, 30.0, 40.0);
        let pose = HandPose::from_landmarks(landmarks).unwrap();
        assert!((pose.thumb_index_distance() - 50.0).abs() < 1e-9);

        let normalized = pose.normalized_index_tip((60, 80));
        assert!((normalized.x - 0.5).abs() < 1e-9);
        assert!((normalized.y - 0.5).abs() < 1e-9);
    }
}
