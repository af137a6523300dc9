//! Temporal stabilization of per-frame gesture labels
//!
//! Keeps a bounded window of the most recent raw labels and positions and
//! reports a single stabilized label plus a smoothed position per frame.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::trace;

use super::label::{GestureLabel, SwipeDirection};
use super::pose::NormalizedPoint;

/// Default window capacity
pub const DEFAULT_WINDOW: usize = 5;

/// Fewest positions a swipe can be read from
const MIN_SWIPE_SAMPLES: usize = 3;

/// One frame's classification, consumed immediately by the stabilizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSample {
    pub label: GestureLabel,
    pub position: NormalizedPoint,
    pub thumb_index_distance: f64,
    pub index_middle_distance: f64,
}

/// Windowed majority vote with a consensus gate
#[derive(Debug)]
pub struct TemporalStabilizer {
    capacity: usize,
    labels: VecDeque<GestureLabel>,
    positions: VecDeque<NormalizedPoint>,
    /// Last label passed to `is_held`
    previous_gesture: GestureLabel,
    /// When `previous_gesture` last changed
    gesture_started_at: Option<Instant>,
}

impl TemporalStabilizer {
    /// Create a stabilizer with the given window capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            labels: VecDeque::with_capacity(capacity),
            positions: VecDeque::with_capacity(capacity),
            previous_gesture: GestureLabel::None,
            gesture_started_at: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a sample and return the stabilized label and smoothed position
    pub fn observe(&mut self, sample: &GestureSample) -> (GestureLabel, NormalizedPoint) {
        push_bounded(&mut self.positions, sample.position, self.capacity);
        push_bounded(&mut self.labels, sample.label, self.capacity);
        self.current()
    }

    /// Record a frame without a hand: votes `none`, positions untouched
    pub fn observe_absent(&mut self) -> (GestureLabel, NormalizedPoint) {
        push_bounded(&mut self.labels, GestureLabel::None, self.capacity);
        self.current()
    }

    /// Stabilized label and smoothed position for the current window
    pub fn current(&self) -> (GestureLabel, NormalizedPoint) {
        (self.stable_label(), self.smoothed_position())
    }

    /// Arithmetic mean of the position window, `(0,0)` when empty
    pub fn smoothed_position(&self) -> NormalizedPoint {
        if self.positions.is_empty() {
            return NormalizedPoint::default();
        }
        let n = self.positions.len() as f64;
        let (sum_x, sum_y) = self
            .positions
            .iter()
            .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
        NormalizedPoint::new(sum_x / n, sum_y / n)
    }

    /// Plurality label of the window.
    ///
    /// Ties go to the label seen most recently. The winner is replaced by
    /// `none` when its count is below half the window (integer floor).
    pub fn stable_label(&self) -> GestureLabel {
        if self.labels.is_empty() {
            return GestureLabel::None;
        }

        let mut counts = [0usize; GestureLabel::COUNT];
        for label in &self.labels {
            counts[label.index()] += 1;
        }
        let best = counts.iter().copied().max().unwrap_or(0);

        // Newest first so the most recent tied label wins
        let winner = self
            .labels
            .iter()
            .rev()
            .copied()
            .find(|label| counts[label.index()] == best)
            .unwrap_or(GestureLabel::None);

        if best < self.labels.len() / 2 {
            trace!(%winner, count = best, window = self.labels.len(), "no consensus");
            return GestureLabel::None;
        }
        winner
    }

    /// Direction of travel from the oldest to the newest position.
    ///
    /// `None` with fewer than three positions or when the straight-line
    /// travel is shorter than `min_distance`. The larger axis wins; an
    /// exact diagonal counts as vertical.
    pub fn detect_swipe(&self, min_distance: f64) -> SwipeDirection {
        if self.positions.len() < MIN_SWIPE_SAMPLES {
            return SwipeDirection::None;
        }
        let (Some(start), Some(end)) = (self.positions.front(), self.positions.back()) else {
            return SwipeDirection::None;
        };

        let dx = end.x - start.x;
        let dy = end.y - start.y;
        if dx.hypot(dy) < min_distance {
            return SwipeDirection::None;
        }

        if dx.abs() > dy.abs() {
            if dx > 0.0 {
                SwipeDirection::Right
            } else {
                SwipeDirection::Left
            }
        } else if dy > 0.0 {
            SwipeDirection::Down
        } else {
            SwipeDirection::Up
        }
    }

    /// True once `gesture` has been reported unchanged for `min_duration`.
    ///
    /// The timer restarts (and false is returned) whenever `gesture`
    /// differs from the label passed on the previous call.
    pub fn is_held(&mut self, gesture: GestureLabel, min_duration: Duration, now: Instant) -> bool {
        let started = match self.gesture_started_at {
            Some(started) if gesture == self.previous_gesture => started,
            _ => {
                self.previous_gesture = gesture;
                self.gesture_started_at = Some(now);
                return false;
            }
        };
        now.saturating_duration_since(started) >= min_duration
    }

    /// Clear both windows and the hold timer
    pub fn reset(&mut self) {
        self.labels.clear();
        self.positions.clear();
        self.previous_gesture = GestureLabel::None;
        self.gesture_started_at = None;
    }
}

impl Default for TemporalStabilizer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

fn push_bounded<T>(window: &mut VecDeque<T>, value: T, capacity: usize) {
    while window.len() >= capacity {
        window.pop_front();
    }
    window.push_back(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(label: GestureLabel, x: f64, y: f64) -> GestureSample {
        GestureSample {
            label,
            position: NormalizedPoint::new(x, y),
            thumb_index_distance: 0.0,
            index_middle_distance: 0.0,
        }
    }

    fn feed(stabilizer: &mut TemporalStabilizer, labels: &[GestureLabel]) -> GestureLabel {
        let mut last = GestureLabel::None;
        for label in labels {
            last = stabilizer.observe(&sample(*label, 0.5, 0.5)).0;
        }
        last
    }

    #[test]
    fn test_empty_window() {
        let stabilizer = TemporalStabilizer::default();
        let (label, pos) = stabilizer.current();
        assert_eq!(label, GestureLabel::None);
        assert_eq!(pos, NormalizedPoint::default());
    }

    #[test]
    fn test_consensus_majority() {
        use GestureLabel::*;
        let mut stabilizer = TemporalStabilizer::new(5);
        let label = feed(&mut stabilizer, &[Click, Click, Click, Scroll, None]);
        assert_eq!(label, Click);
    }

    #[test]
    fn test_no_consensus_suppressed() {
        use GestureLabel::*;
        let mut stabilizer = TemporalStabilizer::new(5);
        let label = feed(&mut stabilizer, &[Click, Scroll, Zoom, Fist, None]);
        assert_eq!(label, None);
    }

    #[test]
    fn test_tie_goes_to_most_recent() {
        use GestureLabel::*;
        let mut stabilizer = TemporalStabilizer::new(4);
        let label = feed(&mut stabilizer, &[Click, Scroll, Click, Scroll]);
        assert_eq!(label, Scroll);
        let label = feed(&mut stabilizer, &[Click]);
        // Window is now [Scroll, Click, Scroll, Click]
        assert_eq!(label, Click);
    }

    #[test]
    fn test_window_evicts_oldest() {
        use GestureLabel::*;
        let mut stabilizer = TemporalStabilizer::new(3);
        feed(&mut stabilizer, &[Fist, Fist, Fist]);
        let label = feed(&mut stabilizer, &[Pointing, Pointing]);
        assert_eq!(label, Pointing);
    }

    #[test]
    fn test_smoothed_position_is_window_mean() {
        let mut stabilizer = TemporalStabilizer::new(2);
        stabilizer.observe(&sample(GestureLabel::Pointing, 0.0, 0.0));
        stabilizer.observe(&sample(GestureLabel::Pointing, 0.2, 0.4));
        let (_, pos) = stabilizer.observe(&sample(GestureLabel::Pointing, 0.4, 0.8));
        assert!((pos.x - 0.3).abs() < 1e-9);
        assert!((pos.y - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_absent_frames_vote_none_and_keep_position() {
        let mut stabilizer = TemporalStabilizer::new(3);
        stabilizer.observe(&sample(GestureLabel::Pointing, 0.25, 0.75));
        stabilizer.observe_absent();
        let (label, pos) = stabilizer.observe_absent();
        assert_eq!(label, GestureLabel::None);
        assert!((pos.x - 0.25).abs() < 1e-9);
        assert!((pos.y - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_reset_matches_fresh_stabilizer() {
        use GestureLabel::*;
        let mut used = TemporalStabilizer::new(5);
        feed(&mut used, &[Fist, Fist, Zoom, Zoom]);
        used.reset();

        let mut fresh = TemporalStabilizer::new(5);
        let s = sample(Pointing, 0.3, 0.6);
        assert_eq!(used.observe(&s), fresh.observe(&s));
    }

    fn swipe(points: &[(f64, f64)]) -> SwipeDirection {
        let mut stabilizer = TemporalStabilizer::new(5);
        for (x, y) in points {
            stabilizer.observe(&sample(GestureLabel::Pointing, *x, *y));
        }
        stabilizer.detect_swipe(0.1)
    }

    #[test]
    fn test_swipe_directions() {
        assert_eq!(swipe(&[(0.2, 0.5), (0.3, 0.5), (0.5, 0.52)]), SwipeDirection::Right);
        assert_eq!(swipe(&[(0.8, 0.5), (0.6, 0.5), (0.5, 0.45)]), SwipeDirection::Left);
        assert_eq!(swipe(&[(0.5, 0.2), (0.5, 0.4), (0.55, 0.6)]), SwipeDirection::Down);
        assert_eq!(swipe(&[(0.5, 0.8), (0.5, 0.6), (0.48, 0.3)]), SwipeDirection::Up);
    }

    #[test]
    fn test_swipe_needs_samples_and_distance() {
        // Long travel but only two positions
        assert_eq!(swipe(&[(0.1, 0.5), (0.9, 0.5)]), SwipeDirection::None);
        // Enough positions, too little travel
        assert_eq!(swipe(&[(0.5, 0.5), (0.52, 0.5), (0.55, 0.53)]), SwipeDirection::None);
        assert_eq!(TemporalStabilizer::default().detect_swipe(0.1), SwipeDirection::None);
    }

    #[test]
    fn test_swipe_uses_window_ends_only() {
        // Oldest position evicted: travel is measured inside the window
        let mut stabilizer = TemporalStabilizer::new(3);
        for x in [0.0, 0.5, 0.5, 0.5] {
            stabilizer.observe(&sample(GestureLabel::Pointing, x, 0.5));
        }
        assert_eq!(stabilizer.detect_swipe(0.1), SwipeDirection::None);
        stabilizer.observe_absent();
        assert_eq!(stabilizer.detect_swipe(0.1), SwipeDirection::None);
    }

    #[test]
    fn test_is_held_tracks_label_changes() {
        let mut stabilizer = TemporalStabilizer::default();
        let t0 = Instant::now();
        let hold = Duration::from_millis(500);

        assert!(!stabilizer.is_held(GestureLabel::Fist, hold, t0));
        assert!(!stabilizer.is_held(GestureLabel::Fist, hold, t0 + Duration::from_millis(300)));
        assert!(stabilizer.is_held(GestureLabel::Fist, hold, t0 + Duration::from_millis(600)));

        // A different label restarts the timer
        let t1 = t0 + Duration::from_millis(700);
        assert!(!stabilizer.is_held(GestureLabel::OpenPalm, hold, t1));
        assert!(!stabilizer.is_held(GestureLabel::OpenPalm, hold, t1 + Duration::from_millis(100)));
        assert!(stabilizer.is_held(GestureLabel::OpenPalm, hold, t1 + Duration::from_millis(500)));
    }
}
