//! Per-frame glue between recognition and dispatch

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::dispatcher::{ActionDispatcher, DispatcherSettings, GestureData, Mode};
use crate::config::Settings;
use crate::events::PipelineEvent;
use crate::gesture::{
    classify, FingerState, GestureLabel, GestureSample, GestureThresholds, HandPose,
    NormalizedPoint, SwipeDirection, TemporalStabilizer,
};
use crate::input::InputBackend;
use crate::pointer::ControlZone;
use crate::source::PoseFrame;

/// Snapshot of the pipeline for status queries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub control_enabled: bool,
    pub mode: Mode,
    pub gesture: GestureLabel,
    pub button_down: bool,
    pub sensitivity: f64,
    pub frames_processed: u64,
    pub backend: String,
}

/// Result of processing one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOutcome {
    /// Classifier output, `None` when no usable hand was present
    pub raw: GestureLabel,
    /// Stabilized label
    pub stable: GestureLabel,
    /// Whether the stabilized label was handed to the dispatcher
    pub dispatched: bool,
    /// Swipe read from the position window this frame
    pub swipe: SwipeDirection,
}

/// Recognition options derived from settings
#[derive(Debug, Clone)]
struct RecognitionOptions {
    thresholds: GestureThresholds,
    hold_threshold: Duration,
    mirror_x: bool,
    swipe_distance: f64,
    control_zone: ControlZone,
}

/// Owns the stabilizer and dispatcher; processes one frame at a time
pub struct GesturePipeline<B: InputBackend> {
    options: RecognitionOptions,
    stabilizer: TemporalStabilizer,
    dispatcher: ActionDispatcher<B>,
    control_enabled: bool,
    /// Last stabilized label
    current_gesture: GestureLabel,
    /// Whether a hold was already reported for `current_gesture`
    held_reported: bool,
    /// Last swipe reported, so each one is published once
    last_swipe: SwipeDirection,
    frames_processed: u64,
    backend_name: &'static str,
    event_tx: broadcast::Sender<PipelineEvent>,
}

impl<B: InputBackend> GesturePipeline<B> {
    pub fn new(backend: B, settings: &Settings, event_tx: broadcast::Sender<PipelineEvent>) -> Self {
        let backend_name = backend.name();
        let dispatcher =
            ActionDispatcher::new(backend, DispatcherSettings::from(settings), event_tx.clone());
        Self {
            options: RecognitionOptions {
                thresholds: settings.gestures.clone(),
                hold_threshold: settings.timing.hold_threshold(),
                mirror_x: settings.detection.mirror_x,
                swipe_distance: settings.detection.swipe_distance,
                control_zone: settings.control_zone.clone(),
            },
            stabilizer: TemporalStabilizer::new(settings.detection.smoothing_frames),
            dispatcher,
            control_enabled: true,
            current_gesture: GestureLabel::None,
            held_reported: false,
            last_swipe: SwipeDirection::None,
            frames_processed: 0,
            backend_name,
            event_tx,
        }
    }

    /// Classify, stabilize and (when enabled) dispatch one frame
    pub fn process_frame(&mut self, frame: PoseFrame, now: Instant) -> FrameOutcome {
        self.frames_processed += 1;

        let frame_size = frame.frame_size;
        let pose = if frame.hands_found {
            HandPose::from_landmarks(frame.landmarks)
        } else {
            None
        };

        let hand_seen = pose.is_some();

        // Without a hand only `none` is acted on, whatever the window says
        let (raw, stable, action, data) = match pose {
            Some(pose) => {
                let fingers = FingerState::from_pose(&pose);
                let thumb_index_distance = pose.thumb_index_distance();
                let index_middle_distance = pose.index_middle_distance();
                let raw_position = self.normalize(pose.normalized_index_tip(frame_size));

                let raw = classify(
                    fingers,
                    thumb_index_distance,
                    index_middle_distance,
                    &self.options.thresholds,
                );
                let (stable, position) = self.stabilizer.observe(&GestureSample {
                    label: raw,
                    position: raw_position,
                    thumb_index_distance,
                    index_middle_distance,
                });
                debug!(?fingers, %raw, %stable, "frame classified");

                let data = GestureData {
                    position,
                    thumb_index_distance,
                    index_middle_distance,
                };
                (raw, stable, stable, data)
            }
            None => {
                let (stable, position) = self.stabilizer.observe_absent();
                let data = GestureData {
                    position,
                    ..Default::default()
                };
                if stable != GestureLabel::None {
                    debug!(%stable, "no hand, holding actions");
                }
                (GestureLabel::None, stable, GestureLabel::None, data)
            }
        };

        self.track_gesture(stable, now);
        let swipe = if hand_seen {
            self.track_swipe()
        } else {
            SwipeDirection::None
        };

        if self.control_enabled {
            self.dispatcher.dispatch(action, &data, now);
        }

        FrameOutcome {
            raw,
            stable,
            dispatched: self.control_enabled,
            swipe,
        }
    }

    /// Enable or disable dispatching; every switch forces an emergency stop
    pub fn set_control_enabled(&mut self, enabled: bool, now: Instant) {
        self.dispatcher.emergency_stop(now);
        if self.control_enabled == enabled {
            return;
        }
        self.control_enabled = enabled;
        info!(enabled, "gesture control toggled");
        let _ = self.event_tx.send(PipelineEvent::ControlToggled { enabled });
    }

    pub fn toggle_control(&mut self, now: Instant) -> bool {
        self.set_control_enabled(!self.control_enabled, now);
        self.control_enabled
    }

    /// Clear stabilization history and release held input
    pub fn reset(&mut self, now: Instant) {
        self.stabilizer.reset();
        self.dispatcher.reset(now);
        self.current_gesture = GestureLabel::None;
        self.held_reported = false;
        self.last_swipe = SwipeDirection::None;
        info!("gesture recognizer reset");
        let _ = self.event_tx.send(PipelineEvent::RecognizerReset);
    }

    pub fn set_sensitivity(&mut self, sensitivity: f64) -> f64 {
        self.dispatcher.set_sensitivity(sensitivity)
    }

    pub fn emergency_stop(&mut self, now: Instant) {
        self.dispatcher.emergency_stop(now);
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            control_enabled: self.control_enabled,
            mode: self.dispatcher.mode(),
            gesture: self.current_gesture,
            button_down: self.dispatcher.is_button_down(),
            sensitivity: self.dispatcher.sensitivity(),
            frames_processed: self.frames_processed,
            backend: self.backend_name.to_string(),
        }
    }

    #[cfg(test)]
    pub fn dispatcher(&self) -> &ActionDispatcher<B> {
        &self.dispatcher
    }

    /// Apply mirroring and the control zone
    fn normalize(&self, point: NormalizedPoint) -> NormalizedPoint {
        let point = if self.options.mirror_x {
            NormalizedPoint::new(1.0 - point.x, point.y)
        } else {
            point
        };
        self.options.control_zone.remap(point)
    }

    /// Publish a swipe when the window's direction of travel changes
    fn track_swipe(&mut self) -> SwipeDirection {
        let swipe = self.stabilizer.detect_swipe(self.options.swipe_distance);
        if swipe != self.last_swipe {
            self.last_swipe = swipe;
            if swipe != SwipeDirection::None {
                info!(direction = %swipe, "swipe detected");
                let _ = self.event_tx.send(PipelineEvent::Swiped { direction: swipe });
            }
        }
        swipe
    }

    /// Emit change and hold events for the stabilized label
    fn track_gesture(&mut self, stable: GestureLabel, now: Instant) {
        if stable != self.current_gesture {
            info!(from = %self.current_gesture, to = %stable, "gesture changed");
            let _ = self.event_tx.send(PipelineEvent::GestureChanged {
                from: self.current_gesture,
                to: stable,
            });
            self.current_gesture = stable;
            self.held_reported = false;
        }

        let hold = self.options.hold_threshold;
        let held = self.stabilizer.is_held(stable, hold, now);
        if held && !self.held_reported && stable != GestureLabel::None {
            self.held_reported = true;
            debug!(gesture = %stable, "gesture held");
            let _ = self.event_tx.send(PipelineEvent::GestureHeld {
                gesture: stable,
                held_ms: hold.as_millis() as u64,
            });
        }
    }
}
