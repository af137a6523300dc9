//! Action dispatcher state machine
//!
//! Consumes one stabilized gesture per frame and issues pointer and
//! keyboard commands through an `InputBackend`. Cooldowns are measured
//! against the `now` passed in by the caller.
//!
//! The primary button is never left held across a gesture change: any
//! gesture other than drag or click releases it before acting.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::events::PipelineEvent;
use crate::gesture::{GestureLabel, NormalizedPoint};
use crate::input::{ActionCommand, InputBackend, Key};
use crate::pointer::{should_move, PointerMapper, ScreenPoint, ScreenSize};

/// Minimum normalized vertical travel before a scroll is considered
const SCROLL_DEADBAND: f64 = 0.01;

/// Duration attached to each drag step
const DRAG_STEP_MS: u64 = 10;

/// Dispatcher modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Nothing in progress
    Idle,
    /// Pointer follows the hand
    Pointing,
    /// Primary button held for a drag
    Pressed,
    /// Vertical hand movement scrolls
    Scrolling,
    /// Pinch distance zooms
    Zooming,
    /// Stop gesture or emergency stop
    Stopped,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Idle => write!(f, "Idle"),
            Mode::Pointing => write!(f, "Pointing"),
            Mode::Pressed => write!(f, "Pressed"),
            Mode::Scrolling => write!(f, "Scrolling"),
            Mode::Zooming => write!(f, "Zooming"),
            Mode::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Per-frame gesture data handed to the dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GestureData {
    /// Window-smoothed normalized position
    pub position: NormalizedPoint,
    pub thumb_index_distance: f64,
    pub index_middle_distance: f64,
}

/// Tunables read from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherSettings {
    pub sensitivity: f64,
    pub movement_threshold: f64,
    pub click_cooldown: Duration,
    pub scroll_cooldown: Duration,
    pub scroll_sensitivity: f64,
    pub zoom_in_distance: f64,
    pub zoom_out_distance: f64,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for DispatcherSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            sensitivity: settings.sensitivity.mouse_movement,
            movement_threshold: settings.detection.movement_threshold,
            click_cooldown: settings.timing.click_cooldown(),
            scroll_cooldown: settings.timing.scroll_cooldown(),
            scroll_sensitivity: settings.sensitivity.scroll_sensitivity,
            zoom_in_distance: settings.gestures.zoom_in_distance,
            zoom_out_distance: settings.gestures.zoom_out_distance,
        }
    }
}

/// State mutated only by the dispatcher
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatcherState {
    pub mode: Mode,
    pub is_button_down: bool,
    pub last_click_time: Option<Instant>,
    pub last_scroll_time: Option<Instant>,
    pub last_pointer_position: Option<ScreenPoint>,
}

/// Converts stabilized gestures into input commands
pub struct ActionDispatcher<B: InputBackend> {
    backend: B,
    settings: DispatcherSettings,
    screen: ScreenSize,
    mapper: PointerMapper,
    state: DispatcherState,
    /// Normalized y that scroll deltas are measured from
    scroll_anchor: Option<f64>,
    /// When the button went down, for release durations
    pressed_at: Option<Instant>,
    /// Channel for emitting pipeline events
    event_tx: broadcast::Sender<PipelineEvent>,
}

impl<B: InputBackend> ActionDispatcher<B> {
    /// Create a dispatcher in `Idle` mode
    pub fn new(
        backend: B,
        settings: DispatcherSettings,
        event_tx: broadcast::Sender<PipelineEvent>,
    ) -> Self {
        let screen = backend.screen_size();
        info!(
            backend = backend.name(),
            width = screen.width,
            height = screen.height,
            "action dispatcher ready"
        );
        Self {
            backend,
            settings,
            screen,
            mapper: PointerMapper::new(),
            state: DispatcherState::default(),
            scroll_anchor: None,
            pressed_at: None,
            event_tx,
        }
    }

    pub fn state(&self) -> &DispatcherState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn is_button_down(&self) -> bool {
        self.state.is_button_down
    }

    pub fn sensitivity(&self) -> f64 {
        self.settings.sensitivity
    }

    /// Set pointer sensitivity, clamped to [0.1, 3.0]
    pub fn set_sensitivity(&mut self, sensitivity: f64) -> f64 {
        let clamped = if sensitivity.is_finite() {
            sensitivity.clamp(crate::pointer::MIN_SENSITIVITY, crate::pointer::MAX_SENSITIVITY)
        } else {
            self.settings.sensitivity
        };
        info!(requested = sensitivity, sensitivity = clamped, "sensitivity set");
        self.settings.sensitivity = clamped;
        clamped
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Act on one stabilized gesture
    pub fn dispatch(&mut self, gesture: GestureLabel, data: &GestureData, now: Instant) {
        let keeps_button = matches!(gesture, GestureLabel::Drag | GestureLabel::Click);
        if !keeps_button && !self.release_button(now) {
            // Release failed; retry next frame before doing anything else
            return;
        }

        if gesture != GestureLabel::Scroll {
            self.scroll_anchor = None;
        }

        let next_mode = match gesture {
            GestureLabel::Pointing => {
                self.move_pointer(data.position);
                Mode::Pointing
            }
            GestureLabel::Click => {
                if self.state.is_button_down {
                    debug!("click ignored while button is held");
                    Mode::Pressed
                } else {
                    self.click(data, now);
                    Mode::Pointing
                }
            }
            GestureLabel::Drag => {
                if self.drag(data, now) {
                    Mode::Pressed
                } else {
                    self.state.mode
                }
            }
            GestureLabel::Scroll => {
                self.scroll(data, now);
                Mode::Scrolling
            }
            GestureLabel::Zoom => {
                self.zoom(data, now);
                Mode::Zooming
            }
            GestureLabel::OpenPalm | GestureLabel::Fist => Mode::Stopped,
            GestureLabel::None | GestureLabel::Unknown | GestureLabel::Peace => Mode::Idle,
        };

        self.transition_to(next_mode);
    }

    /// Release any held button; safe to call at any time
    pub fn emergency_stop(&mut self, now: Instant) {
        if !self.release_button(now) {
            warn!("emergency stop could not release the button");
        }
        self.scroll_anchor = None;
        self.transition_to(Mode::Stopped);
        info!("emergency stop executed");
        let _ = self.event_tx.send(PipelineEvent::EmergencyStop);
    }

    /// Emergency stop plus clearing pointer smoothing
    pub fn reset(&mut self, now: Instant) {
        self.emergency_stop(now);
        self.mapper.reset();
        self.transition_to(Mode::Idle);
    }

    /// Move through the smoothing filter and dead-zone gate.
    ///
    /// Returns false only when the backend rejected the move.
    fn move_pointer(&mut self, position: NormalizedPoint) -> bool {
        let target = self.mapper.map(position, self.settings.sensitivity, self.screen);
        if !should_move(target, self.state.last_pointer_position, self.settings.movement_threshold) {
            return true;
        }
        if self.execute(ActionCommand::MoveTo {
            x: target.x,
            y: target.y,
        }) {
            self.state.last_pointer_position = Some(target);
            true
        } else {
            false
        }
    }

    fn click(&mut self, data: &GestureData, now: Instant) {
        if cooling_down(self.state.last_click_time, self.settings.click_cooldown, now) {
            return;
        }
        if !self.move_pointer(data.position) {
            return;
        }
        if self.execute(ActionCommand::Click) {
            self.state.last_click_time = Some(now);
            let at = self.state.last_pointer_position.unwrap_or_default();
            info!(x = at.x, y = at.y, "click executed");
            let _ = self.event_tx.send(PipelineEvent::Clicked { x: at.x, y: at.y });
        }
    }

    /// Press on the first drag frame, then follow the hand.
    ///
    /// Returns whether the button is down afterwards.
    fn drag(&mut self, data: &GestureData, now: Instant) -> bool {
        if !self.state.is_button_down {
            if !self.execute(ActionCommand::ButtonDown) {
                return false;
            }
            self.state.is_button_down = true;
            self.pressed_at = Some(now);
            info!("drag started");
            let _ = self.event_tx.send(PipelineEvent::ButtonPressed);
        }

        let target = self
            .mapper
            .to_screen(data.position, self.settings.sensitivity, self.screen);
        if self.execute(ActionCommand::DragTo {
            x: target.x,
            y: target.y,
            duration_ms: DRAG_STEP_MS,
        }) {
            self.state.last_pointer_position = Some(target);
        }
        true
    }

    fn scroll(&mut self, data: &GestureData, now: Instant) {
        let y = data.position.y;
        let Some(anchor) = self.scroll_anchor else {
            self.scroll_anchor = Some(y);
            return;
        };

        let delta = y - anchor;
        if delta.abs() <= SCROLL_DEADBAND {
            return;
        }
        if cooling_down(self.state.last_scroll_time, self.settings.scroll_cooldown, now) {
            return;
        }

        let amount = (delta * self.settings.scroll_sensitivity).round() as i32;
        if amount == 0 {
            return;
        }
        if self.execute(ActionCommand::Scroll { amount }) {
            self.state.last_scroll_time = Some(now);
            self.scroll_anchor = Some(y);
        }
    }

    fn zoom(&mut self, data: &GestureData, now: Instant) {
        if cooling_down(self.state.last_scroll_time, self.settings.scroll_cooldown, now) {
            return;
        }

        let distance = data.thumb_index_distance;
        let key = if distance > self.settings.zoom_in_distance {
            Key::Plus
        } else if distance < self.settings.zoom_out_distance {
            Key::Minus
        } else {
            return;
        };

        if self.execute(ActionCommand::Hotkey {
            keys: vec![Key::Control, key],
        }) {
            self.state.last_scroll_time = Some(now);
        }
    }

    /// Issue ButtonUp if the button is held.
    ///
    /// Returns false when the release failed and the button is still down.
    fn release_button(&mut self, now: Instant) -> bool {
        if !self.state.is_button_down {
            return true;
        }
        if !self.execute(ActionCommand::ButtonUp) {
            return false;
        }

        self.state.is_button_down = false;
        let duration_ms = self
            .pressed_at
            .take()
            .map(|t| now.saturating_duration_since(t).as_millis() as u64)
            .unwrap_or(0);
        info!(duration_ms, "button released");
        let _ = self.event_tx.send(PipelineEvent::ButtonReleased { duration_ms });
        true
    }

    /// Run one command, logging and swallowing backend failures
    fn execute(&mut self, command: ActionCommand) -> bool {
        debug!(%command, "executing action");
        match self.backend.execute(&command) {
            Ok(()) => true,
            Err(e) => {
                warn!(%command, error = %e, "action failed, dropping");
                let _ = self.event_tx.send(PipelineEvent::ActionFailed {
                    command: command.to_string(),
                    error: e.to_string(),
                });
                false
            }
        }
    }

    fn transition_to(&mut self, new_mode: Mode) {
        let old_mode = self.state.mode;
        if old_mode == new_mode {
            return;
        }
        info!(from = %old_mode, to = %new_mode, "mode transition");
        self.state.mode = new_mode;
        let _ = self.event_tx.send(PipelineEvent::ModeChanged {
            from: old_mode,
            to: new_mode,
        });
    }
}

impl<B: InputBackend> Drop for ActionDispatcher<B> {
    fn drop(&mut self) {
        if self.state.is_button_down {
            warn!("dispatcher dropped with button held, releasing");
            if let Err(e) = self.backend.execute(&ActionCommand::ButtonUp) {
                warn!(error = %e, "final button release failed");
            }
        }
    }
}

/// True while `cooldown` has not elapsed since `last`
fn cooling_down(last: Option<Instant>, cooldown: Duration, now: Instant) -> bool {
    last.map_or(false, |t| now.saturating_duration_since(t) < cooldown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::testing::RecordingBackend;

    fn create_dispatcher() -> (
        ActionDispatcher<RecordingBackend>,
        broadcast::Receiver<PipelineEvent>,
    ) {
        let (tx, rx) = broadcast::channel(64);
        let backend = RecordingBackend::new(1000, 1000);
        (ActionDispatcher::new(backend, DispatcherSettings::default(), tx), rx)
    }

    fn at(x: f64, y: f64) -> GestureData {
        GestureData {
            position: NormalizedPoint::new(x, y),
            thumb_index_distance: 45.0,
            index_middle_distance: 20.0,
        }
    }

    fn is_button_down(c: &ActionCommand) -> bool {
        matches!(c, ActionCommand::ButtonDown)
    }

    fn is_button_up(c: &ActionCommand) -> bool {
        matches!(c, ActionCommand::ButtonUp)
    }

    fn is_move(c: &ActionCommand) -> bool {
        matches!(c, ActionCommand::MoveTo { .. })
    }

    #[test]
    fn test_initial_state() {
        let (d, _) = create_dispatcher();
        assert_eq!(d.mode(), Mode::Idle);
        assert!(!d.is_button_down());
    }

    #[test]
    fn test_pointing_moves_pointer() {
        let (mut d, _) = create_dispatcher();
        d.dispatch(GestureLabel::Pointing, &at(0.5, 0.25), Instant::now());
        assert_eq!(d.backend().commands, vec![ActionCommand::MoveTo { x: 500, y: 250 }]);
        assert_eq!(d.mode(), Mode::Pointing);
        assert_eq!(d.state().last_pointer_position, Some(ScreenPoint::new(500, 250)));
    }

    #[test]
    fn test_dead_zone_suppresses_jitter() {
        let (mut d, _) = create_dispatcher();
        let t0 = Instant::now();
        d.dispatch(GestureLabel::Pointing, &at(0.5, 0.5), t0);
        // Smoothed to ~(502, 500): within 4px of the last move
        d.dispatch(GestureLabel::Pointing, &at(0.503, 0.5), t0);
        assert_eq!(d.backend().count(is_move), 1);
    }

    #[test]
    fn test_dead_zone_passes_real_movement() {
        let (mut d, _) = create_dispatcher();
        let t0 = Instant::now();
        d.dispatch(GestureLabel::Pointing, &at(0.5, 0.5), t0);
        // Smoothed to (510, 500): 10px away
        d.dispatch(GestureLabel::Pointing, &at(0.52, 0.5), t0);
        assert_eq!(d.backend().count(is_move), 2);
        assert_eq!(d.state().last_pointer_position, Some(ScreenPoint::new(510, 500)));
    }

    #[test]
    fn test_drag_press_once_release_once() {
        let (mut d, _) = create_dispatcher();
        let t0 = Instant::now();
        d.dispatch(GestureLabel::Drag, &at(0.1, 0.1), t0);
        assert!(d.is_button_down());
        assert_eq!(d.mode(), Mode::Pressed);
        d.dispatch(GestureLabel::Drag, &at(0.2, 0.2), t0 + Duration::from_millis(33));
        d.dispatch(GestureLabel::None, &at(0.2, 0.2), t0 + Duration::from_millis(66));

        let b = d.backend();
        assert_eq!(b.count(is_button_down), 1);
        assert_eq!(b.count(is_button_up), 1);
        assert_eq!(b.count(|c| matches!(c, ActionCommand::DragTo { .. })), 2);
        assert_eq!(b.commands.first(), Some(&ActionCommand::ButtonDown));
        assert_eq!(b.commands.last(), Some(&ActionCommand::ButtonUp));
        assert!(!d.is_button_down());
        assert_eq!(d.mode(), Mode::Idle);
    }

    #[test]
    fn test_any_other_gesture_releases_before_acting() {
        for gesture in [
            GestureLabel::Pointing,
            GestureLabel::Scroll,
            GestureLabel::Zoom,
            GestureLabel::OpenPalm,
            GestureLabel::Fist,
            GestureLabel::Unknown,
        ] {
            let (mut d, _) = create_dispatcher();
            let t0 = Instant::now();
            d.dispatch(GestureLabel::Drag, &at(0.1, 0.1), t0);
            d.dispatch(gesture, &at(0.6, 0.6), t0 + Duration::from_secs(1));
            assert!(!d.is_button_down(), "{gesture} left the button down");
            let up_index = d.backend().commands.iter().position(is_button_up);
            let first_after_drag = d
                .backend()
                .commands
                .iter()
                .position(|c| !matches!(c, ActionCommand::ButtonDown | ActionCommand::DragTo { .. }));
            assert_eq!(up_index, first_after_drag, "{gesture} acted before releasing");
        }
    }

    #[test]
    fn test_click_keeps_drag_alive() {
        let (mut d, _) = create_dispatcher();
        let t0 = Instant::now();
        d.dispatch(GestureLabel::Drag, &at(0.1, 0.1), t0);
        d.dispatch(GestureLabel::Click, &at(0.1, 0.1), t0 + Duration::from_secs(1));
        assert!(d.is_button_down());
        assert_eq!(d.backend().count(|c| matches!(c, ActionCommand::Click)), 0);
        assert_eq!(d.mode(), Mode::Pressed);
    }

    #[test]
    fn test_click_cooldown() {
        let clicks = |gap_ms: u64| {
            let (mut d, _) = create_dispatcher();
            let t0 = Instant::now();
            d.dispatch(GestureLabel::Click, &at(0.5, 0.5), t0);
            d.dispatch(GestureLabel::Click, &at(0.5, 0.5), t0 + Duration::from_millis(gap_ms));
            d.backend().count(|c| matches!(c, ActionCommand::Click))
        };
        assert_eq!(clicks(100), 1);
        assert_eq!(clicks(400), 2);
    }

    #[test]
    fn test_click_moves_before_clicking() {
        let (mut d, mut rx) = create_dispatcher();
        d.dispatch(GestureLabel::Click, &at(0.3, 0.3), Instant::now());
        assert_eq!(
            d.backend().commands,
            vec![ActionCommand::MoveTo { x: 300, y: 300 }, ActionCommand::Click]
        );

        let mut saw_click = false;
        while let Ok(event) = rx.try_recv() {
            saw_click |= matches!(event, PipelineEvent::Clicked { x: 300, y: 300 });
        }
        assert!(saw_click);
    }

    #[test]
    fn test_scroll_measures_from_anchor() {
        let (mut d, _) = create_dispatcher();
        let t0 = Instant::now();
        // First frame anchors, small moves are ignored
        d.dispatch(GestureLabel::Scroll, &at(0.5, 0.40), t0);
        d.dispatch(GestureLabel::Scroll, &at(0.5, 0.405), t0 + Duration::from_millis(200));
        assert!(d.backend().commands.is_empty());

        d.dispatch(GestureLabel::Scroll, &at(0.5, 0.60), t0 + Duration::from_millis(400));
        assert_eq!(d.backend().commands, vec![ActionCommand::Scroll { amount: 1 }]);
        assert_eq!(d.mode(), Mode::Scrolling);

        // Cooldown: a second big move 50ms later is dropped
        d.dispatch(GestureLabel::Scroll, &at(0.5, 0.20), t0 + Duration::from_millis(450));
        assert_eq!(d.backend().commands.len(), 1);

        d.dispatch(GestureLabel::Scroll, &at(0.5, 0.20), t0 + Duration::from_millis(600));
        assert_eq!(d.backend().commands.last(), Some(&ActionCommand::Scroll { amount: -2 }));
    }

    #[test]
    fn test_zoom_directions_and_cooldown() {
        let (mut d, _) = create_dispatcher();
        let t0 = Instant::now();
        let mut data = at(0.5, 0.5);

        data.thumb_index_distance = 80.0;
        d.dispatch(GestureLabel::Zoom, &data, t0);
        data.thumb_index_distance = 10.0;
        d.dispatch(GestureLabel::Zoom, &data, t0 + Duration::from_millis(50));
        d.dispatch(GestureLabel::Zoom, &data, t0 + Duration::from_millis(200));
        data.thumb_index_distance = 45.0;
        d.dispatch(GestureLabel::Zoom, &data, t0 + Duration::from_millis(400));

        assert_eq!(
            d.backend().commands,
            vec![
                ActionCommand::Hotkey {
                    keys: vec![Key::Control, Key::Plus]
                },
                ActionCommand::Hotkey {
                    keys: vec![Key::Control, Key::Minus]
                },
            ]
        );
    }

    #[test]
    fn test_backend_failure_leaves_state_unchanged() {
        let (mut d, mut rx) = create_dispatcher();
        let t0 = Instant::now();
        d.backend_mut().failing = true;

        d.dispatch(GestureLabel::Drag, &at(0.1, 0.1), t0);
        assert!(!d.is_button_down());
        d.dispatch(GestureLabel::Click, &at(0.1, 0.1), t0);
        assert_eq!(d.state().last_click_time, None);

        // Backend recovers: next frame retries the click without cooldown
        d.backend_mut().failing = false;
        d.dispatch(GestureLabel::Click, &at(0.1, 0.1), t0 + Duration::from_millis(10));
        assert_eq!(d.backend().count(|c| matches!(c, ActionCommand::Click)), 1);

        let mut failures = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, PipelineEvent::ActionFailed { .. }) {
                failures += 1;
            }
        }
        assert!(failures >= 2);
    }

    #[test]
    fn test_failed_release_is_retried() {
        let (mut d, _) = create_dispatcher();
        let t0 = Instant::now();
        d.dispatch(GestureLabel::Drag, &at(0.1, 0.1), t0);

        d.backend_mut().failing = true;
        d.dispatch(GestureLabel::Pointing, &at(0.5, 0.5), t0 + Duration::from_millis(33));
        assert!(d.is_button_down());

        d.backend_mut().failing = false;
        d.dispatch(GestureLabel::Pointing, &at(0.5, 0.5), t0 + Duration::from_millis(66));
        assert!(!d.is_button_down());
        assert_eq!(d.backend().count(is_button_up), 1);
    }

    #[test]
    fn test_emergency_stop_is_idempotent() {
        let (mut d, _) = create_dispatcher();
        let t0 = Instant::now();
        d.dispatch(GestureLabel::Drag, &at(0.1, 0.1), t0);
        d.emergency_stop(t0);
        d.emergency_stop(t0);
        assert_eq!(d.backend().count(is_button_up), 1);
        assert_eq!(d.mode(), Mode::Stopped);

        let (mut idle, _) = create_dispatcher();
        idle.emergency_stop(t0);
        assert!(idle.backend().commands.is_empty());
    }

    #[test]
    fn test_emergency_stop_uses_caller_clock() {
        let (mut d, mut rx) = create_dispatcher();
        let t0 = Instant::now();
        d.dispatch(GestureLabel::Drag, &at(0.1, 0.1), t0);
        d.emergency_stop(t0 + Duration::from_millis(750));

        let released: Vec<u64> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|e| match e {
                PipelineEvent::ButtonReleased { duration_ms } => Some(duration_ms),
                _ => None,
            })
            .collect();
        assert_eq!(released, vec![750]);
    }

    #[test]
    fn test_sensitivity_is_clamped() {
        let (mut d, _) = create_dispatcher();
        assert_eq!(d.set_sensitivity(10.0), 3.0);
        assert_eq!(d.set_sensitivity(0.0), 0.1);
        assert_eq!(d.set_sensitivity(f64::NAN), 0.1);
    }
}
