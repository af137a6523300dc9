//! Global kill-switch listener using macOS CGEventTap
//!
//! Watches system-wide modifier changes on a dedicated thread with its
//! own CFRunLoop and reports the kill-switch chord. Other platforms have
//! no listener; `start` reports `Unsupported`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{error, info};

/// Events sent from the hotkey listener to the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// Kill-switch chord pressed
    KillSwitch,
    /// Event tap was disabled by macOS and has been re-enabled
    TapDisabled,
}

/// Global listener for the kill-switch chord
pub struct HotkeyListener {
    event_tx: mpsc::Sender<HotkeyEvent>,
    running: Arc<AtomicBool>,
}

impl HotkeyListener {
    /// Create a new hotkey listener
    pub fn new(event_tx: mpsc::Sender<HotkeyEvent>) -> Self {
        Self {
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the listener thread.
    ///
    /// The thread runs until `stop()` is called or the receiver is dropped.
    pub fn start(&self) -> Result<(), HotkeyError> {
        if !cfg!(target_os = "macos") {
            return Err(HotkeyError::Unsupported);
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                if let Err(e) = run_event_loop(event_tx, running.clone()) {
                    error!(?e, "hotkey listener error");
                }

                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                HotkeyError::ThreadSpawn(e.to_string())
            })?;

        Ok(())
    }

    /// Stop the listener; the run loop notices within one poll interval
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("global hotkeys are only supported on macOS")]
    Unsupported,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

#[cfg(not(target_os = "macos"))]
fn run_event_loop(
    _event_tx: mpsc::Sender<HotkeyEvent>,
    _running: Arc<AtomicBool>,
) -> Result<(), HotkeyError> {
    Err(HotkeyError::Unsupported)
}

/// Run the CFRunLoop with the event tap
#[cfg(target_os = "macos")]
fn run_event_loop(
    event_tx: mpsc::Sender<HotkeyEvent>,
    running: Arc<AtomicBool>,
) -> Result<(), HotkeyError> {
    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
        CGEventTapPlacement, CGEventTapProxy, CGEventType,
    };
    use tracing::{debug, warn};

    use super::keys::ModifierState;

    /// What the tap callback hands to the loop
    enum TapSignal {
        Flags(CGEventFlags),
        Disabled,
    }

    let mut last_state = ModifierState::default();

    // The callback must stay fast: it only forwards to this channel
    let (callback_tx, callback_rx) = std::sync::mpsc::channel::<TapSignal>();

    let callback = move |_proxy: CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
                         -> Option<CGEvent> {
        match event_type {
            CGEventType::FlagsChanged => {
                let _ = callback_tx.send(TapSignal::Flags(event.get_flags()));
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                let _ = callback_tx.send(TapSignal::Disabled);
            }
            _ => {}
        }
        None
    };

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::FlagsChanged],
        callback,
    )
    .map_err(|_| {
        error!("failed to create event tap - is Accessibility permission granted?");
        HotkeyError::EventTapCreation
    })?;

    tap.enable();

    let run_loop_source = tap
        .mach_port
        .create_runloop_source(0)
        .map_err(|_| HotkeyError::EventTapCreation)?;
    let run_loop = CFRunLoop::get_current();

    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    info!("kill-switch event tap enabled");

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(
                kCFRunLoopDefaultMode,
                std::time::Duration::from_millis(100),
                true,
            );
        }

        while let Ok(signal) = callback_rx.try_recv() {
            let event = match signal {
                TapSignal::Flags(flags) => {
                    let new_state = ModifierState::from_flags(flags);
                    let pressed = ModifierState::kill_chord_pressed(&last_state, &new_state);
                    if new_state != last_state {
                        debug!(?last_state, ?new_state, "modifier state changed");
                        last_state = new_state;
                    }
                    if !pressed {
                        continue;
                    }
                    info!("kill-switch chord pressed");
                    HotkeyEvent::KillSwitch
                }
                TapSignal::Disabled => {
                    warn!("event tap disabled by the system, re-enabling");
                    tap.enable();
                    HotkeyEvent::TapDisabled
                }
            };

            // Not in an async context, so block on the send
            if event_tx.blocking_send(event).is_err() {
                warn!("failed to send hotkey event - channel closed?");
                return Ok(());
            }
        }
    }

    Ok(())
}
