//! gesture-pointer-daemon: hand gestures in, pointer actions out
//!
//! Reads hand-pose frames from stdin and drives the system pointer:
//! - Gesture classification and temporal stabilization per frame
//! - Action state machine with cooldowns and guaranteed button release
//! - Global kill-switch hotkey via CGEventTap (macOS)
//! - IPC server for status queries and operator control
//!
//! Pose estimation itself happens upstream; this process only consumes
//! landmarks. When stdin closes the daemon releases everything and exits.

mod config;
mod control;
mod events;
mod gesture;
mod hotkey;
mod input;
mod ipc;
mod lifecycle;
mod pointer;
mod source;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, Settings};
use crate::control::{ControlInput, ControlRequest, ControlThread, GesturePipeline};
use crate::events::PipelineEvent;
use crate::hotkey::{HotkeyEvent, HotkeyListener};
use crate::input::{DryRunBackend, InputBackend};
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::pointer::ScreenSize;
use crate::source::FrameReader;

/// Frames waiting for the control thread; anything beyond this is dropped
const CONTROL_QUEUE: usize = 8;

/// Screen assumed by the dry-run backend
const DRY_RUN_SCREEN: ScreenSize = ScreenSize {
    width: 1920,
    height: 1080,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "gesture-pointer-daemon starting"
    );

    let config = Config::load()?;
    info!(?config.socket_path, ?config.data_dir, dry_run = config.settings.dry_run, "configuration loaded");

    let shutdown = ShutdownSignal::new();

    // Frame reader, IPC and hotkey -> control thread
    let (control_tx, control_rx) = mpsc::channel::<ControlInput>(CONTROL_QUEUE);
    // Control thread -> subscribers
    let (event_tx, _event_rx) = broadcast::channel::<PipelineEvent>(64);
    // Hotkey listener -> forwarder
    let (hotkey_tx, mut hotkey_rx) = mpsc::channel::<HotkeyEvent>(32);

    let settings = config.settings.clone();
    let pipeline_events = event_tx.clone();
    let control_thread = ControlThread::spawn(control_rx, move || {
        let backend = create_backend(&settings);
        GesturePipeline::new(backend, &settings, pipeline_events)
    })?;

    let hotkey_listener = HotkeyListener::new(hotkey_tx);
    let hotkey_registered = match hotkey_listener.start() {
        Ok(()) => {
            info!("kill-switch hotkey listener started");
            true
        }
        Err(e) => {
            error!(?e, "failed to start hotkey listener");
            warn!("continuing without kill-switch hotkey - use the emergency_stop IPC request");
            false
        }
    };

    let server = Server::new(&config.socket_path, control_tx.clone(), event_tx.clone())?;
    server.set_hotkey_registered(hotkey_registered).await;

    let frame_reader = FrameReader::new(control_tx.clone());
    let mut log_rx = event_tx.subscribe();

    info!("daemon initialized, entering main loop");

    tokio::select! {
        result = frame_reader.run(tokio::io::stdin()) => {
            match result {
                Ok(stats) => info!(
                    forwarded = stats.forwarded,
                    dropped = stats.dropped,
                    malformed = stats.malformed,
                    "frame source ended"
                ),
                Err(e) => error!(?e, "frame reader error"),
            }
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Kill switch: toggle control; the pipeline releases held input
        _ = async {
            while let Some(event) = hotkey_rx.recv().await {
                match event {
                    HotkeyEvent::KillSwitch => {
                        if control_tx
                            .send(ControlInput::request(ControlRequest::ToggleControl))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    HotkeyEvent::TapDisabled => warn!("kill-switch tap was disabled by the system"),
                }
            }
        } => {
            info!("hotkey forwarder exited");
        }

        _ = async {
            loop {
                match log_rx.recv().await {
                    Ok(event) => info!(%event, "pipeline event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event logger lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("event logger exited");
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    info!("shutting down...");

    // Button release must happen before anything else goes away
    if control_tx.send(ControlInput::Shutdown).await.is_err() {
        warn!("control thread already stopped");
    }
    drop(control_tx);
    match tokio::task::spawn_blocking(move || control_thread.join()).await {
        Ok(Ok(())) => info!("control thread joined"),
        Ok(Err(e)) => error!(?e, "control thread failed"),
        Err(e) => error!(?e, "failed to join control thread"),
    }

    hotkey_listener.stop();
    server.shutdown().await;

    info!("gesture-pointer-daemon stopped");

    Ok(())
}

/// Pick the input backend; must run on the control thread
fn create_backend(settings: &Settings) -> Box<dyn InputBackend> {
    if settings.dry_run {
        info!("dry run enabled, actions are only logged");
        return Box::new(DryRunBackend::new(DRY_RUN_SCREEN));
    }

    native_backend()
}

#[cfg(target_os = "macos")]
fn native_backend() -> Box<dyn InputBackend> {
    match crate::input::CoreGraphicsBackend::new() {
        Ok(backend) => Box::new(backend),
        Err(e) => {
            error!(?e, "CoreGraphics backend unavailable, falling back to dry run");
            Box::new(DryRunBackend::new(DRY_RUN_SCREEN))
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn native_backend() -> Box<dyn InputBackend> {
    warn!("no native input backend on this platform, falling back to dry run");
    Box::new(DryRunBackend::new(DRY_RUN_SCREEN))
}
