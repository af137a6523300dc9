//! Dedicated control thread
//!
//! The pipeline is built on, and never leaves, a single OS thread. Frames
//! and operator requests arrive over one channel and are handled strictly
//! in order. Leaving the loop always ends with an emergency stop.

use std::thread::{self, JoinHandle};
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::pipeline::{GesturePipeline, PipelineStatus};
use crate::input::InputBackend;
use crate::source::PoseFrame;

/// Operator requests handled by the control thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlRequest {
    GetStatus,
    SetControl(bool),
    ToggleControl,
    Reset,
    SetSensitivity(f64),
    EmergencyStop,
}

/// Everything the control thread consumes
#[derive(Debug)]
pub enum ControlInput {
    /// One pose frame from the frame source
    Frame(PoseFrame),
    /// An operator request, optionally answered with a status snapshot
    Request {
        request: ControlRequest,
        reply: Option<oneshot::Sender<PipelineStatus>>,
    },
    /// Release held input and exit
    Shutdown,
}

impl ControlInput {
    /// Fire-and-forget request
    pub fn request(request: ControlRequest) -> Self {
        ControlInput::Request {
            request,
            reply: None,
        }
    }
}

/// Errors that can occur starting the control thread
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("failed to spawn control thread: {0}")]
    ThreadSpawn(String),

    #[error("control thread panicked")]
    Panicked,
}

/// Handle to the running control thread
pub struct ControlThread {
    handle: JoinHandle<()>,
}

impl ControlThread {
    /// Spawn the control thread.
    ///
    /// `build` runs on the new thread, so the backend it creates never has
    /// to cross threads.
    pub fn spawn<B, F>(inputs: mpsc::Receiver<ControlInput>, build: F) -> Result<Self, ControlError>
    where
        B: InputBackend + 'static,
        F: FnOnce() -> GesturePipeline<B> + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name("gesture-control".to_string())
            .spawn(move || {
                info!("control thread started");
                let mut pipeline = build();
                run_control_loop(&mut pipeline, inputs);
                info!("control thread stopped");
            })
            .map_err(|e| ControlError::ThreadSpawn(e.to_string()))?;

        Ok(Self { handle })
    }

    /// Block until the thread exits
    pub fn join(self) -> Result<(), ControlError> {
        self.handle.join().map_err(|_| {
            error!("control thread panicked");
            ControlError::Panicked
        })
    }
}

/// Process inputs until shutdown or until every sender is gone
pub fn run_control_loop<B: InputBackend>(
    pipeline: &mut GesturePipeline<B>,
    mut inputs: mpsc::Receiver<ControlInput>,
) {
    while let Some(input) = inputs.blocking_recv() {
        match input {
            ControlInput::Frame(frame) => {
                pipeline.process_frame(frame, Instant::now());
            }
            ControlInput::Request { request, reply } => {
                debug!(?request, "control request");
                handle_request(pipeline, request);
                if let Some(reply) = reply {
                    let _ = reply.send(pipeline.status());
                }
            }
            ControlInput::Shutdown => {
                info!("control thread shutting down");
                break;
            }
        }
    }

    pipeline.emergency_stop(Instant::now());
}

fn handle_request<B: InputBackend>(pipeline: &mut GesturePipeline<B>, request: ControlRequest) {
    let now = Instant::now();
    match request {
        ControlRequest::GetStatus => {}
        ControlRequest::SetControl(enabled) => pipeline.set_control_enabled(enabled, now),
        ControlRequest::ToggleControl => {
            pipeline.toggle_control(now);
        }
        ControlRequest::Reset => pipeline.reset(now),
        ControlRequest::SetSensitivity(value) => {
            pipeline.set_sensitivity(value);
        }
        ControlRequest::EmergencyStop => pipeline.emergency_stop(now),
    }
}
