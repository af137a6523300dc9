//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::control::{ControlRequest, PipelineStatus};
use crate::events::PipelineEvent;

/// Requests from a client to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Enable or disable gesture control
    SetControl { enabled: bool },

    /// Flip gesture control
    ToggleControl,

    /// Clear gesture history and pointer smoothing
    Reset,

    /// Change pointer sensitivity (clamped by the daemon)
    SetSensitivity { value: f64 },

    /// Release everything held and go to the stopped mode
    EmergencyStop,

    /// Subscribe to pipeline event notifications
    Subscribe,
}

impl Request {
    /// The control-thread request this maps to, if any
    pub fn to_control(&self) -> Option<ControlRequest> {
        match *self {
            Request::Ping | Request::Subscribe => None,
            Request::GetStatus => Some(ControlRequest::GetStatus),
            Request::SetControl { enabled } => Some(ControlRequest::SetControl(enabled)),
            Request::ToggleControl => Some(ControlRequest::ToggleControl),
            Request::Reset => Some(ControlRequest::Reset),
            Request::SetSensitivity { value } => Some(ControlRequest::SetSensitivity(value)),
            Request::EmergencyStop => Some(ControlRequest::EmergencyStop),
        }
    }
}

/// Responses from daemon to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Daemon status after the request was applied
    Status(DaemonStatus),

    /// Subscription confirmed; only notifications follow
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Pipeline event occurred
    Event { event: PipelineEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Uptime in seconds
    pub uptime_secs: u64,

    /// Whether the kill-switch hotkey is registered
    pub hotkey_registered: bool,

    /// State of the gesture pipeline
    pub pipeline: PipelineStatus,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: 0,
            hotkey_registered: false,
            pipeline: PipelineStatus::default(),
        }
    }
}
