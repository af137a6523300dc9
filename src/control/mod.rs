//! Control module: from stabilized gestures to input actions
//!
//! - dispatcher: the action state machine (Idle, Pointing, Pressed,
//!   Scrolling, Zooming, Stopped) with cooldowns and button safety
//! - pipeline: per-frame classification, stabilization and dispatch
//! - runner: the single thread that owns the pipeline

mod dispatcher;
mod pipeline;
mod runner;

pub use dispatcher::Mode;
pub use pipeline::{GesturePipeline, PipelineStatus};
pub use runner::{ControlInput, ControlRequest, ControlThread};
