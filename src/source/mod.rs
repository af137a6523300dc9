//! Frame source module
//!
//! Pose frames arrive as newline-delimited JSON from the external
//! pose-estimation process and are forwarded to the control thread.

mod frame;
mod reader;

pub use frame::PoseFrame;
pub use reader::FrameReader;
