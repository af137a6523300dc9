//! Pointer mapping module
//!
//! Converts normalized hand positions into screen pixels with sensitivity
//! scaling, a short moving average and a dead-zone gate.

mod mapper;

pub use mapper::{
    should_move, ControlZone, PointerMapper, ScreenPoint, ScreenSize, MAX_SENSITIVITY,
    MIN_SENSITIVITY,
};
