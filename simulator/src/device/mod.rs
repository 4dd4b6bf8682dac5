//! Device state, command dispatch and runtime

pub mod dispatch;
pub mod runtime;
pub mod state;
