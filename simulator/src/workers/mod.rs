//! Long-running worker loops

pub mod device;
