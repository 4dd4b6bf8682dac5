//! Wire-level data models

pub mod envelope;
