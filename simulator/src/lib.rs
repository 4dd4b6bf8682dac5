//! Device Simulator Library
//!
//! Core modules for the MQTT device simulator.

pub mod app;
pub mod capability;
pub mod connection;
pub mod device;
pub mod errors;
pub mod logs;
pub mod models;
pub mod mqtt;
pub mod utils;
pub mod workers;
