//! MQTT transport and topic layout

pub mod client;
pub mod topics;
pub mod transport;
