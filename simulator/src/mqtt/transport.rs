//! Transport seam between the connection manager and the broker client.
//!
//! The simulator core only needs publish/subscribe with asynchronous
//! delivery; expressing that as a trait keeps the rumqttc client at the
//! edge and lets tests drive the connection manager with an in-memory
//! transport.

use async_trait::async_trait;

use crate::errors::SimulatorError;

/// Message delivery quality of service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Fire and forget (telemetry)
    BestEffort,
    /// At least once (status, responses)
    Confirmed,
}

/// Asynchronous event surfaced by the transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// An inbound message on a subscribed topic
    Message { topic: String, payload: Vec<u8> },

    /// The broker session dropped without a local disconnect call
    Disconnected,
}

/// Abstract publish/subscribe client scoped to one broker session
#[async_trait]
pub trait Transport: Send {
    /// Open the session. Must be called before any other operation.
    async fn connect(&mut self) -> Result<(), SimulatorError>;

    /// Subscribe to a topic filter (single-level `+` wildcards allowed)
    async fn subscribe(&mut self, topic: &str) -> Result<(), SimulatorError>;

    /// Publish a payload to a topic
    async fn publish(
        &mut self,
        topic: &str,
        delivery: Delivery,
        payload: Vec<u8>,
    ) -> Result<(), SimulatorError>;

    /// Wait for the next inbound event. Cancel-safe.
    async fn next_event(&mut self) -> TransportEvent;

    /// Close the session
    async fn disconnect(&mut self) -> Result<(), SimulatorError>;
}

#[cfg(test)]
pub mod mock {
    //! In-memory transport recording the observable action sequence.
    //!
    //! The action log is shared behind an `Arc` so a test can keep a
    //! handle to it after the transport moves into a worker task.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// One observable transport action, in call order
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MockAction {
        Connect,
        Subscribe(String),
        Publish { topic: String, payload: Vec<u8> },
        Disconnect,
    }

    /// Shared view of everything a `MockTransport` was asked to do.
    ///
    /// Failed connect attempts count toward `connect_attempts` but do
    /// not appear in the action log.
    #[derive(Default)]
    pub struct MockLog {
        actions: Mutex<Vec<MockAction>>,
        connect_attempts: AtomicU32,
    }

    impl MockLog {
        pub fn actions(&self) -> Vec<MockAction> {
            self.actions.lock().unwrap().clone()
        }

        pub fn connect_attempts(&self) -> u32 {
            self.connect_attempts.load(Ordering::SeqCst)
        }

        /// Topics published to, in order
        pub fn published_topics(&self) -> Vec<String> {
            self.actions
                .lock()
                .unwrap()
                .iter()
                .filter_map(|action| match action {
                    MockAction::Publish { topic, .. } => Some(topic.clone()),
                    _ => None,
                })
                .collect()
        }

        /// Payload of the `n`-th publish, parsed as JSON
        pub fn published_json(&self, n: usize) -> serde_json::Value {
            let actions = self.actions.lock().unwrap();
            let payload = actions
                .iter()
                .filter_map(|action| match action {
                    MockAction::Publish { payload, .. } => Some(payload),
                    _ => None,
                })
                .nth(n)
                .expect("no such publish");
            serde_json::from_slice(payload).expect("publish was not JSON")
        }
    }

    #[derive(Default)]
    pub struct MockTransport {
        log: Arc<MockLog>,
        pub inbound: VecDeque<TransportEvent>,
        pub fail_connects: u32,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next `n` connect attempts
        pub fn failing_connects(n: u32) -> Self {
            Self {
                fail_connects: n,
                ..Self::default()
            }
        }

        /// Handle to the action log, valid after the transport moves
        pub fn log(&self) -> Arc<MockLog> {
            Arc::clone(&self.log)
        }

        pub fn queue_message(&mut self, topic: &str, payload: &[u8]) {
            self.inbound.push_back(TransportEvent::Message {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            });
        }

        pub fn queue_disconnect(&mut self) {
            self.inbound.push_back(TransportEvent::Disconnected);
        }

        pub fn actions(&self) -> Vec<MockAction> {
            self.log.actions()
        }

        pub fn published_topics(&self) -> Vec<String> {
            self.log.published_topics()
        }

        pub fn published_json(&self, n: usize) -> serde_json::Value {
            self.log.published_json(n)
        }

        fn record(&self, action: MockAction) {
            self.log.actions.lock().unwrap().push(action);
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&mut self) -> Result<(), SimulatorError> {
            self.log.connect_attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_connects > 0 {
                self.fail_connects -= 1;
                return Err(SimulatorError::MqttError("connection refused".to_string()));
            }
            self.record(MockAction::Connect);
            Ok(())
        }

        async fn subscribe(&mut self, topic: &str) -> Result<(), SimulatorError> {
            self.record(MockAction::Subscribe(topic.to_string()));
            Ok(())
        }

        async fn publish(
            &mut self,
            topic: &str,
            _delivery: Delivery,
            payload: Vec<u8>,
        ) -> Result<(), SimulatorError> {
            self.record(MockAction::Publish {
                topic: topic.to_string(),
                payload,
            });
            Ok(())
        }

        async fn next_event(&mut self) -> TransportEvent {
            match self.inbound.pop_front() {
                Some(event) => event,
                None => std::future::pending().await,
            }
        }

        async fn disconnect(&mut self) -> Result<(), SimulatorError> {
            self.record(MockAction::Disconnect);
            Ok(())
        }
    }
}
