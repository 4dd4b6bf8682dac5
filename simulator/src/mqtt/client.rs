//! MQTT transport implementation

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tracing::{debug, info, warn};

use crate::errors::SimulatorError;
use crate::mqtt::transport::{Delivery, Transport, TransportEvent};

/// MQTT broker address
#[derive(Debug, Clone)]
pub struct MqttAddress {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// Optional path to a PEM-encoded CA certificate for broker verification.
    /// When `None` and `use_tls` is `true`, the system certificate store is used.
    pub ca_cert_path: Option<String>,
}

impl Default for MqttAddress {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            use_tls: false,
            ca_cert_path: None,
        }
    }
}

/// Optional broker credentials
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Broker session scoped to one simulated device
pub struct MqttTransport {
    address: MqttAddress,
    client_id: String,
    credentials: Option<Credentials>,
    connect_timeout: Duration,
    session: Option<(AsyncClient, EventLoop)>,
}

impl MqttTransport {
    /// Create a transport for one device. One client identity per
    /// device avoids topic collisions between simulated endpoints.
    pub fn new(address: &MqttAddress, device_id: &str, credentials: Option<Credentials>) -> Self {
        Self {
            address: address.clone(),
            client_id: format!("simulator_{}", device_id),
            credentials,
            connect_timeout: Duration::from_secs(10),
            session: None,
        }
    }

    fn build_options(&self) -> Result<MqttOptions, SimulatorError> {
        if self.address.host.is_empty() {
            return Err(SimulatorError::ConfigError(
                "MQTT host is not configured".to_string(),
            ));
        }

        let mut options = MqttOptions::new(&self.client_id, &self.address.host, self.address.port);
        options.set_keep_alive(Duration::from_secs(30));

        if let Some(credentials) = &self.credentials {
            options.set_credentials(&credentials.username, &credentials.password);
        }

        if self.address.use_tls {
            use rumqttc::{TlsConfiguration, Transport as MqttWireTransport};
            use rustls::ClientConfig;
            use std::sync::Arc;

            let mut root_cert_store = rustls::RootCertStore::empty();

            if let Some(ref ca_path) = self.address.ca_cert_path {
                let ca_pem = std::fs::read(ca_path).map_err(|e| {
                    SimulatorError::MqttError(format!("Failed to read CA cert {ca_path}: {e}"))
                })?;
                let mut cursor = std::io::Cursor::new(ca_pem);
                for cert in rustls_pemfile::certs(&mut cursor).flatten() {
                    let _ = root_cert_store.add(cert);
                }
            } else {
                for cert in rustls_native_certs::load_native_certs().unwrap_or_default() {
                    let _ = root_cert_store.add(cert);
                }
            }

            let client_config = ClientConfig::builder()
                .with_root_certificates(root_cert_store)
                .with_no_client_auth();

            options.set_transport(MqttWireTransport::tls_with_config(TlsConfiguration::Rustls(
                Arc::new(client_config),
            )));
        }

        Ok(options)
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<(), SimulatorError> {
        let options = self.build_options()?;
        let (client, mut eventloop) = AsyncClient::new(options, 10);

        // The session is established lazily by the event loop; poll
        // until the broker acknowledges the connection.
        let await_connack = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(client_id = %self.client_id, "MQTT connected");
                        return Ok(());
                    }
                    Ok(_) => continue,
                    Err(e) => return Err(SimulatorError::MqttError(e.to_string())),
                }
            }
        };

        match tokio::time::timeout(self.connect_timeout, await_connack).await {
            Ok(Ok(())) => {
                self.session = Some((client, eventloop));
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SimulatorError::MqttError(format!(
                "Connection to {}:{} timed out",
                self.address.host, self.address.port
            ))),
        }
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), SimulatorError> {
        let (client, _) = self
            .session
            .as_ref()
            .ok_or_else(|| SimulatorError::MqttError("Not connected".to_string()))?;

        client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| SimulatorError::MqttError(e.to_string()))?;
        info!("Subscribed to: {}", topic);
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        delivery: Delivery,
        payload: Vec<u8>,
    ) -> Result<(), SimulatorError> {
        let (client, _) = self
            .session
            .as_ref()
            .ok_or_else(|| SimulatorError::MqttError("Not connected".to_string()))?;

        let qos = match delivery {
            Delivery::BestEffort => QoS::AtMostOnce,
            Delivery::Confirmed => QoS::AtLeastOnce,
        };

        client
            .publish(topic, qos, false, payload)
            .await
            .map_err(|e| SimulatorError::MqttError(e.to_string()))?;

        debug!("Published to: {}", topic);
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        let Some((_, eventloop)) = self.session.as_mut() else {
            return TransportEvent::Disconnected;
        };

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!("Received message on topic: {}", publish.topic);
                    return TransportEvent::Message {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!("MQTT connection lost: {}", e);
                    self.session = None;
                    return TransportEvent::Disconnected;
                }
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), SimulatorError> {
        let Some((client, mut eventloop)) = self.session.take() else {
            return Ok(());
        };

        client
            .disconnect()
            .await
            .map_err(|e| SimulatorError::MqttError(e.to_string()))?;

        // Keep polling briefly so queued publishes (the final offline
        // status) reach the wire before the session is dropped.
        let flush = async {
            loop {
                match eventloop.poll().await {
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
        };
        let _ = tokio::time::timeout(Duration::from_secs(2), flush).await;

        info!(client_id = %self.client_id, "MQTT disconnected");
        Ok(())
    }
}
