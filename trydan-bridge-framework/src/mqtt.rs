//! MQTT bus session built on rumqttc.
//!
//! [`MqttBus::connect`] drives the rumqttc event loop itself until the
//! broker acknowledges the session, subscribes to the command filter, then
//! hands the event loop to a background transport task. That task routes
//! inbound publishes into the command queue and reports connection state
//! changes. After a connection error it keeps retrying, and it subscribes
//! again on every reconnect since the broker starts a clean session.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS, Transport,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use trydan_common::{MqttConfig, TopicBuilder};

use crate::bus::{BusChannels, BusSession, InboundCommand, enqueue_command};
use crate::error::{ConnectError, PublishError};

/// Capacity of the rumqttc request channel between client and event loop.
const REQUEST_CAPACITY: usize = 100;

/// MQTT implementation of [`BusSession`].
#[derive(Debug)]
pub struct MqttBus {
    config: MqttConfig,
    topics: TopicBuilder,
    client: Option<AsyncClient>,
    connected: Option<watch::Receiver<bool>>,
    transport: Option<JoinHandle<()>>,
}

impl MqttBus {
    /// Create an unconnected session for the given broker settings.
    pub fn new(config: MqttConfig) -> Self {
        let topics = TopicBuilder::new(&config.topic_prefix);
        Self {
            config,
            topics,
            client: None,
            connected: None,
            transport: None,
        }
    }

    /// Broker address, for logs and errors.
    pub fn endpoint(&self) -> String {
        let scheme = if self.config.tls.enabled { "mqtts" } else { "mqtt" };
        format!("{}://{}:{}", scheme, self.config.host, self.config.port)
    }

    /// QoS level used for publishes and the command subscription.
    pub fn qos(&self) -> QoS {
        match self.config.qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        }
    }

    /// Build the rumqttc options from the configuration.
    ///
    /// Sessions are clean: commands sent while the bridge was away are not
    /// replayed, and the transport subscribes again after each reconnect.
    pub fn mqtt_options(&self) -> Result<MqttOptions, ConnectError> {
        let mut options =
            MqttOptions::new(&self.config.client_id, &self.config.host, self.config.port);
        options.set_keep_alive(self.config.keepalive());
        options.set_clean_session(true);

        if let Some((username, password)) = self.config.credentials() {
            options.set_credentials(username, password);
        }

        if self.config.tls.enabled {
            options.set_transport(self.tls_transport()?);
        }

        Ok(options)
    }

    fn tls_transport(&self) -> Result<Transport, ConnectError> {
        let tls = &self.config.tls;

        let Some(ca_path) = &tls.ca_certs else {
            return Ok(Transport::tls_with_default_config());
        };

        let read = |path: &std::path::Path| {
            std::fs::read(path).map_err(|e| {
                ConnectError::Settings(format!("cannot read {}: {}", path.display(), e))
            })
        };

        let ca = read(ca_path)?;
        let client_auth = match (&tls.certfile, &tls.keyfile) {
            (Some(cert), Some(key)) => Some((read(cert)?, read(key)?)),
            _ => None,
        };

        Ok(Transport::tls(ca, client_auth, None))
    }

    fn is_connected(&self) -> bool {
        self.connected
            .as_ref()
            .map(|state| *state.borrow())
            .unwrap_or(false)
    }
}

#[async_trait]
impl BusSession for MqttBus {
    async fn connect(&mut self) -> Result<BusChannels, ConnectError> {
        let endpoint = self.endpoint();
        let timeout = self.config.operation_timeout();
        let (client, mut eventloop) = AsyncClient::new(self.mqtt_options()?, REQUEST_CAPACITY);

        tracing::info!(
            endpoint = %endpoint,
            client_id = %self.config.client_id,
            "Connecting to MQTT broker"
        );

        tokio::time::timeout(timeout, wait_for_connack(&mut eventloop, &endpoint))
            .await
            .map_err(|_| ConnectError::Timeout {
                endpoint: endpoint.clone(),
                timeout,
            })??;

        let filter = self.topics.command_filter();
        client
            .subscribe(&filter, self.qos())
            .await
            .map_err(|e| ConnectError::Rejected {
                endpoint: endpoint.clone(),
                reason: format!("subscribe to {} failed: {}", filter, e),
            })?;

        tracing::info!(endpoint = %endpoint, filter = %filter, "Connected to MQTT broker");

        let (command_tx, command_rx) = mpsc::channel(self.config.inbound_queue);
        let (connected_tx, connected_rx) = watch::channel(true);

        let transport = TransportTask {
            eventloop,
            client: client.clone(),
            filter,
            qos: self.qos(),
            topics: self.topics.clone(),
            commands: command_tx,
            connected: connected_tx,
            reconnect_delay: self.config.reconnect_delay(),
        };

        self.transport = Some(tokio::spawn(transport.run()));
        self.client = Some(client);
        self.connected = Some(connected_rx.clone());

        Ok(BusChannels {
            commands: command_rx,
            connected: connected_rx,
        })
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> Result<(), PublishError> {
        let client = match &self.client {
            Some(client) if self.is_connected() => client,
            _ => {
                return Err(PublishError::Send {
                    topic: topic.to_string(),
                    message: "broker not connected".to_string(),
                });
            }
        };

        let timeout = self.config.operation_timeout();
        tokio::time::timeout(timeout, client.publish(topic, self.qos(), retain, payload))
            .await
            .map_err(|_| PublishError::Timeout {
                topic: topic.to_string(),
                timeout,
            })?
            .map_err(|e| PublishError::Send {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    async fn disconnect(&mut self) {
        let timeout = self.config.operation_timeout();
        let connected = self.is_connected();

        if let Some(client) = self.client.take() {
            if connected {
                match tokio::time::timeout(timeout, client.disconnect()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(error = %e, "Error disconnecting from MQTT broker"),
                    Err(_) => tracing::warn!("Timed out disconnecting from MQTT broker"),
                }
            }
        }

        if let Some(mut transport) = self.transport.take() {
            // The transport ends by itself once the DISCONNECT packet is out
            if !connected || tokio::time::timeout(timeout, &mut transport).await.is_err() {
                transport.abort();
            }
        }

        self.connected = None;
        tracing::info!(endpoint = %self.endpoint(), "Disconnected from MQTT broker");
    }
}

/// Poll the event loop until the broker acknowledges the connection.
async fn wait_for_connack(eventloop: &mut EventLoop, endpoint: &str) -> Result<(), ConnectError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(ConnectError::Rejected {
                        endpoint: endpoint.to_string(),
                        reason: format!("{:?}", ack.code),
                    })
                };
            }
            Ok(_) => continue,
            Err(ConnectionError::ConnectionRefused(code)) => {
                return Err(ConnectError::Rejected {
                    endpoint: endpoint.to_string(),
                    reason: format!("{:?}", code),
                });
            }
            Err(e) => {
                return Err(ConnectError::Unreachable {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Background task owning the rumqttc event loop after the handshake.
struct TransportTask {
    eventloop: EventLoop,
    client: AsyncClient,
    filter: String,
    qos: QoS,
    topics: TopicBuilder,
    commands: mpsc::Sender<InboundCommand>,
    connected: watch::Sender<bool>,
    reconnect_delay: Duration,
}

impl TransportTask {
    async fn run(mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    enqueue_command(
                        &self.topics,
                        &self.commands,
                        &publish.topic,
                        &publish.payload,
                    );
                }
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    self.resubscribe(ack.session_present);
                    if !self.connected.send_replace(true) {
                        tracing::info!("Reconnected to MQTT broker");
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    self.connected.send_replace(false);
                    tracing::debug!("MQTT transport stopped");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    if self.connected.send_replace(false) {
                        tracing::warn!(error = %e, "Lost connection to MQTT broker");
                    } else {
                        tracing::debug!(error = %e, "MQTT reconnect attempt failed");
                    }
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    /// Queue a SUBSCRIBE for the command filter on the fresh session.
    ///
    /// `try_subscribe` never waits on the request channel, which is drained by
    /// this very task.
    fn resubscribe(&self, session_present: bool) {
        match self.client.try_subscribe(&self.filter, self.qos) {
            Ok(()) => tracing::debug!(
                filter = %self.filter,
                session_present,
                "Resubscribed to command topics"
            ),
            Err(e) => tracing::warn!(
                filter = %self.filter,
                error = %e,
                "Failed to resubscribe to command topics"
            ),
        }
    }
}
