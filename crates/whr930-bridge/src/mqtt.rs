//! MQTT bus adapter.
//!
//! [`MqttBus`] owns the client event loop: it (re)subscribes to the
//! set-level topic on every connection, dispatches inbound commands to the
//! [`CommandHandler`] and keeps reconnecting with a fixed delay. Outbound
//! telemetry goes through [`MqttSink`], which never waits on the network
//! and drops values while the broker is unreachable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::CommandHandler;
use crate::error::{BridgeError, CommandError, Result};
use crate::sink::TelemetrySink;
use crate::topics::Topics;

pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_CLIENT_ID: &str = "whr930";
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(45);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Broker connection settings.
#[derive(Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
    /// Wait between a dropped connection and the next attempt.
    pub reconnect_delay: Duration,
    /// Outbound request queue of the client.
    pub request_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            username: None,
            password: None,
            keep_alive: DEFAULT_KEEP_ALIVE,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            request_capacity: 32,
        }
    }
}

impl std::fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("keep_alive", &self.keep_alive)
            .field("reconnect_delay", &self.reconnect_delay)
            .finish()
    }
}

impl MqttConfig {
    /// Client options derived from this config.
    pub fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        if let Some(username) = &self.username {
            options.set_credentials(username.clone(), self.password.clone().unwrap_or_default());
        }
        options
    }
}

/// Publishes telemetry with QoS 0, not retained.
#[derive(Clone)]
pub struct MqttSink {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl TelemetrySink for MqttSink {
    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        // Queued requests would crowd out the subscribe after a reconnect.
        if !self.connected.load(Ordering::Acquire) {
            return Err(BridgeError::BusDisconnected("not connected to broker".into()));
        }
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|err| BridgeError::Publish(err.to_string()))
    }
}

/// Connection to the broker plus inbound command dispatch.
pub struct MqttBus {
    client: AsyncClient,
    eventloop: EventLoop,
    topics: Topics,
    reconnect_delay: Duration,
    connected: Arc<AtomicBool>,
}

impl MqttBus {
    /// Create the client. Nothing is sent until [`MqttBus::run`] polls.
    pub fn new(config: &MqttConfig, topics: Topics) -> Self {
        let (client, eventloop) = AsyncClient::new(config.options(), config.request_capacity.max(1));
        Self {
            client,
            eventloop,
            topics,
            reconnect_delay: config.reconnect_delay,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A sink publishing through this connection.
    pub fn sink(&self) -> MqttSink {
        MqttSink {
            client: self.client.clone(),
            connected: Arc::clone(&self.connected),
        }
    }

    /// Drive the connection until `shutdown` fires, then disconnect.
    ///
    /// The subscription is renewed after every connect and retried after
    /// each later event until the client accepts it.
    pub async fn run(mut self, commands: CommandHandler, shutdown: CancellationToken) {
        let command_topic = self.topics.set_ventilation_level();
        info!(topic = %command_topic, "bus adapter started");
        let mut subscribed = false;

        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                event = self.eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("connected to broker");
                    self.connected.store(true, Ordering::Release);
                    subscribed = false;
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => debug!("subscription acknowledged"),
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic == command_topic {
                        dispatch(&commands, &publish.payload);
                    } else {
                        debug!(topic = %publish.topic, "ignoring message on unexpected topic");
                    }
                }
                Ok(event) => debug!(?event, "bus event"),
                Err(err) => {
                    self.connected.store(false, Ordering::Release);
                    subscribed = false;
                    let err = BridgeError::BusDisconnected(err.to_string());
                    warn!(
                        error = %err,
                        retry_in_ms = self.reconnect_delay.as_millis() as u64,
                        "bus connection lost"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
            }

            if !subscribed && self.connected.load(Ordering::Acquire) {
                subscribed = self.subscribe(&command_topic);
            }
        }

        self.connected.store(false, Ordering::Release);
        self.disconnect().await;
        info!("bus adapter stopped");
    }

    fn subscribe(&self, topic: &str) -> bool {
        match self.client.try_subscribe(topic, QoS::AtMostOnce) {
            Ok(()) => {
                info!(%topic, "subscribing");
                true
            }
            Err(err) => {
                warn!(error = %err, %topic, "subscribe not queued, retrying");
                false
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Err(err) = self.client.try_disconnect() {
            debug!(error = %err, "disconnect request not queued");
            return;
        }

        let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => return true,
                    Ok(_) => {}
                    Err(_) => return false,
                }
            }
        })
        .await;

        match flushed {
            Ok(true) => info!("disconnected from broker"),
            _ => debug!("broker unreachable during disconnect"),
        }
    }
}

/// Hand a level command to the device without blocking the event loop.
fn dispatch(commands: &CommandHandler, payload: &[u8]) {
    match commands.submit_set_level(payload) {
        Ok(level) => debug!(%level, "level command queued"),
        // Already logged while parsing.
        Err(CommandError::OutOfRange { .. }) => {}
        Err(err) => warn!(error = %err, "level command dropped"),
    }
}
