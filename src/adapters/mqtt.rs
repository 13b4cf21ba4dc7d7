//! MQTT adapter: Home Assistant transport.
//!
//! Implements [`EventSink`] by publishing the state messages produced by
//! [`HassNode`], and delivers inbound messages to the main loop through an
//! `embassy-sync` channel.
//!
//! ```text
//! ┌──────────────┐ InboundMessage ┌──────────────┐
//! │ esp-mqtt cb  │──────────────▶│  Main Loop   │
//! │ (mqtt task)  │   MqttInbox    │  (consumer)  │
//! └──────────────┘                └──────┬───────┘
//!        ▲            enqueue()          │
//!        └───────────────────────────────┘
//! ```
//!
//! The client reconnects on its own.  Every (re)connect sets the resync
//! flag; the main loop then re-subscribes and republishes discovery and
//! full state.  Nothing here blocks the main loop.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::config::MqttCredentials;
use crate::error::CommsError;
use crate::hass::{HassNode, StateMessage, Topic};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EventPayload, LwtConfiguration, MqttClientConfiguration, QoS,
};

/// Largest inbound payload accepted; sensor values and commands are short.
pub const MAX_PAYLOAD_BYTES: usize = 64;
/// Channel depth for inbound messages.
const INBOX_DEPTH: usize = 16;
/// Minimum spacing between client creation attempts.
const RETRY_INTERVAL_MS: u32 = 10_000;

/// One inbound publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: Topic,
    pub payload: heapless::Vec<u8, MAX_PAYLOAD_BYTES>,
}

impl InboundMessage {
    /// `None` when the topic or payload does not fit.
    pub fn new(topic: &str, payload: &[u8]) -> Option<Self> {
        Some(Self {
            topic: Topic::try_from(topic).ok()?,
            payload: heapless::Vec::from_slice(payload).ok()?,
        })
    }
}

// ───────────────────────────────────────────────────────────────
// MqttInbox: shared with the client callback
// ───────────────────────────────────────────────────────────────

pub struct MqttInbox {
    messages: Channel<CriticalSectionRawMutex, InboundMessage, INBOX_DEPTH>,
    connected: AtomicBool,
    resync: AtomicBool,
}

impl Default for MqttInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttInbox {
    pub const fn new() -> Self {
        Self {
            messages: Channel::new(),
            connected: AtomicBool::new(false),
            resync: AtomicBool::new(false),
        }
    }

    /// Callback side: queue a message.  Oversized or overflowing messages
    /// are dropped.
    pub fn deliver(&self, topic: &str, payload: &[u8]) -> bool {
        let Some(msg) = InboundMessage::new(topic, payload) else {
            warn!("MQTT | dropping oversized message on {topic} ({} bytes)", payload.len());
            return false;
        };
        if self.messages.try_send(msg).is_err() {
            warn!("MQTT | inbox full, dropping message on {topic}");
            return false;
        }
        true
    }

    pub fn on_connected(&self) {
        self.connected.store(true, Ordering::Release);
        self.resync.store(true, Ordering::Release);
    }

    pub fn on_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Consume the resync request.
    pub fn take_resync(&self) -> bool {
        self.resync.swap(false, Ordering::AcqRel)
    }

    /// Main-loop side: next queued message.
    pub fn receive(&self) -> Option<InboundMessage> {
        self.messages.try_receive().ok()
    }
}

// ───────────────────────────────────────────────────────────────
// MqttAdapter
// ───────────────────────────────────────────────────────────────

/// A message handed to the broker, kept by the simulation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: Topic,
    pub payload: Vec<u8>,
    pub retain: bool,
}

pub struct MqttAdapter {
    node: HassNode,
    inbox: &'static MqttInbox,
    credentials: MqttCredentials,
    last_attempt_ms: Option<u32>,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(not(target_os = "espidf"))]
    published: Vec<Published>,
    #[cfg(not(target_os = "espidf"))]
    subscribed: Vec<Topic>,
}

impl MqttAdapter {
    pub fn new(node: HassNode, inbox: &'static MqttInbox, credentials: MqttCredentials) -> Self {
        Self {
            node,
            inbox,
            credentials,
            last_attempt_ms: None,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            published: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            subscribed: Vec::new(),
        }
    }

    pub fn node(&self) -> &HassNode {
        &self.node
    }

    pub fn inbox(&self) -> &'static MqttInbox {
        self.inbox
    }

    pub fn is_connected(&self) -> bool {
        self.inbox.is_connected()
    }

    /// Create the client if there is none yet, at most once per
    /// [`RETRY_INTERVAL_MS`].  Never blocks on the network.
    pub fn ensure_client(&mut self, now_ms: u32) {
        if self.has_client() {
            return;
        }
        if let Some(last) = self.last_attempt_ms {
            if now_ms.wrapping_sub(last) < RETRY_INTERVAL_MS {
                return;
            }
        }
        self.last_attempt_ms = Some(now_ms);
        if self.credentials.server.is_empty() {
            warn!("MQTT | no broker configured");
            return;
        }
        match self.connect() {
            Ok(()) => info!(
                "MQTT | client started for {}:{} as {}",
                self.credentials.server,
                self.credentials.port,
                self.node.node_id()
            ),
            Err(e) => warn!("MQTT | {e}"),
        }
    }

    /// Re-subscribe and republish discovery, availability and `snapshot`
    /// (an [`AppEvent::Started`] describing current state).
    pub fn resync(&mut self, snapshot: &AppEvent) -> Result<(), CommsError> {
        if !self.is_connected() {
            return Err(CommsError::MqttDisconnected);
        }
        for topic in self.node.subscriptions() {
            self.subscribe(&topic)?;
        }
        for msg in self.node.discovery() {
            self.publish(&msg.topic, msg.payload.as_bytes(), true)?;
        }
        let avty = self.node.availability_topic();
        self.publish(&avty, b"online", true)?;
        for msg in self.node.state_updates(snapshot) {
            self.publish_state(&msg)?;
        }
        info!("MQTT | resynced discovery and state");
        Ok(())
    }

    fn publish_state(&mut self, msg: &StateMessage) -> Result<(), CommsError> {
        self.publish(&msg.topic, msg.payload.as_bytes(), msg.retain)
    }

    // ── Backend: ESP-IDF ──────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn has_client(&self) -> bool {
        self.client.is_some()
    }

    #[cfg(target_os = "espidf")]
    fn connect(&mut self) -> Result<(), CommsError> {
        let mut url = heapless::String::<96>::new();
        let _ = core::fmt::Write::write_fmt(
            &mut url,
            format_args!("mqtt://{}:{}", self.credentials.server, self.credentials.port),
        );
        let avty = self.node.availability_topic();

        let conf = MqttClientConfiguration {
            client_id: Some(self.node.node_id()),
            username: non_empty(self.credentials.user.as_str()),
            password: non_empty(self.credentials.password.as_str()),
            lwt: Some(LwtConfiguration {
                topic: avty.as_str(),
                payload: b"offline",
                qos: QoS::AtLeastOnce,
                retain: true,
            }),
            ..Default::default()
        };

        let inbox = self.inbox;
        let client = EspMqttClient::new_cb(url.as_str(), &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => inbox.on_connected(),
                EventPayload::Disconnected => inbox.on_disconnected(),
                EventPayload::Received {
                    topic: Some(topic),
                    data,
                    ..
                } => {
                    inbox.deliver(topic, data);
                }
                _ => {}
            }
        })
        .map_err(|_| CommsError::MqttConnectFailed)?;

        self.client = Some(client);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::MqttDisconnected)?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| CommsError::MqttSubscribeFailed)
    }

    #[cfg(target_os = "espidf")]
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::MqttDisconnected)?;
        client
            .enqueue(topic, QoS::AtLeastOnce, retain, payload)
            .map(|_| ())
            .map_err(|_| CommsError::MqttPublishFailed)
    }

    // ── Backend: simulation ───────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn has_client(&self) -> bool {
        self.is_connected()
    }

    /// Simulation: the broker accepts immediately.
    #[cfg(not(target_os = "espidf"))]
    fn connect(&mut self) -> Result<(), CommsError> {
        self.inbox.on_connected();
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        let topic = Topic::try_from(topic).map_err(|_| CommsError::MqttSubscribeFailed)?;
        if !self.subscribed.contains(&topic) {
            self.subscribed.push(topic);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError> {
        self.published.push(Published {
            topic: Topic::try_from(topic).map_err(|_| CommsError::MqttPublishFailed)?,
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }

    /// Simulation: everything handed to the broker so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn published(&self) -> &[Published] {
        &self.published
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn subscribed(&self) -> &[Topic] {
        &self.subscribed
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn clear_published(&mut self) {
        self.published.clear();
    }
}

#[cfg(target_os = "espidf")]
fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

impl EventSink for MqttAdapter {
    fn emit(&mut self, event: &AppEvent) {
        // While offline, state is dropped; the resync on reconnect
        // republishes everything.
        if !self.is_connected() {
            return;
        }
        for msg in self.node.state_updates(event) {
            if let Err(e) = self.publish_state(&msg) {
                warn!("MQTT | publish to {} failed: {e}", msg.topic);
            }
        }
    }
}
