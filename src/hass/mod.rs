//! Home Assistant MQTT surface.
//!
//! Every entity lives under `aha/{node}/{entity}/` with a `cmd_t` command
//! topic and a `stat_t` state topic, and announces itself retained on
//! `homeassistant/{component}/{node}/{entity}/config`.
//!
//! ```text
//!   HA ── aha/{node}/contrast/cmd_t ──▶ parse_command() ──▶ AppCommand
//!   HA ◀─ aha/{node}/contrast/stat_t ── state_updates() ◀── AppEvent
//!   HA ◀─ homeassistant/number/{node}/contrast/config ── discovery()
//! ```
//!
//! This module is pure string work; the MQTT adapter owns the connection.

use core::fmt::Write as _;

use log::warn;
use serde_json::{Value, json};

use crate::app::commands::AppCommand;
use crate::app::events::AppEvent;
use crate::config::{DisplayConfig, FeedingConfig, SENSOR_TOPICS};
use crate::drivers::button::{ButtonId, PressKind};
use crate::feeder::schedule::{format_schedule, parse_schedule};
use crate::fsm::StateId;
use crate::ui::DEVICE_NAME;

/// Discovery prefix Home Assistant listens on.
pub const DISCOVERY_PREFIX: &str = "homeassistant";
/// Home Assistant publishes `online` here when it (re)starts.
pub const HA_STATUS_TOPIC: &str = "homeassistant/status";
/// Entity topic prefix.
pub const TOPIC_PREFIX: &str = "aha";

const MANUFACTURER: &str = "HASS-Display";
const MODEL: &str = "ESP32-C3 feeder display";
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub type NodeId = heapless::String<24>;
pub type Topic = heapless::String<128>;
pub type StatePayload = heapless::String<32>;

/// Upper bound on state messages produced by one event.
pub const MAX_UPDATES: usize = 10;

// ───────────────────────────────────────────────────────────────
// Entities
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Backlight,
    Contrast,
    RotationsPerFeeding,
    GramsPerFeeding,
    MaxGramsPerDay,
    FeedNow,
    DispensedToday,
    ActivityState,
    Schedule,
}

impl Entity {
    pub const ALL: [Entity; 9] = [
        Entity::Backlight,
        Entity::Contrast,
        Entity::RotationsPerFeeding,
        Entity::GramsPerFeeding,
        Entity::MaxGramsPerDay,
        Entity::FeedNow,
        Entity::DispensedToday,
        Entity::ActivityState,
        Entity::Schedule,
    ];

    pub const fn object_id(self) -> &'static str {
        match self {
            Self::Backlight => "backlight",
            Self::Contrast => "contrast",
            Self::RotationsPerFeeding => "rotations",
            Self::GramsPerFeeding => "grams",
            Self::MaxGramsPerDay => "max_grams",
            Self::FeedNow => "feed_now",
            Self::DispensedToday => "dispensed",
            Self::ActivityState => "activity",
            Self::Schedule => "schedule",
        }
    }

    pub const fn component(self) -> &'static str {
        match self {
            Self::Backlight => "light",
            Self::Contrast
            | Self::RotationsPerFeeding
            | Self::GramsPerFeeding
            | Self::MaxGramsPerDay => "number",
            Self::FeedNow => "button",
            Self::DispensedToday | Self::ActivityState => "sensor",
            Self::Schedule => "text",
        }
    }

    const fn display_name(self) -> &'static str {
        match self {
            Self::Backlight => "Backlight",
            Self::Contrast => "Contrast",
            Self::RotationsPerFeeding => "Rotations per feeding",
            Self::GramsPerFeeding => "Grams per feeding",
            Self::MaxGramsPerDay => "Max grams per day",
            Self::FeedNow => "Feed now",
            Self::DispensedToday => "Dispensed today",
            Self::ActivityState => "Activity",
            Self::Schedule => "Feeding schedule",
        }
    }

    /// Whether Home Assistant can write to this entity.
    pub const fn accepts_commands(self) -> bool {
        !matches!(self, Self::DispensedToday | Self::ActivityState)
    }

    fn from_object_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.object_id() == id)
    }
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMessage {
    pub topic: Topic,
    pub payload: StatePayload,
    pub retain: bool,
}

/// One discovery config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryMessage {
    pub topic: Topic,
    pub payload: String,
}

/// What an inbound message on a subscribed topic means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Inbound {
    Command(AppCommand),
    /// Home Assistant came back: discovery and state must be republished.
    HomeAssistantOnline,
    /// Not ours; may be a sensor topic.
    Other,
    /// Ours, but the payload was malformed.  The hub shows command values
    /// optimistically, so the current state has to be echoed back.
    Rejected,
    /// Nothing to do (Home Assistant going offline).
    Dropped,
}

// ───────────────────────────────────────────────────────────────
// HassNode
// ───────────────────────────────────────────────────────────────

/// Topic layout and payload codec for one device.
#[derive(Debug, Clone)]
pub struct HassNode {
    node_id: NodeId,
}

impl HassNode {
    pub fn new(node_id: &str) -> Self {
        let mut id = NodeId::new();
        for c in node_id.chars().take(id.capacity()) {
            let c = if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' };
            let _ = id.push(c);
        }
        Self { node_id: id }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    // ── Topics ────────────────────────────────────────────────

    fn entity_topic(&self, object_id: &str, suffix: &str) -> Topic {
        let mut topic = Topic::new();
        let _ = write!(topic, "{TOPIC_PREFIX}/{}/{object_id}/{suffix}", self.node_id);
        topic
    }

    pub fn command_topic(&self, entity: Entity) -> Topic {
        self.entity_topic(entity.object_id(), "cmd_t")
    }

    pub fn state_topic(&self, entity: Entity) -> Topic {
        self.entity_topic(entity.object_id(), "stat_t")
    }

    /// Light entity brightness topics.
    pub fn brightness_command_topic(&self) -> Topic {
        self.entity_topic(Entity::Backlight.object_id(), "bri_cmd_t")
    }

    pub fn brightness_state_topic(&self) -> Topic {
        self.entity_topic(Entity::Backlight.object_id(), "bri_stat_t")
    }

    pub fn trigger_topic(&self, button: ButtonId, kind: PressKind) -> Topic {
        let mut topic = Topic::new();
        let _ = write!(
            topic,
            "{TOPIC_PREFIX}/{}/{}_{}/t",
            self.node_id,
            button.subtype(),
            kind.trigger_type()
        );
        topic
    }

    /// Availability topic; the adapter uses it as the last will.
    pub fn availability_topic(&self) -> Topic {
        let mut topic = Topic::new();
        let _ = write!(topic, "{TOPIC_PREFIX}/{}/avty_t", self.node_id);
        topic
    }

    pub fn discovery_topic(&self, component: &str, object_id: &str) -> Topic {
        let mut topic = Topic::new();
        let _ = write!(
            topic,
            "{DISCOVERY_PREFIX}/{component}/{}/{object_id}/config",
            self.node_id
        );
        topic
    }

    /// Every topic the device subscribes to: entity commands, the HA birth
    /// topic and the inbound sensor feeds.
    pub fn subscriptions(&self) -> heapless::Vec<Topic, 16> {
        let mut topics = heapless::Vec::new();
        for entity in Entity::ALL.into_iter().filter(|e| e.accepts_commands()) {
            let _ = topics.push(self.command_topic(entity));
        }
        let _ = topics.push(self.brightness_command_topic());
        let _ = topics.push(Topic::try_from(HA_STATUS_TOPIC).unwrap_or_default());
        for sensor in &SENSOR_TOPICS {
            let _ = topics.push(Topic::try_from(sensor.topic).unwrap_or_default());
        }
        topics
    }

    // ── Discovery ─────────────────────────────────────────────

    fn device_block(&self) -> Value {
        json!({
            "ids": [self.node_id.as_str()],
            "name": DEVICE_NAME,
            "mf": MANUFACTURER,
            "mdl": MODEL,
            "sw": VERSION,
        })
    }

    fn unique_id(&self, object_id: &str) -> String {
        format!("{}_{object_id}", self.node_id)
    }

    fn entity_config(&self, entity: Entity) -> Value {
        let oid = entity.object_id();
        let mut map = serde_json::Map::new();
        map.insert("name".into(), entity.display_name().into());
        map.insert("uniq_id".into(), self.unique_id(oid).into());
        map.insert("avty_t".into(), self.availability_topic().as_str().into());
        map.insert("dev".into(), self.device_block());
        if entity.accepts_commands() {
            map.insert("cmd_t".into(), self.command_topic(entity).as_str().into());
        }
        if entity != Entity::FeedNow {
            map.insert("stat_t".into(), self.state_topic(entity).as_str().into());
        }

        match entity {
            Entity::Backlight => {
                map.insert("bri_cmd_t".into(), self.brightness_command_topic().as_str().into());
                map.insert("bri_stat_t".into(), self.brightness_state_topic().as_str().into());
                map.insert("bri_scl".into(), 255.into());
                map.insert("opt".into(), true.into());
            }
            Entity::Contrast => number_range(&mut map, 0.0, 255.0, 1.0, None),
            Entity::RotationsPerFeeding => number_range(&mut map, 0.0, 20.0, 0.1, None),
            Entity::GramsPerFeeding => number_range(&mut map, 0.0, 500.0, 1.0, Some("g")),
            Entity::MaxGramsPerDay => number_range(&mut map, 0.0, 5000.0, 1.0, Some("g")),
            Entity::FeedNow => {
                map.insert("pl_prs".into(), "PRESS".into());
                map.insert("ic".into(), "mdi:food-drumstick".into());
            }
            Entity::DispensedToday => {
                map.insert("unit_of_meas".into(), "g".into());
                map.insert("stat_cla".into(), "total".into());
            }
            Entity::ActivityState => {
                map.insert("ic".into(), "mdi:monitor".into());
            }
            Entity::Schedule => {
                map.insert("max".into(), 23.into());
                map.insert("pattern".into(), r"^(\d{1,2}:\d{2}(,\d{1,2}:\d{2}){0,3})?$".into());
            }
        }
        Value::Object(map)
    }

    fn trigger_config(&self, button: ButtonId, kind: PressKind) -> Value {
        json!({
            "atype": "trigger",
            "t": self.trigger_topic(button, kind).as_str(),
            "type": kind.trigger_type(),
            "stype": button.subtype(),
            "pl": kind.trigger_type(),
            "dev": self.device_block(),
        })
    }

    /// Retained discovery configs for every entity and device trigger.
    pub fn discovery(&self) -> Vec<DiscoveryMessage> {
        let mut out = Vec::with_capacity(Entity::ALL.len() + 4);

        for entity in Entity::ALL {
            let topic = self.discovery_topic(entity.component(), entity.object_id());
            push_json(&mut out, topic, &self.entity_config(entity));
        }

        for button in ButtonId::ALL {
            for kind in [PressKind::Short, PressKind::Long] {
                let mut oid = heapless::String::<48>::new();
                let _ = write!(oid, "{}_{}", button.subtype(), kind.trigger_type());
                let topic = self.discovery_topic("device_automation", &oid);
                push_json(&mut out, topic, &self.trigger_config(button, kind));
            }
        }
        out
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Classify an inbound message.
    pub fn classify(&self, topic: &str, payload: &[u8]) -> Inbound {
        if topic == HA_STATUS_TOPIC {
            return if payload == b"online" {
                Inbound::HomeAssistantOnline
            } else {
                Inbound::Dropped
            };
        }
        let Some((object_id, suffix)) = self.split_own_topic(topic) else {
            return Inbound::Other;
        };
        match parse_command(object_id, suffix, payload) {
            Some(cmd) => Inbound::Command(cmd),
            None => {
                warn!("HASS | rejecting malformed command on {topic}");
                Inbound::Rejected
            }
        }
    }

    fn split_own_topic<'t>(&self, topic: &'t str) -> Option<(&'t str, &'t str)> {
        let rest = topic.strip_prefix(TOPIC_PREFIX)?.strip_prefix('/')?;
        let rest = rest.strip_prefix(self.node_id.as_str())?.strip_prefix('/')?;
        rest.split_once('/')
    }

    // ── Outbound ──────────────────────────────────────────────

    /// State messages reflecting an application event.
    pub fn state_updates(&self, event: &AppEvent) -> heapless::Vec<StateMessage, MAX_UPDATES> {
        let mut out = heapless::Vec::new();
        match *event {
            AppEvent::Started {
                state,
                display,
                feeding,
                dispensed_grams_today,
            } => {
                self.push_backlight(&mut out, &display);
                self.push_number(&mut out, Entity::Contrast, display.contrast);
                self.push_feeding(&mut out, &feeding);
                self.push_number(&mut out, Entity::DispensedToday, dispensed_grams_today);
                self.push_activity(&mut out, state);
            }
            AppEvent::StateChanged { to, .. } => self.push_activity(&mut out, to),
            AppEvent::DeviceTrigger { button, kind } => {
                let _ = out.push(StateMessage {
                    topic: self.trigger_topic(button, kind),
                    payload: StatePayload::try_from(kind.trigger_type()).unwrap_or_default(),
                    retain: false,
                });
            }
            AppEvent::BacklightChanged { enabled, level } => {
                let display = DisplayConfig {
                    backlight_enabled: enabled,
                    backlight_level: level,
                    ..DisplayConfig::default()
                };
                self.push_backlight(&mut out, &display);
            }
            AppEvent::ContrastChanged(c) => self.push_number(&mut out, Entity::Contrast, c),
            AppEvent::FeedingConfigChanged(feeding) => self.push_feeding(&mut out, &feeding),
            AppEvent::QuotaChanged(total) => {
                self.push_number(&mut out, Entity::DispensedToday, total);
            }
            AppEvent::FeedStarted { .. }
            | AppEvent::FeedRejected(_)
            | AppEvent::SensorUpdated { .. } => {}
        }
        out
    }

    fn push_state(
        &self,
        out: &mut heapless::Vec<StateMessage, MAX_UPDATES>,
        topic: Topic,
        payload: StatePayload,
    ) {
        let _ = out.push(StateMessage {
            topic,
            payload,
            retain: true,
        });
    }

    fn push_number(
        &self,
        out: &mut heapless::Vec<StateMessage, MAX_UPDATES>,
        entity: Entity,
        value: impl core::fmt::Display,
    ) {
        let mut payload = StatePayload::new();
        let _ = write!(payload, "{value}");
        self.push_state(out, self.state_topic(entity), payload);
    }

    fn push_backlight(
        &self,
        out: &mut heapless::Vec<StateMessage, MAX_UPDATES>,
        display: &DisplayConfig,
    ) {
        let on = if display.backlight_enabled { "ON" } else { "OFF" };
        self.push_state(
            out,
            self.state_topic(Entity::Backlight),
            StatePayload::try_from(on).unwrap_or_default(),
        );
        let mut level = StatePayload::new();
        let _ = write!(level, "{}", display.backlight_level);
        self.push_state(out, self.brightness_state_topic(), level);
    }

    fn push_feeding(
        &self,
        out: &mut heapless::Vec<StateMessage, MAX_UPDATES>,
        feeding: &FeedingConfig,
    ) {
        self.push_number(out, Entity::RotationsPerFeeding, feeding.rotations_per_feeding);
        self.push_number(out, Entity::GramsPerFeeding, feeding.grams_per_feeding);
        self.push_number(out, Entity::MaxGramsPerDay, feeding.max_grams_per_day);
        let text = format_schedule(&feeding.schedule);
        self.push_state(
            out,
            self.state_topic(Entity::Schedule),
            StatePayload::try_from(text.as_str()).unwrap_or_default(),
        );
    }

    fn push_activity(&self, out: &mut heapless::Vec<StateMessage, MAX_UPDATES>, state: StateId) {
        self.push_state(
            out,
            self.state_topic(Entity::ActivityState),
            StatePayload::try_from(state.label()).unwrap_or_default(),
        );
    }
}

// ───────────────────────────────────────────────────────────────
// Payload parsing
// ───────────────────────────────────────────────────────────────

fn parse_command(object_id: &str, suffix: &str, payload: &[u8]) -> Option<AppCommand> {
    let text = core::str::from_utf8(payload).ok()?.trim();
    let entity = Entity::from_object_id(object_id)?;

    match (entity, suffix) {
        (Entity::Backlight, "cmd_t") => parse_switch(text).map(AppCommand::SetBacklightState),
        (Entity::Backlight, "bri_cmd_t") => parse_u8(text).map(AppCommand::SetBacklightLevel),
        (Entity::Contrast, "cmd_t") => parse_u8(text).map(AppCommand::SetContrast),
        (Entity::RotationsPerFeeding, "cmd_t") => {
            parse_number(text).map(AppCommand::SetRotationsPerFeeding)
        }
        (Entity::GramsPerFeeding, "cmd_t") => parse_number(text).map(AppCommand::SetGramsPerFeeding),
        (Entity::MaxGramsPerDay, "cmd_t") => parse_number(text).map(AppCommand::SetMaxGramsPerDay),
        (Entity::FeedNow, "cmd_t") => (text == "PRESS").then_some(AppCommand::FeedNow),
        (Entity::Schedule, "cmd_t") => parse_schedule(text).ok().map(AppCommand::SetSchedule),
        _ => None,
    }
}

fn parse_switch(text: &str) -> Option<bool> {
    match text {
        "ON" => Some(true),
        "OFF" => Some(false),
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<f32> {
    let v: f32 = text.parse().ok()?;
    v.is_finite().then_some(v)
}

/// Integral 0..=255; HA sends numbers as `"128"` or `"128.0"`.
fn parse_u8(text: &str) -> Option<u8> {
    let v = parse_number(text)?;
    if v.fract() != 0.0 || !(0.0..=255.0).contains(&v) {
        return None;
    }
    Some(v as u8)
}

fn number_range(
    map: &mut serde_json::Map<String, Value>,
    min: f64,
    max: f64,
    step: f64,
    unit: Option<&str>,
) {
    map.insert("min".into(), json!(min));
    map.insert("max".into(), json!(max));
    map.insert("step".into(), json!(step));
    map.insert("mode".into(), "box".into());
    if let Some(unit) = unit {
        map.insert("unit_of_meas".into(), unit.into());
    }
}

fn push_json(out: &mut Vec<DiscoveryMessage>, topic: Topic, value: &Value) {
    match serde_json::to_string(value) {
        Ok(payload) => out.push(DiscoveryMessage { topic, payload }),
        Err(e) => warn!("HASS | discovery encode failed for {topic}: {e}"),
    }
}
