//! Remote sensor streams and the topic-routing [`SensorHub`].
//!
//! Values arrive as plain UTF-8 decimals on fixed MQTT topics.  The hub
//! parses each payload and feeds the matching [`SensorStream`]; anything
//! unparsable is dropped and the stream keeps its previous state.

pub mod delta;

use log::{debug, warn};

use crate::config::{SENSOR_TOPICS, SensorTopic};
use delta::SensorStream;

pub const SENSOR_COUNT: usize = SENSOR_TOPICS.len();

/// Which stream a message updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSlot {
    Primary = 0,
    Secondary = 1,
}

impl SensorSlot {
    pub const ALL: [SensorSlot; SENSOR_COUNT] = [SensorSlot::Primary, SensorSlot::Secondary];
}

pub struct SensorHub {
    topics: [SensorTopic; SENSOR_COUNT],
    streams: [SensorStream; SENSOR_COUNT],
}

impl Default for SensorHub {
    fn default() -> Self {
        Self::new(SENSOR_TOPICS)
    }
}

impl SensorHub {
    pub fn new(topics: [SensorTopic; SENSOR_COUNT]) -> Self {
        Self {
            streams: topics.map(|t| SensorStream::new(t.change_threshold)),
            topics,
        }
    }

    /// Topics the MQTT adapter must subscribe to.
    pub fn topics(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.topics.iter().map(|t| t.topic)
    }

    pub fn slot_for(&self, topic: &str) -> Option<SensorSlot> {
        self.topics
            .iter()
            .position(|t| t.topic == topic)
            .map(|i| SensorSlot::ALL[i])
    }

    /// Route one inbound message.  Returns the updated slot, or `None` if
    /// the topic is not a sensor topic or the payload is not a number.
    pub fn on_message(&mut self, topic: &str, payload: &[u8], now_ms: u32) -> Option<SensorSlot> {
        let slot = self.slot_for(topic)?;
        let Some(value) = parse_value(payload) else {
            warn!("SENSOR | dropping malformed payload on {topic}");
            return None;
        };
        let stream = &mut self.streams[slot as usize];
        stream.on_sample(value, now_ms);
        debug!(
            "SENSOR | {} = {:.2} ({:+.2}/min)",
            self.topics[slot as usize].label, value, stream.rate_per_minute
        );
        Some(slot)
    }

    pub fn stream(&self, slot: SensorSlot) -> &SensorStream {
        &self.streams[slot as usize]
    }

    pub fn label(&self, slot: SensorSlot) -> &'static str {
        self.topics[slot as usize].label
    }
}

/// Parse a decimal payload.  Whitespace is tolerated; NaN and infinities
/// are not.
pub fn parse_value(payload: &[u8]) -> Option<f32> {
    let text = core::str::from_utf8(payload).ok()?;
    let value: f32 = text.trim().parse().ok()?;
    value.is_finite().then_some(value)
}
