//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, or publish to the
//! Home Assistant state and trigger topics.

use crate::config::{FeedingConfig, DisplayConfig};
use crate::drivers::button::{ButtonId, PressKind};
use crate::error::FeedError;
use crate::fsm::StateId;
use crate::sensors::SensorSlot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    /// The service has started; carries everything needed to publish the
    /// initial state of every entity.
    Started {
        state: StateId,
        display: DisplayConfig,
        feeding: FeedingConfig,
        dispensed_grams_today: u32,
    },

    /// The activity machine moved.
    StateChanged { from: StateId, to: StateId },

    /// A usage button was pressed (device trigger).
    DeviceTrigger { button: ButtonId, kind: PressKind },

    /// Backlight entity state after a command.
    BacklightChanged { enabled: bool, level: u8 },

    ContrastChanged(u8),

    /// Any feeding parameter or the schedule changed.
    FeedingConfigChanged(FeedingConfig),

    /// New running total for today.
    QuotaChanged(u32),

    FeedStarted { steps: u32, grams: u32 },

    FeedRejected(FeedError),

    SensorUpdated { slot: SensorSlot, value: f32, rate_per_minute: f32 },
}
