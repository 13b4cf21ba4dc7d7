//! Inbound commands to the application service.
//!
//! These represent actions requested from Home Assistant (via the MQTT
//! command topics) that the [`AppService`](super::service::AppService)
//! validates, applies, persists and echoes back as state.

use crate::config::{FeedTime, MAX_FEED_TIMES};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    /// Backlight light entity ON/OFF.
    SetBacklightState(bool),
    /// Backlight light entity brightness (0–255).
    SetBacklightLevel(u8),
    /// Contrast number entity (0–255).
    SetContrast(u8),
    SetRotationsPerFeeding(f32),
    SetGramsPerFeeding(f32),
    SetMaxGramsPerDay(f32),
    /// Feeding schedule text entity, already parsed.
    SetSchedule([FeedTime; MAX_FEED_TIMES]),
    /// Feed-now button entity.
    FeedNow,
}

impl AppCommand {
    /// Whether applying the command changes persisted settings.
    pub fn mutates_settings(&self) -> bool {
        !matches!(self, Self::FeedNow)
    }
}
