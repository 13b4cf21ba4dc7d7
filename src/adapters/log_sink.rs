//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC).  The MQTT adapter implements the
//! same trait; `main` fans out to both.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started {
                state,
                display,
                feeding,
                dispensed_grams_today,
            } => {
                info!(
                    "START | state={} | backlight={}/{} contrast={} | \
                     {:.1} rev = {:.0} g per feed, {}/{:.0} g today",
                    state.label(),
                    if display.backlight_enabled { "ON" } else { "OFF" },
                    display.backlight_level,
                    display.contrast,
                    feeding.rotations_per_feeding,
                    feeding.grams_per_feeding,
                    dispensed_grams_today,
                    feeding.max_grams_per_day,
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from.label(), to.label());
            }
            AppEvent::DeviceTrigger { button, kind } => {
                info!("TRIGGER | {} {}", button.subtype(), kind.trigger_type());
            }
            AppEvent::BacklightChanged { enabled, level } => {
                info!(
                    "DISPLAY | backlight {} level={}",
                    if *enabled { "ON" } else { "OFF" },
                    level
                );
            }
            AppEvent::ContrastChanged(c) => info!("DISPLAY | contrast={}", c),
            AppEvent::FeedingConfigChanged(f) => {
                info!(
                    "FEED | config rotations={:.2} grams={:.0} max={:.0} cap={}",
                    f.rotations_per_feeding,
                    f.grams_per_feeding,
                    f.max_grams_per_day,
                    f.enforce_daily_cap
                );
            }
            AppEvent::QuotaChanged(total) => info!("QUOTA | {} g today", total),
            AppEvent::FeedStarted { steps, grams } => {
                info!("FEED | started {} steps, +{} g", steps, grams);
            }
            AppEvent::FeedRejected(e) => warn!("FEED | rejected: {}", e),
            AppEvent::SensorUpdated {
                slot,
                value,
                rate_per_minute,
            } => {
                info!(
                    "SENSOR | {:?} = {:.2} ({:+.2}/min)",
                    slot, value, rate_per_minute
                );
            }
        }
    }
}
