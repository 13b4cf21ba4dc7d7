//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (motion driver, backlight, display, clock, settings
//! store, event sinks) implement these traits.  The
//! [`AppService`](super::service::AppService) consumes them via generics,
//! so the domain core never touches hardware directly.

use crate::config::Settings;
use crate::ui::Frame;

pub use crate::error::{ConfigError, StorageError};

// ───────────────────────────────────────────────────────────────
// Motion port (driven adapter: domain → stepper driver)
// ───────────────────────────────────────────────────────────────

/// The feeder's stepper.  `move_relative` only queues the move; the
/// driver's high-rate tick does the stepping.
pub trait MotionPort {
    /// Energise (or release) the coils.
    fn enable(&mut self, on: bool);

    /// Add `steps` to the outstanding distance.
    fn move_relative(&mut self, steps: i32);

    /// Whether a move is still in progress.
    fn is_running(&self) -> bool;

    /// Cruise speed in steps per second.
    fn set_max_speed(&mut self, steps_per_sec: f32);

    /// Ramp in steps per second squared.
    fn set_acceleration(&mut self, steps_per_sec2: f32);
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → display hardware)
// ───────────────────────────────────────────────────────────────

pub trait ActuatorPort {
    /// Backlight PWM level, 0 = off.
    fn set_backlight(&mut self, level: u8);
}

// ───────────────────────────────────────────────────────────────
// Display port (driven adapter: domain → panel)
// ───────────────────────────────────────────────────────────────

pub trait DisplayPort {
    fn draw(&mut self, frame: &Frame);
    fn flush(&mut self);

    /// Panel contrast (controller electronic volume), 0–255.
    fn set_contrast(&mut self, contrast: u8);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Local wall-clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Day of month, 1–31.
    pub day: u8,
}

pub trait ClockPort {
    /// `None` until the clock has been synchronised.
    fn wall_time(&self) -> Option<WallTime>;

    /// Monotonic milliseconds since boot (wrapping).
    fn uptime_ms(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / MQTT)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, MQTT
/// state topics, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Fan out to two sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn emit(&mut self, event: &super::events::AppEvent) {
        (**self).emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Settings port (driven adapter: domain ↔ persisted record)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the settings record.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], never clamped.
pub trait SettingsPort {
    /// Load settings.  A missing record yields defaults (and the
    /// implementation tries to write them back).
    fn load(&mut self) -> Result<Settings, ConfigError>;

    /// Validate and persist the whole record.
    fn save(&mut self, settings: &Settings) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value blob storage.
///
/// Write operations MUST be atomic: no partial writes on power loss.
/// The ESP-IDF NVS API guarantees this natively; the in-memory simulation
/// achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Size in bytes of a stored value, without reading it.
    fn stored_len(&self, namespace: &str, key: &str) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}
