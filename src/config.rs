//! System configuration parameters
//!
//! All tunable parameters for the feeder display.  The persisted subset
//! lives in [`Settings`]; fixed timing and hardware constants sit next to
//! it so every component reads them from one place.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Timing constants
// ---------------------------------------------------------------------------

/// Minimum spacing between two accepted raw button transitions.
pub const DEBOUNCE_MS: u32 = 50;
/// Hold duration at or above which a release classifies as a long press.
pub const LONG_PRESS_MS: u32 = 500;
/// No interaction for longer than this powers the backlight down.
pub const IDLE_TIMEOUT_MS: u32 = 15_000;

/// Main control loop period.
pub const CONTROL_TICK_MS: u32 = 50;
/// Display refresh period.
pub const RENDER_TICK_MS: u32 = 1_000;
/// Wall-clock work (day rollover, schedule) period.
pub const CLOCK_TICK_MS: u32 = 1_000;
/// Stepper timer period.
pub const STEPPER_TICK_US: u32 = 100;

// ---------------------------------------------------------------------------
// Hardware constants
// ---------------------------------------------------------------------------

/// Half-steps per output shaft revolution (28BYJ-48 geared stepper).
pub const STEPS_PER_REVOLUTION: u32 = 4096;

/// Number of physical usage buttons.
pub const BUTTON_COUNT: usize = 2;

/// Maximum number of daily feeding slots.
pub const MAX_FEED_TIMES: usize = 4;

/// POSIX TZ string applied before the first wall-clock read.
pub const TIMEZONE: &str = "CET-1CEST,M3.5.0,M10.5.0/3";

/// Longest credential string that still leaves room for the NUL terminator.
pub const CREDENTIAL_MAX_LEN: usize = 63;

pub type CredentialString = heapless::String<64>;

// ---------------------------------------------------------------------------
// Sensor topics
// ---------------------------------------------------------------------------

/// Inbound sensor topics that feed the delta estimator, with their labels
/// and the rate (units/min) above which a trend arrow is drawn.
pub const SENSOR_TOPICS: [SensorTopic; 2] = [
    SensorTopic {
        topic: "GreenThing/27B529/CO/temperature",
        label: "CO",
        change_threshold: 0.1,
    },
    SensorTopic {
        topic: "GreenThing/27B529/CWU/temperature",
        label: "CWU",
        change_threshold: 0.1,
    },
];

#[derive(Debug, Clone, Copy)]
pub struct SensorTopic {
    pub topic: &'static str,
    pub label: &'static str,
    pub change_threshold: f32,
}

// ---------------------------------------------------------------------------
// Persisted settings
// ---------------------------------------------------------------------------

/// Broker connection details.  Stored as the fixed-width prefix of the
/// settings record and always restored, even across schema changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttCredentials {
    pub server: CredentialString,
    pub port: u16,
    pub user: CredentialString,
    pub password: CredentialString,
}

impl Default for MqttCredentials {
    fn default() -> Self {
        Self {
            server: CredentialString::new(),
            port: 1883,
            user: CredentialString::new(),
            password: CredentialString::new(),
        }
    }
}

/// Display panel settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Panel contrast (0-255).
    pub contrast: u8,
    /// Backlight PWM level used while the display is active (0-255).
    pub backlight_level: u8,
    /// User-facing ON/OFF switch of the backlight light entity.
    pub backlight_enabled: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            contrast: 128,
            backlight_level: 128,
            backlight_enabled: true,
        }
    }
}

/// Stepper motion profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Cruise speed in steps per second.
    pub max_speed: f32,
    /// Ramp in steps per second squared.
    pub acceleration: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            max_speed: 800.0,
            acceleration: 400.0,
        }
    }
}

/// A daily feeding time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedTime {
    pub hour: u8,
    pub minute: u8,
    pub enabled: bool,
}

impl FeedTime {
    pub const fn at(hour: u8, minute: u8) -> Self {
        Self {
            hour,
            minute,
            enabled: true,
        }
    }
}

fn default_steps_per_revolution() -> u32 {
    STEPS_PER_REVOLUTION
}

/// Dispensing ratios, the daily cap and the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedingConfig {
    /// Hardware constant; never persisted.
    #[serde(skip, default = "default_steps_per_revolution")]
    pub steps_per_revolution: u32,
    pub rotations_per_feeding: f32,
    pub grams_per_feeding: f32,
    pub max_grams_per_day: f32,
    /// When set, a feed that would push the daily total past
    /// `max_grams_per_day` is refused.  Off by default: the cap is telemetry.
    pub enforce_daily_cap: bool,
    pub schedule: [FeedTime; MAX_FEED_TIMES],
}

impl Default for FeedingConfig {
    fn default() -> Self {
        Self {
            steps_per_revolution: STEPS_PER_REVOLUTION,
            rotations_per_feeding: 1.0,
            grams_per_feeding: 10.0,
            max_grams_per_day: 60.0,
            enforce_daily_cap: false,
            schedule: [FeedTime::default(); MAX_FEED_TIMES],
        }
    }
}

/// Everything after the credential prefix of the persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub display: DisplayConfig,
    pub motion: MotionConfig,
    pub feeding: FeedingConfig,
    /// Running total for the current calendar day.
    #[serde(with = "postcard::fixint::le")]
    pub dispensed_grams_today: u32,
}

/// The complete persisted configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub mqtt: MqttCredentials,
    pub device: DeviceSettings,
}

impl Settings {
    /// Range-check every field.  Out-of-range values are rejected, never
    /// clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let creds = [
            (&self.mqtt.server, "mqtt server longer than 63 bytes"),
            (&self.mqtt.user, "mqtt user longer than 63 bytes"),
            (&self.mqtt.password, "mqtt password longer than 63 bytes"),
        ];
        for (value, msg) in creds {
            if value.len() > CREDENTIAL_MAX_LEN || value.as_bytes().contains(&0) {
                return Err(ConfigError::ValidationFailed(msg));
            }
        }
        if self.mqtt.port == 0 {
            return Err(ConfigError::ValidationFailed("mqtt port must be 1-65535"));
        }
        self.device.motion.validate()?;
        self.device.feeding.validate()
    }
}

impl MotionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1.0..=2000.0).contains(&self.max_speed) {
            return Err(ConfigError::ValidationFailed(
                "max_speed must be 1-2000 steps/s",
            ));
        }
        if !(1.0..=10_000.0).contains(&self.acceleration) {
            return Err(ConfigError::ValidationFailed(
                "acceleration must be 1-10000 steps/s²",
            ));
        }
        Ok(())
    }
}

impl FeedingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=20.0).contains(&self.rotations_per_feeding) {
            return Err(ConfigError::ValidationFailed(
                "rotations_per_feeding must be 0-20",
            ));
        }
        if !(0.0..=500.0).contains(&self.grams_per_feeding) {
            return Err(ConfigError::ValidationFailed(
                "grams_per_feeding must be 0-500",
            ));
        }
        if !(0.0..=5000.0).contains(&self.max_grams_per_day) {
            return Err(ConfigError::ValidationFailed(
                "max_grams_per_day must be 0-5000",
            ));
        }
        for slot in &self.schedule {
            if slot.hour > 23 || slot.minute > 59 {
                return Err(ConfigError::ValidationFailed(
                    "feed time must be 00:00-23:59",
                ));
            }
        }
        Ok(())
    }

    /// Motor steps for one feeding.  Fractional steps are dropped so a
    /// feeding never dispenses more than configured.
    pub fn steps_per_feeding(&self) -> u32 {
        let steps = self.steps_per_revolution as f32 * self.rotations_per_feeding;
        if steps.is_finite() && steps > 0.0 {
            steps.trunc() as u32
        } else {
            0
        }
    }

    /// Grams credited to the daily total for one feeding.
    pub fn grams_per_feeding_rounded(&self) -> u32 {
        if self.grams_per_feeding.is_finite() && self.grams_per_feeding > 0.0 {
            self.grams_per_feeding.round() as u32
        } else {
            0
        }
    }
}
