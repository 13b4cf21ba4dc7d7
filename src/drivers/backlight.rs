//! Backlight PWM driver.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the LEDC channel configured in hw_init.
//! On host/test: tracks the level in-memory only.
//!
//! The button ISR may also write the channel (wake on press); the main
//! loop stays authoritative and rewrites the level on its next tick.

use crate::drivers::hw_init;

#[derive(Debug, Default)]
pub struct BacklightDriver {
    level: u8,
}

impl BacklightDriver {
    pub fn new() -> Self {
        Self { level: 0 }
    }

    /// 0 = dark, 255 = full.
    pub fn set_level(&mut self, level: u8) {
        hw_init::ledc_set(hw_init::LEDC_CH_BACKLIGHT, level);
        self.level = level;
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_on(&self) -> bool {
        self.level > 0
    }
}
