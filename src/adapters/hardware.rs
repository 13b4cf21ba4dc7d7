//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the backlight and the main-loop side of the stepper, exposing them
//! through [`ActuatorPort`] and [`MotionPort`].  On non-espidf targets the
//! underlying drivers use cfg-gated simulation stubs.

use crate::app::ports::{ActuatorPort, MotionPort};
use crate::drivers::backlight::BacklightDriver;
use crate::drivers::stepper::StepperDriver;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    backlight: BacklightDriver,
    stepper: StepperDriver,
}

impl HardwareAdapter {
    pub fn new(backlight: BacklightDriver, stepper: StepperDriver) -> Self {
        Self { backlight, stepper }
    }

    pub fn backlight_level(&self) -> u8 {
        self.backlight.level()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn set_backlight(&mut self, level: u8) {
        self.backlight.set_level(level);
    }
}

// ── MotionPort implementation ─────────────────────────────────

impl MotionPort for HardwareAdapter {
    fn enable(&mut self, on: bool) {
        self.stepper.enable(on);
    }

    fn move_relative(&mut self, steps: i32) {
        self.stepper.move_relative(steps);
    }

    fn is_running(&self) -> bool {
        self.stepper.is_running()
    }

    fn set_max_speed(&mut self, steps_per_sec: f32) {
        self.stepper.set_max_speed(steps_per_sec);
    }

    fn set_acceleration(&mut self, steps_per_sec2: f32) {
        self.stepper.set_acceleration(steps_per_sec2);
    }
}
