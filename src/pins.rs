//! GPIO / peripheral pin assignments for the feeder display board (ESP32-C3).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Backlight
// ---------------------------------------------------------------------------

/// LEDC PWM output driving the backlight transistor.
pub const BACKLIGHT_GPIO: i32 = 21;

// ---------------------------------------------------------------------------
// Usage buttons (active-low with internal pull-up)
// ---------------------------------------------------------------------------

pub const BUTTON_GPIOS: [i32; crate::config::BUTTON_COUNT] = [20, 10];

// ---------------------------------------------------------------------------
// Stepper (ULN2003, coils IN1..IN4)
// ---------------------------------------------------------------------------

pub const STEPPER_COIL_GPIOS: [i32; 4] = [5, 6, 7, 8];

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).  8-bit gives 0 – 255 duty levels.
pub const PWM_RESOLUTION_BITS: u32 = 8;
/// LEDC frequency for the backlight (5 kHz, flicker-free).
pub const BACKLIGHT_PWM_FREQ_HZ: u32 = 5_000;
