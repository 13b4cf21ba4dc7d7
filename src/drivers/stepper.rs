//! Half-step driver for a 4-coil unipolar stepper (28BYJ-48 + ULN2003).
//!
//! ```text
//!   main loop ── StepperDriver (MotionPort) ──┐
//!                                             ▼
//!                          StepperCore  Mutex<Cell<StepperState>>
//!                                             ▲
//!   100 µs timer ── tick(period_us) ──────────┘──▶ coil pattern
//! ```
//!
//! The ramp is linear in time: each step adds `accel / v` to the speed
//! while accelerating and removes it once the remaining distance is inside
//! the braking distance `v² / 2a`.  Square roots are only taken from the
//! main loop (when the acceleration changes), never in the tick.

use core::cell::Cell;

use critical_section::Mutex;
use log::debug;

use crate::app::ports::MotionPort;
use crate::drivers::hw_init;

/// Coil patterns (IN1 = bit 0 .. IN4 = bit 3), one half step each.
pub const HALF_STEP_SEQUENCE: [u8; 8] = [
    0b0001, 0b0011, 0b0010, 0b0110, 0b0100, 0b1100, 0b1000, 0b1001,
];

/// All coils off.
pub const COILS_RELEASED: u8 = 0;

const DEFAULT_MAX_SPEED: f32 = 800.0;
const DEFAULT_ACCELERATION: f32 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepperState {
    /// Absolute position in half steps.
    pub position: i32,
    /// Signed distance still to travel.
    pub remaining: i32,
    phase: u8,
    /// Current speed, steps/s (always > 0 while running).
    speed: f32,
    max_speed: f32,
    acceleration: f32,
    /// Speed of the first step from standstill, `sqrt(2a)`.
    start_speed: f32,
    /// Time since the last step.
    elapsed_us: u32,
    enabled: bool,
    /// Latch a released pattern on the next tick.
    release_pending: bool,
}

impl StepperState {
    const fn new() -> Self {
        Self {
            position: 0,
            remaining: 0,
            phase: 0,
            speed: 0.0,
            max_speed: DEFAULT_MAX_SPEED,
            acceleration: DEFAULT_ACCELERATION,
            // sqrt(2 * 400)
            start_speed: 28.284_271,
            elapsed_us: 0,
            enabled: false,
            release_pending: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.remaining != 0
    }

    fn step_interval_us(&self) -> u32 {
        if self.speed <= 0.0 {
            return u32::MAX;
        }
        (1_000_000.0 / self.speed) as u32
    }

    fn braking_distance(&self) -> f32 {
        self.speed * self.speed / (2.0 * self.acceleration)
    }

    /// Advance one half step and update the ramp.
    fn step(&mut self) -> u8 {
        let dir: i32 = if self.remaining > 0 { 1 } else { -1 };
        self.phase = (self.phase as i32 + dir).rem_euclid(8) as u8;
        self.position = self.position.wrapping_add(dir);
        self.remaining -= dir;

        if self.remaining == 0 {
            self.speed = 0.0;
            self.release_pending = true;
        } else {
            let delta = self.acceleration / self.speed;
            if (self.remaining.unsigned_abs() as f32) <= self.braking_distance() {
                self.speed = (self.speed - delta).max(self.start_speed);
            } else {
                self.speed = (self.speed + delta).min(self.max_speed);
            }
        }
        HALF_STEP_SEQUENCE[self.phase as usize]
    }

    /// Timer tick.  Returns the pattern to latch, if it changed.
    pub fn tick(&mut self, period_us: u32) -> Option<u8> {
        if !self.enabled || !self.is_running() {
            if self.release_pending {
                self.release_pending = false;
                return Some(COILS_RELEASED);
            }
            return None;
        }

        self.elapsed_us = self.elapsed_us.saturating_add(period_us);
        if self.elapsed_us < self.step_interval_us() {
            return None;
        }
        self.elapsed_us = 0;
        Some(self.step())
    }
}

// ───────────────────────────────────────────────────────────────
// StepperCore: shared with the timer callback
// ───────────────────────────────────────────────────────────────

pub struct StepperCore {
    state: Mutex<Cell<StepperState>>,
}

impl Default for StepperCore {
    fn default() -> Self {
        Self::new()
    }
}

impl StepperCore {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(StepperState::new())),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut StepperState) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut s = cell.get();
            let r = f(&mut s);
            cell.set(s);
            r
        })
    }

    /// Timer entry point.
    pub fn tick(&self, period_us: u32) -> Option<u8> {
        self.update(|s| s.tick(period_us))
    }

    pub fn snapshot(&self) -> StepperState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }

    pub fn is_running(&self) -> bool {
        self.snapshot().is_running()
    }

    pub fn position(&self) -> i32 {
        self.snapshot().position
    }

    pub fn move_relative(&self, steps: i32) {
        self.update(|s| {
            if !s.is_running() {
                s.speed = s.start_speed.min(s.max_speed);
                s.elapsed_us = 0;
            }
            s.remaining = s.remaining.saturating_add(steps);
            if s.remaining == 0 {
                s.speed = 0.0;
            }
        });
    }

    /// Energise or release.  Releasing abandons any outstanding distance.
    pub fn set_enabled(&self, on: bool) {
        self.update(|s| {
            s.enabled = on;
            if !on {
                s.remaining = 0;
                s.speed = 0.0;
                s.release_pending = false;
            }
        });
    }

    pub fn set_max_speed(&self, steps_per_sec: f32) {
        if steps_per_sec > 0.0 {
            self.update(|s| s.max_speed = steps_per_sec);
        }
    }

    pub fn set_acceleration(&self, steps_per_sec2: f32) {
        if steps_per_sec2 > 0.0 {
            let start = (2.0 * steps_per_sec2).sqrt();
            self.update(|s| {
                s.acceleration = steps_per_sec2;
                s.start_speed = start;
            });
        }
    }
}

// ───────────────────────────────────────────────────────────────
// StepperDriver: main-loop handle
// ───────────────────────────────────────────────────────────────

/// Main-loop side of the stepper, implementing [`MotionPort`].
pub struct StepperDriver {
    core: &'static StepperCore,
}

impl StepperDriver {
    pub fn new(core: &'static StepperCore) -> Self {
        Self { core }
    }

    pub fn core(&self) -> &'static StepperCore {
        self.core
    }
}

impl MotionPort for StepperDriver {
    fn enable(&mut self, on: bool) {
        self.core.set_enabled(on);
        if !on {
            hw_init::write_coils(COILS_RELEASED);
        }
        debug!("Stepper: coils {}", if on { "energised" } else { "released" });
    }

    fn move_relative(&mut self, steps: i32) {
        self.core.move_relative(steps);
    }

    fn is_running(&self) -> bool {
        self.core.is_running()
    }

    fn set_max_speed(&mut self, steps_per_sec: f32) {
        self.core.set_max_speed(steps_per_sec);
    }

    fn set_acceleration(&mut self, steps_per_sec2: f32) {
        self.core.set_acceleration(steps_per_sec2);
    }
}

/// Timer callback body: advance the ramp and latch the coils.
pub fn on_timer_tick(core: &StepperCore, period_us: u32) {
    if let Some(pattern) = core.tick(period_us) {
        hw_init::write_coils(pattern);
    }
}
