//! Activity timer shared between the button ISR and the main loop.
//!
//! Every field is a single machine word so both sides use plain atomics:
//!
//! ```text
//!   button ISR ──record_interaction()──▶ last_interaction_ms, pending
//!                                   └──▶ backlight on (if it was off)
//!   main loop  ──take_interaction()───▶ clears pending, feeds the FSM
//!              ──set_lit()────────────▶ authoritative lit flag
//! ```
//!
//! The ISR may light the backlight ahead of the main loop; the activity
//! machine then sees the pending interaction on its next tick and never
//! switches the light back off while one is outstanding.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

pub struct ActivityTimer {
    last_interaction_ms: AtomicU32,
    pending: AtomicBool,
    backlight_lit: AtomicBool,
    /// PWM level the ISR applies when it wakes the backlight.
    wake_level: AtomicU8,
}

impl ActivityTimer {
    pub const fn new(now_ms: u32) -> Self {
        Self {
            last_interaction_ms: AtomicU32::new(now_ms),
            pending: AtomicBool::new(false),
            backlight_lit: AtomicBool::new(true),
            wake_level: AtomicU8::new(128),
        }
    }

    /// Stamp an interaction.  Returns `true` when the backlight was off and
    /// the caller should turn it on immediately.
    pub fn record_interaction(&self, now_ms: u32) -> bool {
        self.last_interaction_ms.store(now_ms, Ordering::Release);
        self.pending.store(true, Ordering::Release);
        !self.backlight_lit.swap(true, Ordering::AcqRel)
    }

    /// Consume the pending interaction flag, returning its timestamp.
    pub fn take_interaction(&self) -> Option<u32> {
        if self.pending.swap(false, Ordering::AcqRel) {
            Some(self.last_interaction_ms.load(Ordering::Acquire))
        } else {
            None
        }
    }

    pub fn interaction_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub fn last_interaction_ms(&self) -> u32 {
        self.last_interaction_ms.load(Ordering::Acquire)
    }

    pub fn is_lit(&self) -> bool {
        self.backlight_lit.load(Ordering::Acquire)
    }

    pub fn set_lit(&self, lit: bool) {
        self.backlight_lit.store(lit, Ordering::Release);
    }

    pub fn wake_level(&self) -> u8 {
        self.wake_level.load(Ordering::Relaxed)
    }

    pub fn set_wake_level(&self, level: u8) {
        self.wake_level.store(level, Ordering::Relaxed);
    }
}
