//! Shared mutable context threaded through every FSM handler.
//!
//! The service fills in the inputs (`now_ms`, `interaction`,
//! `motion_running`) before each tick and reads `backlight_lit` back
//! afterwards.

pub struct FsmContext {
    // -- Timing --
    /// Monotonic milliseconds since boot (wrapping).
    pub now_ms: u32,

    // -- Inputs --
    /// Timestamp of the most recent interaction.
    pub last_interaction_ms: u32,
    /// An interaction happened since the previous tick.  Handlers consume it.
    pub interaction: bool,
    /// Motion driver reports an outstanding move.
    pub motion_running: bool,

    // -- Configuration --
    pub idle_timeout_ms: u32,

    // -- Outputs --
    /// Whether the backlight should be powered.
    pub backlight_lit: bool,
}

impl FsmContext {
    pub fn new(now_ms: u32, idle_timeout_ms: u32) -> Self {
        Self {
            now_ms,
            last_interaction_ms: now_ms,
            interaction: false,
            motion_running: false,
            idle_timeout_ms,
            backlight_lit: true,
        }
    }

    /// Milliseconds since the last interaction, wrap-safe.  A stamp taken
    /// after `now_ms` was sampled counts as zero elapsed.
    pub fn idle_for_ms(&self) -> u32 {
        let elapsed = self.now_ms.wrapping_sub(self.last_interaction_ms);
        if elapsed > u32::MAX / 2 { 0 } else { elapsed }
    }
}
