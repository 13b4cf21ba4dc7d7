//! Concrete state handler functions and table builder.
//!
//! ```text
//!  ACTIVE ──[no interaction > timeout]──▶ IDLE
//!    ▲  ▲                                  │
//!    │  └────────[interaction]─────────────┘
//!    │
//!    └──[motion stopped]── BUSY ◀──[feed started] (any state)
//! ```
//!
//! Precedence inside a tick: BUSY > interaction > timeout.

use super::context::FsmContext;
use super::{StateDescriptor, StateId};
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Active
        StateDescriptor {
            name: "Active",
            on_enter: Some(active_enter),
            on_exit: None,
            on_update: active_update,
        },
        // Index 1: Idle
        StateDescriptor {
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 2: Busy
        StateDescriptor {
            name: "Busy",
            on_enter: Some(busy_enter),
            on_exit: Some(busy_exit),
            on_update: busy_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  ACTIVE state
// ═══════════════════════════════════════════════════════════════════════════

fn active_enter(ctx: &mut FsmContext) {
    ctx.backlight_lit = true;
    debug!("ACTIVE: backlight on");
}

fn active_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.interaction {
        ctx.interaction = false;
        ctx.backlight_lit = true;
        return None;
    }

    if ctx.idle_for_ms() > ctx.idle_timeout_ms {
        info!(
            "ACTIVE: no interaction for {} ms -> idle",
            ctx.idle_for_ms()
        );
        return Some(StateId::Idle);
    }

    ctx.backlight_lit = true;
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state: backlight off until the next interaction
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    ctx.backlight_lit = false;
    debug!("IDLE: backlight off");
}

fn idle_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.interaction {
        ctx.interaction = false;
        return Some(StateId::Active);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  BUSY state: feeder motor running
// ═══════════════════════════════════════════════════════════════════════════

fn busy_enter(ctx: &mut FsmContext) {
    ctx.backlight_lit = true;
    info!("BUSY: feeder running");
}

fn busy_exit(ctx: &mut FsmContext) {
    // The idle countdown restarts from the end of the motion.
    ctx.last_interaction_ms = ctx.now_ms;
    info!("BUSY: feeder stopped");
}

fn busy_update(ctx: &mut FsmContext) -> Option<StateId> {
    // Interactions are absorbed; the motion end stamps its own.
    ctx.interaction = false;
    if ctx.motion_running {
        return None;
    }
    Some(StateId::Active)
}
