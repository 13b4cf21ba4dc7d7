//! Hardware timer module using ESP-IDF's esp_timer API.
//!
//! Creates periodic timers that push events into the lock-free SPSC queue,
//! plus the high-rate stepper timer.  On simulation targets the main loop
//! drives time itself and no timers are created.
//!
//! Timer callbacks execute in the ESP timer task context (not ISR).  All
//! tick timers share that one task, so the queue keeps a single producer.

use crate::drivers::stepper::StepperCore;
use crate::events::{Event, EventQueue};

#[cfg(target_os = "espidf")]
use crate::config::{CLOCK_TICK_MS, CONTROL_TICK_MS, RENDER_TICK_MS, STEPPER_TICK_US};
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::{error, info};

/// Callback argument for a tick timer.  Leaked at boot.
pub struct TickArg {
    pub queue: &'static EventQueue,
    pub event: Event,
}

/// Callback body for the tick timers.
pub fn on_tick(arg: &TickArg) {
    if !arg.queue.push(arg.event) {
        log::trace!("hw_timer: queue full, {:?} dropped", arg.event);
    }
}

/// Handles of the running timers.  The timers run for the life of the
/// firmware; the handles are only kept for inspection.
pub struct Timers {
    #[cfg(target_os = "espidf")]
    handles: heapless::Vec<esp_timer_handle_t, 4>,
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn tick_cb(arg: *mut core::ffi::c_void) {
    // SAFETY: arg is a leaked &'static TickArg.
    on_tick(unsafe { &*(arg as *const TickArg) });
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn stepper_cb(arg: *mut core::ffi::c_void) {
    // SAFETY: arg is the &'static StepperCore passed to start_timers().
    let core = unsafe { &*(arg as *const StepperCore) };
    crate::drivers::stepper::on_timer_tick(core, STEPPER_TICK_US);
}

#[cfg(target_os = "espidf")]
fn start_periodic(
    name: &'static [u8],
    callback: unsafe extern "C" fn(*mut core::ffi::c_void),
    arg: *mut core::ffi::c_void,
    period_us: u64,
) -> Option<esp_timer_handle_t> {
    let args = esp_timer_create_args_t {
        callback: Some(callback),
        arg,
        dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
        name: name.as_ptr() as *const _,
        skip_unhandled_events: true,
    };
    let mut handle: esp_timer_handle_t = core::ptr::null_mut();
    // SAFETY: args and name outlive the call; handle is written on success.
    unsafe {
        let ret = esp_timer_create(&args, &mut handle);
        if ret != ESP_OK {
            error!("hw_timer: create failed (rc={})", ret);
            return None;
        }
        let ret = esp_timer_start_periodic(handle, period_us);
        if ret != ESP_OK {
            error!("hw_timer: start failed (rc={})", ret);
            esp_timer_delete(handle);
            return None;
        }
    }
    Some(handle)
}

/// Start the control, render and clock tick timers and the stepper timer.
#[cfg(target_os = "espidf")]
pub fn start_timers(queue: &'static EventQueue, stepper: &'static StepperCore) -> Timers {
    let mut timers = Timers {
        handles: heapless::Vec::new(),
    };

    let ticks: [(&'static [u8], Event, u32); 3] = [
        (b"control\0", Event::ControlTick, CONTROL_TICK_MS),
        (b"render\0", Event::RenderTick, RENDER_TICK_MS),
        (b"clock\0", Event::ClockTick, CLOCK_TICK_MS),
    ];
    for (name, event, period_ms) in ticks {
        let arg: &'static TickArg = Box::leak(Box::new(TickArg { queue, event }));
        let raw = arg as *const TickArg as *mut core::ffi::c_void;
        if let Some(h) = start_periodic(name, tick_cb, raw, u64::from(period_ms) * 1_000) {
            let _ = timers.handles.push(h);
        }
    }

    let raw = stepper as *const StepperCore as *mut core::ffi::c_void;
    if let Some(h) = start_periodic(b"stepper\0", stepper_cb, raw, u64::from(STEPPER_TICK_US)) {
        let _ = timers.handles.push(h);
    }

    info!(
        "hw_timer: control@{}ms render@{}ms clock@{}ms stepper@{}us ({} running)",
        CONTROL_TICK_MS,
        RENDER_TICK_MS,
        CLOCK_TICK_MS,
        STEPPER_TICK_US,
        timers.handles.len()
    );
    timers
}

#[cfg(not(target_os = "espidf"))]
pub fn start_timers(_queue: &'static EventQueue, _stepper: &'static StepperCore) -> Timers {
    log::info!("hw_timer(sim): timers not started (events driven by the caller)");
    Timers {}
}
