//! One-shot hardware peripheral initialization.
//!
//! Configures GPIO directions, the backlight LEDC timer/channel and the
//! button interrupts using raw ESP-IDF sys calls.  Called once from
//! `main()` before the event loop starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::drivers::button::InputState;
#[cfg(target_os = "espidf")]
use crate::drivers::button::ButtonId;
#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before event loop; single-threaded.
    unsafe {
        init_gpio_inputs()?;
        init_gpio_outputs()?;
        init_ledc()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    for &pin in &pins::BUTTON_GPIOS {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }

    info!("hw_init: button inputs configured");
    Ok(())
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    for &pin in &pins::STEPPER_COIL_GPIOS {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: stepper coil outputs configured");
    Ok(())
}

/// Latch a coil pattern (IN1 = bit 0).  Safe from the timer callback.
#[cfg(target_os = "espidf")]
pub fn write_coils(pattern: u8) {
    for (bit, &pin) in pins::STEPPER_COIL_GPIOS.iter().enumerate() {
        // SAFETY: output pins configured in init_gpio_outputs(); the level
        // register write is ISR-safe.
        unsafe { gpio_set_level(pin, u32::from((pattern >> bit) & 1)) };
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn write_coils(pattern: u8) {
    SIM_COILS.store(pattern, core::sync::atomic::Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
static SIM_COILS: core::sync::atomic::AtomicU8 = core::sync::atomic::AtomicU8::new(0);

/// Simulation: last latched coil pattern.
#[cfg(not(target_os = "espidf"))]
pub fn sim_coils() -> u8 {
    SIM_COILS.load(core::sync::atomic::Ordering::Relaxed)
}

// ── LEDC PWM ─────────────────────────────────────────────────

pub const LEDC_CH_BACKLIGHT: u32 = 0;

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    // Timer 0: backlight (5 kHz, 8-bit)
    let timer0 = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
        freq_hz: pins::BACKLIGHT_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer0) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    let ret = unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: LEDC_CH_BACKLIGHT,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: pins::BACKLIGHT_GPIO,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        })
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    info!(
        "hw_init: LEDC configured (backlight=CH0, {} bit)",
        pins::PWM_RESOLUTION_BITS
    );
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u8) {
    // SAFETY: LEDC channel configured in init_ledc().  The main loop and
    // the button ISR both write here; each call is a complete duty update.
    unsafe {
        ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, duty as u32);
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(_channel: u32, _duty: u8) {}

// ── Button ISRs ───────────────────────────────────────────────

/// Handed to each button ISR as its argument.  Leaked at boot.
pub struct ButtonIsrArg {
    pub input: &'static InputState,
    pub button: crate::drivers::button::ButtonId,
}

/// ISR body, split out so it can run on the host.
///
/// Buttons are active-low.  An accepted edge that finds the backlight
/// dark lights it at the wake level straight away.
pub fn on_button_edge(arg: &ButtonIsrArg, level_high: bool, now_ms: u32) {
    let outcome = arg.input.on_raw_edge(arg.button, !level_high, now_ms);
    if outcome.woke_backlight {
        ledc_set(LEDC_CH_BACKLIGHT, arg.input.activity.wake_level());
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn button_gpio_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: arg is the leaked &'static ButtonIsrArg registered below.
    let arg = unsafe { &*(arg as *const ButtonIsrArg) };
    let pin = pins::BUTTON_GPIOS[arg.button.index()];
    // SAFETY: register reads; safe in ISR context.
    let high = unsafe { gpio_get_level(pin) } != 0;
    let now_ms = (unsafe { esp_timer_get_time() } / 1_000) as u32;
    on_button_edge(arg, high, now_ms);
}

/// Install per-pin GPIO ISR service and register the button handlers.
/// Call after init_peripherals() and before the event loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service(input: &'static InputState) -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed.  Each handler argument is leaked and
    // lives for the rest of the program.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        for button in ButtonId::ALL {
            let pin = pins::BUTTON_GPIOS[button.index()];
            let arg: &'static ButtonIsrArg = Box::leak(Box::new(ButtonIsrArg { input, button }));
            gpio_set_intr_type(pin, gpio_int_type_t_GPIO_INTR_ANYEDGE);
            let ret = gpio_isr_handler_add(
                pin,
                Some(button_gpio_isr),
                arg as *const ButtonIsrArg as *mut core::ffi::c_void,
            );
            if ret != ESP_OK {
                return Err(HwInitError::IsrInstallFailed(ret));
            }
            gpio_intr_enable(pin);
        }

        info!("hw_init: ISR service installed (buttons x{})", ButtonId::ALL.len());
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service(_input: &'static InputState) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::button::{ButtonId, PressKind};

    #[test]
    fn active_low_edges_classify() {
        static INPUT: InputState = InputState::new(0);
        let arg = ButtonIsrArg {
            input: &INPUT,
            button: ButtonId::Button2,
        };
        on_button_edge(&arg, false, 1_000);
        on_button_edge(&arg, true, 1_100);
        assert_eq!(INPUT.drain(ButtonId::Button2), Some(PressKind::Short));
        assert_eq!(INPUT.drain(ButtonId::Button1), None);
    }
}
