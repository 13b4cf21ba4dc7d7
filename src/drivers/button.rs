//! ISR-debounced usage buttons with short/long press classification.
//!
//! ## Hardware
//!
//! Active-low momentary switches with pull-ups.  Each GPIO fires on any
//! edge; the ISR samples the level and calls [`InputState::on_raw_edge`],
//! which runs the debounce filter and classifies completed presses.  The
//! main loop drains the result once per iteration with
//! [`InputState::drain`].
//!
//! ## Classification
//!
//! | Gesture     | Condition                         | Output          |
//! |-------------|-----------------------------------|-----------------|
//! | Short press | release after < 500 ms held       | `PressKind::Short` |
//! | Long press  | release after >= 500 ms held      | `PressKind::Long`  |
//!
//! Edges closer than 50 ms to the previously accepted edge are bounce and
//! are dropped without touching any state.

use core::cell::Cell;

use critical_section::Mutex;

use crate::activity::ActivityTimer;
use crate::config::{BUTTON_COUNT, DEBOUNCE_MS, LONG_PRESS_MS};

/// Physical usage button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ButtonId {
    Button1 = 0,
    Button2 = 1,
}

impl ButtonId {
    pub const ALL: [ButtonId; BUTTON_COUNT] = [ButtonId::Button1, ButtonId::Button2];

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Device-trigger subtype used in discovery payloads.
    pub const fn subtype(self) -> &'static str {
        match self {
            Self::Button1 => "button_1",
            Self::Button2 => "button_2",
        }
    }
}

/// Classified gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressKind {
    Short,
    Long,
}

impl PressKind {
    /// Device-trigger type used in discovery payloads.
    pub const fn trigger_type(self) -> &'static str {
        match self {
            Self::Short => "button_short_press",
            Self::Long => "button_long_press",
        }
    }
}

/// Per-button state, written from the ISR and drained by the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonChannel {
    /// Last accepted level (`true` = held down).
    pub raw_pressed: bool,
    /// Timestamp of the last accepted edge.
    pub last_debounce_ms: Option<u32>,
    /// Set on an accepted press, cleared on the matching release.
    pub press_start_ms: Option<u32>,
    pub pending_short: bool,
    pub pending_long: bool,
}

impl ButtonChannel {
    pub const fn new() -> Self {
        Self {
            raw_pressed: false,
            last_debounce_ms: None,
            press_start_ms: None,
            pending_short: false,
            pending_long: false,
        }
    }

    /// Debounce and classify one raw transition.  Returns `true` if the edge
    /// was accepted.
    pub fn on_edge(&mut self, pressed: bool, now_ms: u32) -> bool {
        if let Some(last) = self.last_debounce_ms {
            if now_ms.wrapping_sub(last) < DEBOUNCE_MS {
                return false;
            }
        }

        if pressed {
            self.press_start_ms = Some(now_ms);
        } else {
            // A release with no recorded press carries no gesture.
            let Some(start) = self.press_start_ms.take() else {
                return false;
            };
            if now_ms.wrapping_sub(start) >= LONG_PRESS_MS {
                self.pending_long = true;
            } else {
                self.pending_short = true;
            }
        }

        self.raw_pressed = pressed;
        self.last_debounce_ms = Some(now_ms);
        true
    }

    /// Take the pending gesture, clearing both flags.  Long wins.
    pub fn take(&mut self) -> Option<PressKind> {
        let kind = if self.pending_long {
            Some(PressKind::Long)
        } else if self.pending_short {
            Some(PressKind::Short)
        } else {
            None
        };
        self.pending_long = false;
        self.pending_short = false;
        kind
    }
}

/// What an edge did, so the ISR knows whether to light the backlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeOutcome {
    pub accepted: bool,
    pub woke_backlight: bool,
}

/// State shared between the button ISRs and the main loop.
///
/// Created once at boot and handed out as `&'static` to both the ISR
/// registration and the main-loop poller.
pub struct InputState {
    buttons: [Mutex<Cell<ButtonChannel>>; BUTTON_COUNT],
    pub activity: ActivityTimer,
}

impl InputState {
    pub const fn new(now_ms: u32) -> Self {
        Self {
            buttons: [const { Mutex::new(Cell::new(ButtonChannel::new())) }; BUTTON_COUNT],
            activity: ActivityTimer::new(now_ms),
        }
    }

    /// ISR entry point.
    pub fn on_raw_edge(&self, button: ButtonId, pressed: bool, now_ms: u32) -> EdgeOutcome {
        let accepted = critical_section::with(|cs| {
            let cell = self.buttons[button.index()].borrow(cs);
            let mut ch = cell.get();
            let accepted = ch.on_edge(pressed, now_ms);
            cell.set(ch);
            accepted
        });

        let woke_backlight = accepted && self.activity.record_interaction(now_ms);
        EdgeOutcome {
            accepted,
            woke_backlight,
        }
    }

    /// Main-loop poll.  At most one gesture per call.
    pub fn drain(&self, button: ButtonId) -> Option<PressKind> {
        critical_section::with(|cs| {
            let cell = self.buttons[button.index()].borrow(cs);
            let mut ch = cell.get();
            let kind = ch.take();
            cell.set(ch);
            kind
        })
    }

    pub fn snapshot(&self, button: ButtonId) -> ButtonChannel {
        critical_section::with(|cs| self.buttons[button.index()].borrow(cs).get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_press_classified() {
        let input = InputState::new(0);
        assert!(input.on_raw_edge(ButtonId::Button1, true, 1000).accepted);
        assert!(input.on_raw_edge(ButtonId::Button1, false, 1200).accepted);
        assert_eq!(input.drain(ButtonId::Button1), Some(PressKind::Short));
        assert_eq!(input.drain(ButtonId::Button1), None);
    }

    #[test]
    fn long_press_at_threshold() {
        let input = InputState::new(0);
        input.on_raw_edge(ButtonId::Button1, true, 1000);
        input.on_raw_edge(ButtonId::Button1, false, 1000 + LONG_PRESS_MS);
        assert_eq!(input.drain(ButtonId::Button1), Some(PressKind::Long));
    }

    #[test]
    fn just_under_threshold_is_short() {
        let input = InputState::new(0);
        input.on_raw_edge(ButtonId::Button2, true, 1000);
        input.on_raw_edge(ButtonId::Button2, false, 1000 + LONG_PRESS_MS - 1);
        assert_eq!(input.drain(ButtonId::Button2), Some(PressKind::Short));
    }

    #[test]
    fn bounce_inside_window_dropped() {
        let input = InputState::new(0);
        assert!(input.on_raw_edge(ButtonId::Button1, true, 1000).accepted);
        assert!(!input.on_raw_edge(ButtonId::Button1, false, 1010).accepted);
        assert!(!input.on_raw_edge(ButtonId::Button1, true, 1049).accepted);
        // Still considered held from 1000.
        assert!(input.on_raw_edge(ButtonId::Button1, false, 1100).accepted);
        assert_eq!(input.drain(ButtonId::Button1), Some(PressKind::Short));
    }

    #[test]
    fn release_without_press_ignored() {
        let input = InputState::new(0);
        let out = input.on_raw_edge(ButtonId::Button1, false, 500);
        assert!(!out.accepted);
        assert_eq!(input.drain(ButtonId::Button1), None);
    }

    #[test]
    fn buttons_are_independent() {
        let input = InputState::new(0);
        input.on_raw_edge(ButtonId::Button1, true, 1000);
        input.on_raw_edge(ButtonId::Button2, true, 1010);
        input.on_raw_edge(ButtonId::Button2, false, 1100);
        assert_eq!(input.drain(ButtonId::Button1), None);
        assert_eq!(input.drain(ButtonId::Button2), Some(PressKind::Short));
    }

    #[test]
    fn long_wins_when_both_pending() {
        let mut ch = ButtonChannel::new();
        ch.pending_short = true;
        ch.pending_long = true;
        assert_eq!(ch.take(), Some(PressKind::Long));
        assert_eq!(ch.take(), None);
    }

    #[test]
    fn accepted_edge_wakes_dark_backlight() {
        let input = InputState::new(0);
        input.activity.set_lit(false);
        let out = input.on_raw_edge(ButtonId::Button1, true, 2000);
        assert!(out.woke_backlight);
        assert_eq!(input.activity.last_interaction_ms(), 2000);
        let out = input.on_raw_edge(ButtonId::Button1, false, 2100);
        assert!(out.accepted);
        assert!(!out.woke_backlight);
    }

    #[test]
    fn rejected_edge_does_not_touch_activity() {
        let input = InputState::new(0);
        input.on_raw_edge(ButtonId::Button1, true, 1000);
        input.activity.take_interaction();
        input.activity.set_lit(false);
        let out = input.on_raw_edge(ButtonId::Button1, false, 1020);
        assert_eq!(
            out,
            EdgeOutcome {
                accepted: false,
                woke_backlight: false
            }
        );
        assert!(!input.activity.interaction_pending());
    }

    #[test]
    fn timestamps_wrap() {
        let input = InputState::new(0);
        let start = u32::MAX - 100;
        input.on_raw_edge(ButtonId::Button1, true, start);
        input.on_raw_edge(ButtonId::Button1, false, start.wrapping_add(700));
        assert_eq!(input.drain(ButtonId::Button1), Some(PressKind::Long));
    }
}
