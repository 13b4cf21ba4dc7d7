//! Button path: raw edges through the ISR body, the shared InputState and
//! the main-loop poller, down to device-trigger events.

use super::mock_hw::RecordingSink;

use hassfeeder::app::events::AppEvent;
use hassfeeder::app::service::AppService;
use hassfeeder::config::{DEBOUNCE_MS, LONG_PRESS_MS, Settings};
use hassfeeder::drivers::button::{ButtonId, InputState, PressKind};
use hassfeeder::drivers::hw_init::{ButtonIsrArg, on_button_edge};

fn triggers(sink: &RecordingSink) -> Vec<(ButtonId, PressKind)> {
    sink.events
        .iter()
        .filter_map(|e| match e {
            AppEvent::DeviceTrigger { button, kind } => Some((*button, *kind)),
            _ => None,
        })
        .collect()
}

/// Active-low: a press drives the pin low.
fn press(arg: &ButtonIsrArg, now_ms: u32) {
    on_button_edge(arg, false, now_ms);
}

fn release(arg: &ButtonIsrArg, now_ms: u32) {
    on_button_edge(arg, true, now_ms);
}

#[test]
fn short_and_long_presses_become_triggers() {
    static INPUT: InputState = InputState::new(0);
    let b1 = ButtonIsrArg {
        input: &INPUT,
        button: ButtonId::Button1,
    };
    let b2 = ButtonIsrArg {
        input: &INPUT,
        button: ButtonId::Button2,
    };
    let mut app = AppService::new(Settings::default(), 0);
    let mut sink = RecordingSink::new();

    press(&b1, 1_000);
    release(&b1, 1_200);
    press(&b2, 2_000);
    release(&b2, 2_000 + LONG_PRESS_MS);
    app.poll_input(&INPUT, &mut sink);

    assert_eq!(
        triggers(&sink),
        vec![
            (ButtonId::Button1, PressKind::Short),
            (ButtonId::Button2, PressKind::Long)
        ]
    );

    // Drained: a second poll publishes nothing.
    sink.clear();
    app.poll_input(&INPUT, &mut sink);
    assert!(triggers(&sink).is_empty());
}

#[test]
fn contact_bounce_yields_one_gesture() {
    static INPUT: InputState = InputState::new(0);
    let b1 = ButtonIsrArg {
        input: &INPUT,
        button: ButtonId::Button1,
    };
    let mut app = AppService::new(Settings::default(), 0);
    let mut sink = RecordingSink::new();

    press(&b1, 5_000);
    // Chatter inside the debounce window.
    for t in 1..DEBOUNCE_MS {
        if t % 2 == 1 {
            release(&b1, 5_000 + t);
        } else {
            press(&b1, 5_000 + t);
        }
    }
    release(&b1, 5_300);
    app.poll_input(&INPUT, &mut sink);

    assert_eq!(triggers(&sink), vec![(ButtonId::Button1, PressKind::Short)]);
}

#[test]
fn accepted_edge_records_interaction() {
    static INPUT: InputState = InputState::new(0);
    let b2 = ButtonIsrArg {
        input: &INPUT,
        button: ButtonId::Button2,
    };
    INPUT.activity.set_lit(false);
    press(&b2, 42_000);
    assert!(INPUT.activity.is_lit(), "ISR lights the panel");
    assert_eq!(INPUT.activity.take_interaction(), Some(42_000));
    assert_eq!(INPUT.activity.take_interaction(), None);
}
