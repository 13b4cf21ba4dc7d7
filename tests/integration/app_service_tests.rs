//! Integration tests for the AppService → FSM → actuators pipeline.
//!
//! These run on the host (x86_64) and verify that commands, ticks and
//! clock readings reach the backlight, the stepper and the settings store
//! correctly without any real hardware.

use super::mock_hw::{FrameCapture, HwCall, MemoryStore, MockHardware, RecordingSink};

use hassfeeder::activity::ActivityTimer;
use hassfeeder::app::commands::AppCommand;
use hassfeeder::app::events::AppEvent;
use hassfeeder::app::ports::WallTime;
use hassfeeder::app::service::AppService;
use hassfeeder::config::{FeedTime, IDLE_TIMEOUT_MS, Settings};
use hassfeeder::error::FeedError;
use hassfeeder::fsm::StateId;

struct Rig {
    app: AppService,
    activity: ActivityTimer,
    hw: MockHardware,
    store: MemoryStore,
    sink: RecordingSink,
}

fn rig_with(settings: Settings) -> Rig {
    let activity = ActivityTimer::new(0);
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    let mut app = AppService::new(settings, 0);
    app.start(&activity, &mut hw, &mut sink);
    Rig {
        app,
        activity,
        hw,
        store: MemoryStore::default(),
        sink,
    }
}

fn rig() -> Rig {
    rig_with(Settings::default())
}

fn at(hour: u8, minute: u8, day: u8) -> Option<WallTime> {
    Some(WallTime {
        hour,
        minute,
        second: 0,
        day,
    })
}

impl Rig {
    fn tick(&mut self, now_ms: u32) {
        self.app
            .tick(now_ms, &self.activity, &mut self.hw, &mut self.sink);
    }

    fn command(&mut self, cmd: AppCommand, now_ms: u32) {
        self.app.handle_command(
            cmd,
            now_ms,
            &self.activity,
            &mut self.hw,
            &mut self.store,
            &mut self.sink,
        );
    }

    fn clock(&mut self, wall: Option<WallTime>, now_ms: u32) {
        self.app.tick_clock(
            wall,
            now_ms,
            &self.activity,
            &mut self.hw,
            &mut self.store,
            &mut self.sink,
        );
    }

    fn transitions_to(&self, to: StateId) -> usize {
        self.sink
            .count(|e| matches!(e, AppEvent::StateChanged { to: t, .. } if *t == to))
    }
}

// ── Activity machine ─────────────────────────────────────────

#[test]
fn idle_timeout_fires_exactly_once() {
    let mut r = rig();
    let mut now = 0;
    while now <= IDLE_TIMEOUT_MS + 5_000 {
        r.tick(now);
        now += 50;
    }
    assert_eq!(r.app.state(), StateId::Idle);
    assert_eq!(r.transitions_to(StateId::Idle), 1);
    assert_eq!(r.hw.backlight(), Some(0));
}

#[test]
fn exactly_at_timeout_stays_active() {
    let mut r = rig();
    r.tick(IDLE_TIMEOUT_MS);
    assert_eq!(r.app.state(), StateId::Active);
    r.tick(IDLE_TIMEOUT_MS + 1);
    assert_eq!(r.app.state(), StateId::Idle);
}

#[test]
fn button_interaction_wakes_idle_display() {
    let mut r = rig();
    r.tick(IDLE_TIMEOUT_MS + 1);
    assert_eq!(r.app.state(), StateId::Idle);

    // What the ISR does on an accepted edge.
    assert!(r.activity.record_interaction(20_000));
    r.tick(20_050);
    assert_eq!(r.app.state(), StateId::Active);
    assert_eq!(r.hw.backlight(), Some(128));

    // The new interaction restarts the timeout.
    r.tick(20_000 + IDLE_TIMEOUT_MS);
    assert_eq!(r.app.state(), StateId::Active);
}

#[test]
fn pending_interaction_keeps_light_on() {
    let mut r = rig();
    r.activity.record_interaction(IDLE_TIMEOUT_MS);
    // The tick sees the interaction before it could time out.
    r.tick(IDLE_TIMEOUT_MS + 1);
    assert_eq!(r.app.state(), StateId::Active);
    assert_ne!(r.hw.backlight(), Some(0));
}

#[test]
fn press_stamped_after_tick_time_does_not_idle() {
    let mut r = rig();
    r.tick(5_000);
    // The ISR fires between sampling the uptime and draining the queued
    // ticks, so its stamp is ahead of `now_ms`.
    r.activity.record_interaction(5_003);
    r.tick(5_000);
    r.tick(5_000);
    assert_eq!(r.app.state(), StateId::Active);
    assert_ne!(r.hw.backlight(), Some(0));

    // The countdown runs from the tick that consumed the press.
    r.tick(5_000 + IDLE_TIMEOUT_MS);
    assert_eq!(r.app.state(), StateId::Active);
    r.tick(5_001 + IDLE_TIMEOUT_MS);
    assert_eq!(r.app.state(), StateId::Idle);
}

// ── Feeding ──────────────────────────────────────────────────

#[test]
fn feed_runs_one_motion_and_blocks_repeats() {
    let mut r = rig();
    r.command(AppCommand::FeedNow, 100);
    r.command(AppCommand::FeedNow, 150);

    assert_eq!(r.app.state(), StateId::Busy);
    assert_eq!(r.hw.total_steps(), 4096);
    assert!(r.hw.calls.contains(&HwCall::MaxSpeed(800.0)));
    assert!(r.hw.calls.contains(&HwCall::Acceleration(400.0)));
    assert_eq!(r.app.dispensed_grams_today(), 10);
    assert!(
        r.sink
            .events
            .contains(&AppEvent::FeedRejected(FeedError::Busy))
    );
}

#[test]
fn busy_survives_idle_timeout_then_returns_to_active() {
    let mut r = rig();
    r.command(AppCommand::FeedNow, 0);
    r.tick(IDLE_TIMEOUT_MS + 10_000);
    assert_eq!(r.app.state(), StateId::Busy);
    assert!(r.hw.coils_enabled());

    r.hw.finish_move();
    r.tick(IDLE_TIMEOUT_MS + 10_050);
    assert_eq!(r.app.state(), StateId::Active);
    assert!(!r.hw.coils_enabled(), "coils released after the move");
}

#[test]
fn enforced_cap_refuses_feed() {
    let mut settings = Settings::default();
    settings.device.feeding.enforce_daily_cap = true;
    settings.device.dispensed_grams_today = 55;
    let mut r = rig_with(settings);

    r.command(AppCommand::FeedNow, 0);
    assert_eq!(r.hw.total_steps(), 0);
    assert!(
        r.sink
            .events
            .contains(&AppEvent::FeedRejected(FeedError::DailyCapReached))
    );
}

#[test]
fn advisory_cap_still_feeds() {
    let mut settings = Settings::default();
    settings.device.dispensed_grams_today = 55;
    let mut r = rig_with(settings);

    r.command(AppCommand::FeedNow, 0);
    assert_eq!(r.app.dispensed_grams_today(), 65);
    assert!(r.sink.events.contains(&AppEvent::QuotaChanged(65)));
}

#[test]
fn zero_rotations_is_rejected() {
    let mut r = rig();
    r.command(AppCommand::SetRotationsPerFeeding(0.0), 0);
    r.command(AppCommand::FeedNow, 10);
    assert_eq!(r.app.state(), StateId::Active);
    assert!(
        r.sink
            .events
            .contains(&AppEvent::FeedRejected(FeedError::ZeroSteps))
    );
}

// ── Clock work ───────────────────────────────────────────────

#[test]
fn day_change_clears_quota_and_persists() {
    let mut r = rig();
    r.clock(at(8, 0, 5), 0);
    r.command(AppCommand::FeedNow, 10);
    r.hw.finish_move();
    r.tick(100);
    assert_eq!(r.app.dispensed_grams_today(), 10);

    r.clock(at(8, 1, 5), 1_000);
    assert_eq!(r.app.dispensed_grams_today(), 10);

    r.clock(at(0, 0, 6), 2_000);
    assert_eq!(r.app.dispensed_grams_today(), 0);
    assert_eq!(r.store.last().unwrap().device.dispensed_grams_today, 0);
    assert!(r.sink.events.contains(&AppEvent::QuotaChanged(0)));
}

#[test]
fn missing_clock_skips_everything() {
    let mut settings = Settings::default();
    settings.device.dispensed_grams_today = 30;
    let mut r = rig_with(settings);
    r.clock(None, 0);
    assert_eq!(r.app.dispensed_grams_today(), 30);
    assert!(r.store.saved.is_empty());
}

#[test]
fn schedule_fires_once_per_slot_per_day() {
    let mut r = rig();
    let mut slots = [FeedTime::default(); 4];
    slots[0] = FeedTime::at(7, 30);
    r.command(AppCommand::SetSchedule(slots), 0);

    for second in 0..3 {
        r.clock(
            Some(WallTime {
                hour: 7,
                minute: 30,
                second,
                day: 1,
            }),
            1_000 * u32::from(second),
        );
        r.hw.finish_move();
        r.tick(1_000 * u32::from(second) + 500);
    }
    assert_eq!(r.hw.total_steps(), 4096);

    // Next day, same time.
    r.clock(at(7, 30, 2), 90_000);
    assert_eq!(r.hw.total_steps(), 8192);
}

#[test]
fn scheduled_feed_waits_for_running_manual_feed() {
    let mut r = rig();
    let mut slots = [FeedTime::default(); 4];
    slots[0] = FeedTime::at(7, 30);
    r.command(AppCommand::SetSchedule(slots), 0);

    r.command(AppCommand::FeedNow, 100);
    let wall = |second| {
        Some(WallTime {
            hour: 7,
            minute: 30,
            second,
            day: 1,
        })
    };
    r.clock(wall(0), 1_000);
    assert_eq!(r.hw.total_steps(), 4096, "motor still busy");

    r.hw.finish_move();
    r.tick(1_500);
    r.clock(wall(1), 2_000);
    assert_eq!(r.hw.total_steps(), 8192);

    r.hw.finish_move();
    r.tick(2_500);
    r.clock(wall(2), 3_000);
    assert_eq!(r.hw.total_steps(), 8192);
}

// ── Remote commands ──────────────────────────────────────────

#[test]
fn display_commands_persist_and_echo() {
    let mut r = rig();
    r.command(AppCommand::SetContrast(200), 0);
    r.command(AppCommand::SetBacklightLevel(64), 10);
    r.command(AppCommand::SetBacklightState(false), 20);

    let saved = r.store.last().unwrap().device.display;
    assert_eq!(saved.contrast, 200);
    assert_eq!(saved.backlight_level, 64);
    assert!(!saved.backlight_enabled);

    assert_eq!(r.hw.backlight(), Some(0));

    let mut screen = FrameCapture::default();
    r.app.render(&mut screen);
    assert_eq!(screen.contrast, Some(200));
    assert!(r.sink.events.contains(&AppEvent::BacklightChanged {
        enabled: false,
        level: 64
    }));
}

#[test]
fn invalid_feeding_value_is_not_stored() {
    let mut r = rig();
    r.command(AppCommand::SetGramsPerFeeding(10_000.0), 0);
    assert!(r.store.saved.is_empty());
    assert_eq!(r.app.settings().device.feeding.grams_per_feeding, 10.0);
    assert!(matches!(
        r.sink.events.last(),
        Some(AppEvent::FeedingConfigChanged(f)) if f.grams_per_feeding == 10.0
    ));
}

// ── Rendering ────────────────────────────────────────────────

#[test]
fn render_shows_trend_and_quota() {
    let mut r = rig();
    r.app.on_message(
        "GreenThing/27B529/CO/temperature",
        b"20.0",
        0,
        &mut r.sink,
    );
    r.app.on_message(
        "GreenThing/27B529/CO/temperature",
        b"21.0",
        60_000,
        &mut r.sink,
    );
    r.clock(at(12, 34, 3), 60_000);

    let mut screen = FrameCapture::default();
    r.app.render(&mut screen);
    let frame = screen.drawn.unwrap();
    assert_eq!(frame.line(0), "HASS-Display   12:34");
    assert_eq!(frame.line(1), "CO    21.0 ^ +1.0/m");
    assert_eq!(frame.line(3), "Fed   0/60 g");
    assert_eq!(screen.flushes, 1);
}

#[test]
fn malformed_sensor_payload_keeps_previous_value() {
    let mut r = rig();
    let topic = "GreenThing/27B529/CWU/temperature";
    r.app.on_message(topic, b"45.5", 0, &mut r.sink);
    r.sink.clear();
    r.app.on_message(topic, b"warm", 1_000, &mut r.sink);
    assert!(r.sink.events.is_empty());
    let slot = r.app.sensors().slot_for(topic).unwrap();
    assert_eq!(r.app.sensors().stream(slot).current, 45.5);
}
