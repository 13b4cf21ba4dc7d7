//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the settings, the activity FSM, the feed
//! orchestrator and the sensor hub.  It exposes a hardware-agnostic API;
//! all I/O flows through port traits injected at call sites, making the
//! entire service testable with mock adapters.
//!
//! ```text
//!  InputState ──▶ ┌────────────────────────────┐ ──▶ EventSink
//!  ClockPort  ──▶ │         AppService         │
//!  AppCommand ──▶ │ FSM · Feeder · Sensors     │ ──▶ ActuatorPort / MotionPort
//!  sensor msg ──▶ │ Settings (single owner)    │ ──▶ SettingsPort
//!                 └────────────────────────────┘ ──▶ DisplayPort
//! ```
//!
//! Settings are persisted immediately after every accepted mutation.

use log::{debug, info, warn};

use crate::activity::ActivityTimer;
use crate::config::{IDLE_TIMEOUT_MS, Settings};
use crate::drivers::button::{ButtonId, InputState};
use crate::error::FeedError;
use crate::feeder::FeedOrchestrator;
use crate::feeder::quota::RolloverOutcome;
use crate::fsm::context::FsmContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::sensors::SensorHub;
use crate::ui::{self, StatusView};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{ActuatorPort, DisplayPort, EventSink, MotionPort, SettingsPort, WallTime};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService {
    settings: Settings,
    fsm: Fsm,
    ctx: FsmContext,
    feeder: FeedOrchestrator,
    sensors: SensorHub,
    /// Last backlight level written to the hardware.
    applied_backlight: Option<u8>,
    /// Lit flag as last published to the ISR side.
    published_lit: bool,
    /// Contrast last written to the panel.
    applied_contrast: Option<u8>,
    last_clock: Option<WallTime>,
}

impl AppService {
    /// Construct the service from loaded settings.
    ///
    /// Does **not** start the FSM: call [`start`](Self::start) next.
    pub fn new(settings: Settings, now_ms: u32) -> Self {
        let feeder = FeedOrchestrator::new(settings.device.dispensed_grams_today);
        Self {
            settings,
            fsm: Fsm::new(build_state_table(), StateId::Active),
            ctx: FsmContext::new(now_ms, IDLE_TIMEOUT_MS),
            feeder,
            sensors: SensorHub::default(),
            applied_backlight: None,
            published_lit: true,
            applied_contrast: None,
            last_clock: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM, apply the stored backlight settings and announce the
    /// initial state of every entity.
    pub fn start(
        &mut self,
        activity: &ActivityTimer,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        self.fsm.start(&mut self.ctx);
        self.apply_backlight(activity, hw);

        sink.emit(&self.snapshot());
        info!("AppService started in {:?}", self.fsm.current_state());
    }

    // ── Per-iteration work ────────────────────────────────────

    /// Drain every button's classifier and publish device triggers.
    pub fn poll_input(&mut self, input: &InputState, sink: &mut impl EventSink) {
        for button in ButtonId::ALL {
            if let Some(kind) = input.drain(button) {
                info!("BUTTON | {:?} {:?}", button, kind);
                sink.emit(&AppEvent::DeviceTrigger { button, kind });
            }
        }
    }

    /// Advance the activity machine and drive the backlight.
    ///
    /// The `hw` parameter satisfies **both** [`ActuatorPort`] and
    /// [`MotionPort`], avoiding a double mutable borrow while keeping the
    /// port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u32,
        activity: &ActivityTimer,
        hw: &mut (impl ActuatorPort + MotionPort),
        sink: &mut impl EventSink,
    ) {
        let prev = self.fsm.current_state();

        self.ctx.now_ms = now_ms;
        self.ctx.motion_running = hw.is_running();
        if let Some(stamp) = activity.take_interaction() {
            self.ctx.interaction = true;
            // The ISR may stamp after the caller sampled `now_ms`.
            self.ctx.last_interaction_ms = if now_ms.wrapping_sub(stamp) > u32::MAX / 2 {
                now_ms
            } else {
                stamp
            };
        }

        self.fsm.tick(&mut self.ctx);

        let next = self.fsm.current_state();
        if prev == StateId::Busy && next != StateId::Busy {
            // Move finished: release the coils.
            hw.enable(false);
        }
        self.emit_transition(prev, sink);
        self.apply_backlight(activity, hw);
    }

    /// Wall-clock work: day rollover and the feeding schedule.  Skipped
    /// entirely while the clock is unavailable.
    pub fn tick_clock(
        &mut self,
        wall: Option<WallTime>,
        now_ms: u32,
        activity: &ActivityTimer,
        hw: &mut (impl ActuatorPort + MotionPort),
        store: &mut impl SettingsPort,
        sink: &mut impl EventSink,
    ) {
        self.last_clock = wall;
        let Some(now) = wall else {
            return;
        };

        if self.feeder.check_rollover(now.day) == RolloverOutcome::Reset {
            self.settings.device.dispensed_grams_today = 0;
            self.persist(store);
            sink.emit(&AppEvent::QuotaChanged(0));
        }

        let feeding = self.settings.device.feeding;
        if let Some(slot) = self.feeder.scheduled_slot(now, &feeding) {
            match self.feed(now_ms, activity, hw, store, sink) {
                // Retried on the next clock tick while the minute lasts.
                Err(FeedError::Busy) => {}
                _ => self.feeder.slot_settled(slot, now.day),
            }
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply a remote command.  Every command counts as an interaction.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now_ms: u32,
        activity: &ActivityTimer,
        hw: &mut (impl ActuatorPort + MotionPort),
        store: &mut impl SettingsPort,
        sink: &mut impl EventSink,
    ) {
        self.note_interaction(now_ms, sink);

        match cmd {
            AppCommand::SetBacklightState(on) => {
                self.settings.device.display.backlight_enabled = on;
                self.backlight_changed(store, sink);
            }
            AppCommand::SetBacklightLevel(level) => {
                self.settings.device.display.backlight_level = level;
                self.backlight_changed(store, sink);
            }
            AppCommand::SetContrast(contrast) => {
                // Reaches the panel on the next render.
                self.settings.device.display.contrast = contrast;
                self.persist(store);
                sink.emit(&AppEvent::ContrastChanged(contrast));
            }
            AppCommand::SetRotationsPerFeeding(_)
            | AppCommand::SetGramsPerFeeding(_)
            | AppCommand::SetMaxGramsPerDay(_)
            | AppCommand::SetSchedule(_) => {
                self.update_feeding(cmd, store, sink);
            }
            AppCommand::FeedNow => {
                let _ = self.feed(now_ms, activity, hw, store, sink);
            }
        }

        self.apply_backlight(activity, hw);
    }

    /// Route an inbound message on a sensor topic.
    pub fn on_message(
        &mut self,
        topic: &str,
        payload: &[u8],
        now_ms: u32,
        sink: &mut impl EventSink,
    ) {
        if let Some(slot) = self.sensors.on_message(topic, payload, now_ms) {
            let stream = self.sensors.stream(slot);
            sink.emit(&AppEvent::SensorUpdated {
                slot,
                value: stream.current,
                rate_per_minute: stream.rate_per_minute,
            });
        }
    }

    /// Compose and push one frame, applying a changed contrast first.
    pub fn render(&mut self, display: &mut impl DisplayPort) {
        let contrast = self.settings.device.display.contrast;
        if self.applied_contrast != Some(contrast) {
            debug!("DISPLAY | contrast {contrast}");
            display.set_contrast(contrast);
            self.applied_contrast = Some(contrast);
        }

        let frame = ui::compose(
            &self.sensors,
            &StatusView {
                state: self.fsm.current_state(),
                clock: self.last_clock,
                dispensed_grams_today: self.feeder.quota().dispensed_grams_today(),
                max_grams_per_day: self.settings.device.feeding.max_grams_per_day,
            },
        );
        display.draw(&frame);
        display.flush();
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sensors(&self) -> &SensorHub {
        &self.sensors
    }

    pub fn dispensed_grams_today(&self) -> u32 {
        self.feeder.quota().dispensed_grams_today()
    }

    /// Full entity state, as announced at start.  Republished whenever
    /// Home Assistant or the broker connection comes back.
    pub fn snapshot(&self) -> AppEvent {
        AppEvent::Started {
            state: self.fsm.current_state(),
            display: self.settings.device.display,
            feeding: self.settings.device.feeding,
            dispensed_grams_today: self.feeder.quota().dispensed_grams_today(),
        }
    }

    /// Republish every entity so a hub that optimistically showed a
    /// rejected value reverts to the real one.
    pub fn echo_state(&self, sink: &mut impl EventSink) {
        sink.emit(&self.snapshot());
    }

    // ── Internal ──────────────────────────────────────────────

    fn feed(
        &mut self,
        now_ms: u32,
        activity: &ActivityTimer,
        hw: &mut (impl ActuatorPort + MotionPort),
        store: &mut impl SettingsPort,
        sink: &mut impl EventSink,
    ) -> Result<(), FeedError> {
        let busy = self.fsm.current_state() == StateId::Busy;
        let feeding = self.settings.device.feeding;
        let motion = self.settings.device.motion;

        match self.feeder.feed_now(&feeding, &motion, busy, hw) {
            Ok(outcome) => {
                let prev = self.fsm.current_state();
                self.ctx.now_ms = now_ms;
                self.ctx.motion_running = true;
                self.fsm.force_transition(StateId::Busy, &mut self.ctx);
                self.emit_transition(prev, sink);

                self.settings.device.dispensed_grams_today = outcome.total_grams_today;
                self.persist(store);

                sink.emit(&AppEvent::FeedStarted {
                    steps: outcome.steps,
                    grams: outcome.grams_added,
                });
                sink.emit(&AppEvent::QuotaChanged(outcome.total_grams_today));
                self.apply_backlight(activity, hw);
                Ok(())
            }
            Err(e) => {
                sink.emit(&AppEvent::FeedRejected(e));
                Err(e)
            }
        }
    }

    fn update_feeding(
        &mut self,
        cmd: AppCommand,
        store: &mut impl SettingsPort,
        sink: &mut impl EventSink,
    ) {
        let mut candidate = self.settings.device.feeding;
        match cmd {
            AppCommand::SetRotationsPerFeeding(v) => candidate.rotations_per_feeding = v,
            AppCommand::SetGramsPerFeeding(v) => candidate.grams_per_feeding = v,
            AppCommand::SetMaxGramsPerDay(v) => candidate.max_grams_per_day = v,
            AppCommand::SetSchedule(slots) => candidate.schedule = slots,
            _ => return,
        }

        match candidate.validate() {
            Ok(()) => {
                if candidate.schedule != self.settings.device.feeding.schedule {
                    self.feeder.schedule_changed();
                }
                self.settings.device.feeding = candidate;
                self.persist(store);
            }
            Err(e) => warn!("FEED | command rejected: {e}"),
        }
        // Always echo so the hub reverts rejected values.
        sink.emit(&AppEvent::FeedingConfigChanged(self.settings.device.feeding));
    }

    fn backlight_changed(&mut self, store: &mut impl SettingsPort, sink: &mut impl EventSink) {
        self.persist(store);
        let display = self.settings.device.display;
        sink.emit(&AppEvent::BacklightChanged {
            enabled: display.backlight_enabled,
            level: display.backlight_level,
        });
    }

    /// Remote commands count as interactions: refresh the idle deadline and
    /// wake the display unless a feed is running.
    fn note_interaction(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        self.ctx.now_ms = now_ms;
        self.ctx.last_interaction_ms = now_ms;
        if self.fsm.current_state() == StateId::Idle {
            self.fsm.force_transition(StateId::Active, &mut self.ctx);
            self.emit_transition(StateId::Idle, sink);
        }
    }

    fn emit_transition(&self, prev: StateId, sink: &mut impl EventSink) {
        let now = self.fsm.current_state();
        if now != prev {
            sink.emit(&AppEvent::StateChanged { from: prev, to: now });
        }
    }

    /// Drive the backlight from the FSM output and the user's light entity.
    ///
    /// The button ISR may have lit the panel since the last call; in that
    /// case the cached level is stale and the output is rewritten.  While
    /// an interaction is still pending the light is never switched off,
    /// the next tick will move the FSM to ACTIVE.
    fn apply_backlight(&mut self, activity: &ActivityTimer, hw: &mut impl ActuatorPort) {
        let display = self.settings.device.display;
        let lit = self.ctx.backlight_lit || activity.interaction_pending();

        if !self.published_lit && activity.is_lit() {
            self.applied_backlight = None;
        }

        let level = if lit && display.backlight_enabled {
            display.backlight_level
        } else {
            0
        };

        activity.set_wake_level(if display.backlight_enabled {
            display.backlight_level
        } else {
            0
        });
        activity.set_lit(lit);
        self.published_lit = lit;

        if self.applied_backlight != Some(level) {
            debug!("BACKLIGHT | level {level}");
            hw.set_backlight(level);
            self.applied_backlight = Some(level);
        }
    }

    fn persist(&self, store: &mut impl SettingsPort) {
        if let Err(e) = store.save(&self.settings) {
            warn!("Settings save failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::ConfigError;
    use crate::error::FeedError;
    use crate::ui::Frame;

    #[derive(Default)]
    struct Hw {
        backlight: Vec<u8>,
        running: bool,
        enabled: bool,
        moved: i64,
    }

    impl ActuatorPort for Hw {
        fn set_backlight(&mut self, level: u8) {
            self.backlight.push(level);
        }
    }

    impl MotionPort for Hw {
        fn enable(&mut self, on: bool) {
            self.enabled = on;
        }
        fn move_relative(&mut self, steps: i32) {
            self.moved += i64::from(steps);
            self.running = true;
        }
        fn is_running(&self) -> bool {
            self.running
        }
        fn set_max_speed(&mut self, _: f32) {}
        fn set_acceleration(&mut self, _: f32) {}
    }

    #[derive(Default)]
    struct Store {
        saved: Vec<Settings>,
    }

    impl SettingsPort for Store {
        fn load(&mut self) -> Result<Settings, ConfigError> {
            Ok(self.saved.last().cloned().unwrap_or_default())
        }
        fn save(&mut self, settings: &Settings) -> Result<(), ConfigError> {
            settings.validate()?;
            self.saved.push(settings.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Sink(Vec<AppEvent>);

    impl EventSink for Sink {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(*event);
        }
    }

    #[derive(Default)]
    struct Screen(Vec<Frame>, u32, Vec<u8>);

    impl DisplayPort for Screen {
        fn draw(&mut self, frame: &Frame) {
            self.0.push(frame.clone());
        }
        fn flush(&mut self) {
            self.1 += 1;
        }
        fn set_contrast(&mut self, contrast: u8) {
            self.2.push(contrast);
        }
    }

    fn started() -> (AppService, ActivityTimer, Hw, Store, Sink) {
        let activity = ActivityTimer::new(0);
        let mut hw = Hw::default();
        let mut sink = Sink::default();
        let mut app = AppService::new(Settings::default(), 0);
        app.start(&activity, &mut hw, &mut sink);
        (app, activity, hw, Store::default(), sink)
    }

    #[test]
    fn start_applies_display_settings() {
        let (app, _, hw, _, sink) = started();
        assert_eq!(app.state(), StateId::Active);
        assert_eq!(hw.backlight, vec![128]);
        assert!(matches!(sink.0[0], AppEvent::Started { .. }));
    }

    #[test]
    fn idle_timeout_turns_backlight_off() {
        let (mut app, activity, mut hw, _, mut sink) = started();
        app.tick(IDLE_TIMEOUT_MS + 1, &activity, &mut hw, &mut sink);
        assert_eq!(app.state(), StateId::Idle);
        assert_eq!(hw.backlight.last(), Some(&0));
        assert!(!activity.is_lit());
    }

    #[test]
    fn feed_now_enters_busy_and_persists() {
        let (mut app, activity, mut hw, mut store, mut sink) = started();
        app.handle_command(AppCommand::FeedNow, 100, &activity, &mut hw, &mut store, &mut sink);
        assert_eq!(app.state(), StateId::Busy);
        assert_eq!(hw.moved, 4096);
        assert_eq!(app.dispensed_grams_today(), 10);
        assert_eq!(store.saved.last().unwrap().device.dispensed_grams_today, 10);

        app.handle_command(AppCommand::FeedNow, 200, &activity, &mut hw, &mut store, &mut sink);
        assert_eq!(hw.moved, 4096);
        assert!(sink.0.contains(&AppEvent::FeedRejected(FeedError::Busy)));
    }

    #[test]
    fn busy_ends_when_motion_stops() {
        let (mut app, activity, mut hw, mut store, mut sink) = started();
        app.handle_command(AppCommand::FeedNow, 100, &activity, &mut hw, &mut store, &mut sink);
        app.tick(50_000, &activity, &mut hw, &mut sink);
        assert_eq!(app.state(), StateId::Busy);
        hw.running = false;
        app.tick(60_000, &activity, &mut hw, &mut sink);
        assert_eq!(app.state(), StateId::Active);
        assert!(!hw.enabled, "coils released");
        app.tick(60_000 + IDLE_TIMEOUT_MS, &activity, &mut hw, &mut sink);
        assert_eq!(app.state(), StateId::Active);
    }

    #[test]
    fn command_wakes_idle_display() {
        let (mut app, activity, mut hw, mut store, mut sink) = started();
        app.tick(IDLE_TIMEOUT_MS + 1, &activity, &mut hw, &mut sink);
        assert_eq!(app.state(), StateId::Idle);
        app.handle_command(
            AppCommand::SetContrast(90),
            20_000,
            &activity,
            &mut hw,
            &mut store,
            &mut sink,
        );
        assert_eq!(app.state(), StateId::Active);
        assert_eq!(hw.backlight.last(), Some(&128));
        assert_eq!(store.saved.last().unwrap().device.display.contrast, 90);
    }

    #[test]
    fn contrast_reaches_panel_once_per_change() {
        let (mut app, activity, mut hw, mut store, mut sink) = started();
        let mut screen = Screen::default();
        app.render(&mut screen);
        app.render(&mut screen);
        assert_eq!(screen.2, vec![128]);

        app.handle_command(
            AppCommand::SetContrast(40),
            100,
            &activity,
            &mut hw,
            &mut store,
            &mut sink,
        );
        app.render(&mut screen);
        assert_eq!(screen.2, vec![128, 40]);
    }

    #[test]
    fn rejected_feeding_value_is_echoed_unchanged() {
        let (mut app, activity, mut hw, mut store, mut sink) = started();
        app.handle_command(
            AppCommand::SetRotationsPerFeeding(99.0),
            10,
            &activity,
            &mut hw,
            &mut store,
            &mut sink,
        );
        assert!(store.saved.is_empty());
        assert_eq!(
            sink.0.last(),
            Some(&AppEvent::FeedingConfigChanged(app.settings().device.feeding))
        );
        assert_eq!(app.settings().device.feeding.rotations_per_feeding, 1.0);
    }

    #[test]
    fn backlight_switch_off_keeps_level() {
        let (mut app, activity, mut hw, mut store, mut sink) = started();
        app.handle_command(
            AppCommand::SetBacklightState(false),
            10,
            &activity,
            &mut hw,
            &mut store,
            &mut sink,
        );
        assert_eq!(hw.backlight.last(), Some(&0));
        assert_eq!(app.settings().device.display.backlight_level, 128);
        assert_eq!(activity.wake_level(), 0);
    }

    #[test]
    fn rollover_resets_and_persists() {
        let (mut app, activity, mut hw, mut store, mut sink) = started();
        app.handle_command(AppCommand::FeedNow, 0, &activity, &mut hw, &mut store, &mut sink);
        hw.running = false;
        let day = |d| {
            Some(WallTime {
                hour: 9,
                minute: 0,
                second: 0,
                day: d,
            })
        };
        app.tick_clock(day(5), 0, &activity, &mut hw, &mut store, &mut sink);
        assert_eq!(app.dispensed_grams_today(), 10);
        app.tick_clock(day(6), 0, &activity, &mut hw, &mut store, &mut sink);
        assert_eq!(app.dispensed_grams_today(), 0);
        assert_eq!(store.saved.last().unwrap().device.dispensed_grams_today, 0);
        assert_eq!(sink.0.last(), Some(&AppEvent::QuotaChanged(0)));
    }

    #[test]
    fn no_clock_no_rollover() {
        let (mut app, activity, mut hw, mut store, mut sink) = started();
        let before = sink.0.len();
        app.tick_clock(None, 0, &activity, &mut hw, &mut store, &mut sink);
        assert_eq!(sink.0.len(), before);
        assert!(store.saved.is_empty());
    }

    #[test]
    fn sensor_message_updates_frame() {
        let (mut app, _, _, _, mut sink) = started();
        app.on_message("GreenThing/27B529/CWU/temperature", b"48.25", 0, &mut sink);
        let mut screen = Screen::default();
        app.render(&mut screen);
        assert_eq!(screen.1, 1);
        assert!(screen.0[0].line(2).contains("48.2") || screen.0[0].line(2).contains("48.3"));
    }
}
