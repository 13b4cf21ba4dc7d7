//! Mock hardware adapter for integration tests.
//!
//! Records every actuator and motion call so tests can assert on the full
//! command history without touching real GPIO/PWM registers.

use hassfeeder::app::events::AppEvent;
use hassfeeder::app::ports::{
    ActuatorPort, ConfigError, DisplayPort, EventSink, MotionPort, SettingsPort, StorageError,
    StoragePort,
};
use hassfeeder::config::Settings;
use hassfeeder::ui::Frame;
use std::collections::HashMap;

// ── Hardware call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HwCall {
    Backlight(u8),
    Enable(bool),
    Move(i32),
    MaxSpeed(f32),
    Acceleration(f32),
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub calls: Vec<HwCall>,
    /// What `is_running()` reports.  Set by `move_relative`, cleared by
    /// the test to simulate the move finishing.
    pub running: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            running: false,
        }
    }

    pub fn backlight(&self) -> Option<u8> {
        self.calls.iter().rev().find_map(|c| match c {
            HwCall::Backlight(level) => Some(*level),
            _ => None,
        })
    }

    pub fn total_steps(&self) -> i64 {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HwCall::Move(steps) => Some(i64::from(*steps)),
                _ => None,
            })
            .sum()
    }

    pub fn coils_enabled(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                HwCall::Enable(on) => Some(*on),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn finish_move(&mut self) {
        self.running = false;
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorPort for MockHardware {
    fn set_backlight(&mut self, level: u8) {
        self.calls.push(HwCall::Backlight(level));
    }
}

impl MotionPort for MockHardware {
    fn enable(&mut self, on: bool) {
        self.calls.push(HwCall::Enable(on));
    }

    fn move_relative(&mut self, steps: i32) {
        self.calls.push(HwCall::Move(steps));
        self.running = true;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_max_speed(&mut self, steps_per_sec: f32) {
        self.calls.push(HwCall::MaxSpeed(steps_per_sec));
    }

    fn set_acceleration(&mut self, steps_per_sec2: f32) {
        self.calls.push(HwCall::Acceleration(steps_per_sec2));
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    pub fail_writes: bool,
    pub fail_reads: bool,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self {
            store: HashMap::new(),
            fail_writes: false,
            fail_reads: false,
        }
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<&[u8]> {
        self.store
            .get(&format!("{}::{}", namespace, key))
            .map(Vec::as_slice)
    }
}

impl Default for MockNvs {
    fn default() -> Self {
        Self::new()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        if self.fail_reads {
            return Err(StorageError::IoError);
        }
        match self.store.get(&format!("{}::{}", namespace, key)) {
            Some(v) if v.len() > buf.len() => Err(StorageError::BufferTooSmall),
            Some(v) => {
                buf[..v.len()].copy_from_slice(v);
                Ok(v.len())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn stored_len(&self, namespace: &str, key: &str) -> Result<usize, StorageError> {
        self.store
            .get(&format!("{}::{}", namespace, key))
            .map(Vec::len)
            .ok_or(StorageError::NotFound)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.store
            .insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", namespace, key))
    }
}

// ── MemoryStore (SettingsPort) ────────────────────────────────

/// Keeps every saved record so tests can check what was persisted when.
#[derive(Default)]
pub struct MemoryStore {
    pub saved: Vec<Settings>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn last(&self) -> Option<&Settings> {
        self.saved.last()
    }
}

impl SettingsPort for MemoryStore {
    fn load(&mut self) -> Result<Settings, ConfigError> {
        Ok(self.saved.last().cloned().unwrap_or_default())
    }

    fn save(&mut self, settings: &Settings) -> Result<(), ConfigError> {
        settings.validate()?;
        self.saved.push(settings.clone());
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}

// ── FrameCapture ──────────────────────────────────────────────

#[derive(Default)]
pub struct FrameCapture {
    pub drawn: Option<Frame>,
    pub flushes: u32,
    pub contrast: Option<u8>,
}

impl DisplayPort for FrameCapture {
    fn draw(&mut self, frame: &Frame) {
        self.drawn = Some(frame.clone());
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }

    fn set_contrast(&mut self, contrast: u8) {
        self.contrast = Some(contrast);
    }
}
