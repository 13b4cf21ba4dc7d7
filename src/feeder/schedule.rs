//! Daily feeding schedule.
//!
//! Up to [`MAX_FEED_TIMES`] wall-clock slots.  A slot is due while the
//! clock shows its hour and minute.  Once a feed for it has been settled
//! (started, or refused for a reason retrying cannot fix) it is marked
//! fired and stays quiet until the day of month changes.  A slot refused
//! because the motor is busy stays due for the rest of its minute.
//! Without a wall clock nothing fires.
//!
//! ```text
//!  ClockTick ──▶ FeedScheduler::due(now, slots) ──▶ Some(slot) ──▶ feed_now()
//!                FeedScheduler::mark_fired(slot, day) ◀── settled ──┘
//! ```

use core::fmt::Write as _;

use log::info;

use crate::app::ports::WallTime;
use crate::config::{FeedTime, MAX_FEED_TIMES};
use crate::error::ConfigError;

/// "HH:MM" × 4 plus three separators.
pub type ScheduleText = heapless::String<32>;

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct FeedScheduler {
    /// Day of month on which each slot last fired.
    fired_on: [Option<u8>; MAX_FEED_TIMES],
}

impl FeedScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the first slot due at `now` that has not fired today.
    pub fn due(&self, now: WallTime, slots: &[FeedTime; MAX_FEED_TIMES]) -> Option<usize> {
        slots.iter().enumerate().position(|(i, slot)| {
            slot.enabled
                && slot.hour == now.hour
                && slot.minute == now.minute
                && self.fired_on[i] != Some(now.day)
        })
    }

    /// Record that `slot` is settled for `day`.
    pub fn mark_fired(&mut self, slot: usize, day: u8) {
        if let Some(fired) = self.fired_on.get_mut(slot) {
            *fired = Some(day);
            info!("Scheduler: slot {} done for day {}", slot, day);
        }
    }

    /// Forget firing history, e.g. after the schedule was edited.
    pub fn reset(&mut self) {
        self.fired_on = [None; MAX_FEED_TIMES];
    }
}

// ═══════════════════════════════════════════════════════════════
//  Text form ("07:30,18:00")
// ═══════════════════════════════════════════════════════════════

/// Parse the comma-separated schedule text.  An empty string disables all
/// slots.  Slots not listed are disabled.
pub fn parse_schedule(text: &str) -> Result<[FeedTime; MAX_FEED_TIMES], ConfigError> {
    let mut slots = [FeedTime::default(); MAX_FEED_TIMES];
    let text = text.trim();
    if text.is_empty() {
        return Ok(slots);
    }

    let mut count = 0;
    for part in text.split(',') {
        if count == MAX_FEED_TIMES {
            return Err(ConfigError::ValidationFailed("at most 4 feed times"));
        }
        slots[count] = parse_time(part.trim())?;
        count += 1;
    }
    Ok(slots)
}

fn parse_time(s: &str) -> Result<FeedTime, ConfigError> {
    const BAD: ConfigError = ConfigError::ValidationFailed("feed time must be HH:MM");
    let (h, m) = s.split_once(':').ok_or(BAD)?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return Err(BAD);
    }
    let hour: u8 = h.parse().map_err(|_| BAD)?;
    let minute: u8 = m.parse().map_err(|_| BAD)?;
    if hour > 23 || minute > 59 {
        return Err(BAD);
    }
    Ok(FeedTime::at(hour, minute))
}

/// Render enabled slots back to text.
pub fn format_schedule(slots: &[FeedTime; MAX_FEED_TIMES]) -> ScheduleText {
    let mut out = ScheduleText::new();
    for slot in slots.iter().filter(|s| s.enabled) {
        if !out.is_empty() {
            let _ = out.push(',');
        }
        let _ = write!(out, "{:02}:{:02}", slot.hour, slot.minute);
    }
    out
}
