//! Feeding: step computation, motor hand-off and the daily quota.
//!
//! ```text
//!   FeedNow command ─┐
//!   schedule slot ───┴─▶ FeedOrchestrator::feed_now()
//!                           │ steps = trunc(steps_per_rev × rotations)
//!                           ├─▶ MotionPort: speed, accel, enable, move
//!                           └─▶ DailyQuota::add(round(grams))
//! ```
//!
//! The caller (the app service) switches the activity machine to BUSY and
//! persists the new total; the orchestrator itself owns no I/O.

pub mod quota;
pub mod schedule;

use log::{info, warn};

use crate::app::ports::{MotionPort, WallTime};
use crate::config::{FeedingConfig, MotionConfig};
use crate::error::FeedError;
use quota::{DailyQuota, RolloverOutcome};
use schedule::FeedScheduler;

/// What a successful `feed_now()` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOutcome {
    pub steps: u32,
    pub grams_added: u32,
    pub total_grams_today: u32,
    /// The new total is above `max_grams_per_day` (advisory cap).
    pub over_daily_cap: bool,
}

pub struct FeedOrchestrator {
    quota: DailyQuota,
    scheduler: FeedScheduler,
}

impl FeedOrchestrator {
    pub fn new(dispensed_grams_today: u32) -> Self {
        Self {
            quota: DailyQuota::new(dispensed_grams_today),
            scheduler: FeedScheduler::new(),
        }
    }

    pub fn quota(&self) -> &DailyQuota {
        &self.quota
    }

    /// Start one feeding.  `busy` is the caller's view of the activity
    /// machine; a running motor counts as busy too.
    pub fn feed_now<M: MotionPort>(
        &mut self,
        feeding: &FeedingConfig,
        motion_cfg: &MotionConfig,
        busy: bool,
        motion: &mut M,
    ) -> Result<FeedOutcome, FeedError> {
        if busy || motion.is_running() {
            warn!("FEED | rejected: already feeding");
            return Err(FeedError::Busy);
        }

        let steps = feeding.steps_per_feeding();
        if steps == 0 {
            warn!("FEED | rejected: zero steps");
            return Err(FeedError::ZeroSteps);
        }

        let grams = feeding.grams_per_feeding_rounded();
        let over_daily_cap = self.quota.would_exceed(grams, feeding.max_grams_per_day);
        if over_daily_cap && feeding.enforce_daily_cap {
            warn!(
                "FEED | rejected: {} g today, cap {} g",
                self.quota.dispensed_grams_today(),
                feeding.max_grams_per_day
            );
            return Err(FeedError::DailyCapReached);
        }

        motion.set_max_speed(motion_cfg.max_speed);
        motion.set_acceleration(motion_cfg.acceleration);
        motion.enable(true);
        motion.move_relative(i32::try_from(steps).unwrap_or(i32::MAX));

        let total = self.quota.add(grams);
        if over_daily_cap {
            warn!(
                "FEED | daily cap {} g exceeded ({} g)",
                feeding.max_grams_per_day, total
            );
        }
        info!("FEED | {steps} steps, +{grams} g, {total} g today");

        Ok(FeedOutcome {
            steps,
            grams_added: grams,
            total_grams_today: total,
            over_daily_cap,
        })
    }

    pub fn check_rollover(&mut self, day_of_month: u8) -> RolloverOutcome {
        self.quota.check_rollover(day_of_month)
    }

    /// Schedule slot due at `now`, if any.
    pub fn scheduled_slot(&self, now: WallTime, feeding: &FeedingConfig) -> Option<usize> {
        self.scheduler.due(now, &feeding.schedule)
    }

    pub fn slot_settled(&mut self, slot: usize, day: u8) {
        self.scheduler.mark_fired(slot, day);
    }

    pub fn schedule_changed(&mut self) {
        self.scheduler.reset();
    }
}
