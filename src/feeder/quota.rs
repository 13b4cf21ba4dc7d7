//! Daily dispensed-grams tracker with calendar-day rollover.
//!
//! Only the day of month is compared, so the 31st followed by the 1st is a
//! new day while the 5th of one month followed by the 5th of the next is
//! not.  The observed day itself is not persisted: after a reboot the first
//! valid clock reading re-initialises it without a reset.

use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverOutcome {
    /// First valid day seen; total kept.
    Initialized,
    /// Same day as before.
    Unchanged,
    /// Day changed; total cleared.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DailyQuota {
    dispensed_grams_today: u32,
    last_observed_day: Option<u8>,
}

impl DailyQuota {
    /// Restore from the persisted total.
    pub const fn new(dispensed_grams_today: u32) -> Self {
        Self {
            dispensed_grams_today,
            last_observed_day: None,
        }
    }

    pub fn dispensed_grams_today(&self) -> u32 {
        self.dispensed_grams_today
    }

    pub fn last_observed_day(&self) -> Option<u8> {
        self.last_observed_day
    }

    /// Compare `day_of_month` against the last one seen.  A `Reset` means
    /// the caller must persist and republish the cleared total.
    pub fn check_rollover(&mut self, day_of_month: u8) -> RolloverOutcome {
        match self.last_observed_day {
            None => {
                self.last_observed_day = Some(day_of_month);
                info!("QUOTA | day initialised to {day_of_month}");
                RolloverOutcome::Initialized
            }
            Some(day) if day == day_of_month => RolloverOutcome::Unchanged,
            Some(day) => {
                info!(
                    "QUOTA | day {} -> {}, clearing {} g",
                    day, day_of_month, self.dispensed_grams_today
                );
                self.last_observed_day = Some(day_of_month);
                self.dispensed_grams_today = 0;
                RolloverOutcome::Reset
            }
        }
    }

    pub fn add(&mut self, grams: u32) -> u32 {
        self.dispensed_grams_today = self.dispensed_grams_today.saturating_add(grams);
        self.dispensed_grams_today
    }

    /// Whether adding `grams` would exceed `max_grams_per_day`.
    pub fn would_exceed(&self, grams: u32, max_grams_per_day: f32) -> bool {
        self.dispensed_grams_today.saturating_add(grams) as f32 > max_grams_per_day
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_day_is_noop_then_new_day_resets_once() {
        let mut q = DailyQuota::new(30);
        assert_eq!(q.check_rollover(5), RolloverOutcome::Initialized);
        assert_eq!(q.dispensed_grams_today(), 30);
        assert_eq!(q.check_rollover(5), RolloverOutcome::Unchanged);
        assert_eq!(q.check_rollover(6), RolloverOutcome::Reset);
        assert_eq!(q.dispensed_grams_today(), 0);
        assert_eq!(q.last_observed_day(), Some(6));
        assert_eq!(q.check_rollover(6), RolloverOutcome::Unchanged);
    }

    #[test]
    fn month_end_wrap_is_a_new_day() {
        let mut q = DailyQuota::new(0);
        q.check_rollover(31);
        q.add(10);
        assert_eq!(q.check_rollover(1), RolloverOutcome::Reset);
        assert_eq!(q.dispensed_grams_today(), 0);
    }

    #[test]
    fn add_accumulates_and_saturates() {
        let mut q = DailyQuota::new(u32::MAX - 1);
        assert_eq!(q.add(5), u32::MAX);
        let mut q = DailyQuota::new(0);
        q.add(10);
        assert_eq!(q.add(13), 23);
    }

    #[test]
    fn cap_check() {
        let q = DailyQuota::new(50);
        assert!(!q.would_exceed(10, 60.0));
        assert!(q.would_exceed(11, 60.0));
    }
}
