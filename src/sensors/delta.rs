//! Rate-of-change estimator for a streamed sensor value.
//!
//! Each sample shifts `current` into `previous` and recomputes the rate in
//! units per minute from the two most recent samples.  The change threshold
//! only selects the trend arrow drawn next to the value.

const MS_PER_MINUTE: f32 = 60_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Falling,
    Steady,
}

impl Trend {
    pub const fn arrow(self) -> char {
        match self {
            Self::Rising => '^',
            Self::Falling => 'v',
            Self::Steady => '-',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorStream {
    pub current: f32,
    pub previous: f32,
    pub last_update_ms: Option<u32>,
    pub rate_per_minute: f32,
    pub change_threshold: f32,
}

impl SensorStream {
    pub const fn new(change_threshold: f32) -> Self {
        Self {
            current: 0.0,
            previous: 0.0,
            last_update_ms: None,
            rate_per_minute: 0.0,
            change_threshold,
        }
    }

    /// Feed one sample taken at `now_ms`.
    pub fn on_sample(&mut self, value: f32, now_ms: u32) {
        self.rate_per_minute = match self.last_update_ms {
            None => 0.0,
            Some(last) => {
                let elapsed_ms = now_ms.wrapping_sub(last);
                if elapsed_ms == 0 {
                    // Two samples in the same millisecond carry no slope.
                    0.0
                } else {
                    (value - self.current) / (elapsed_ms as f32 / MS_PER_MINUTE)
                }
            }
        };
        self.previous = self.current;
        self.current = value;
        self.last_update_ms = Some(now_ms);
    }

    pub fn has_value(&self) -> bool {
        self.last_update_ms.is_some()
    }

    pub fn trend(&self) -> Trend {
        if self.rate_per_minute > self.change_threshold {
            Trend::Rising
        } else if self.rate_per_minute < -self.change_threshold {
            Trend::Falling
        } else {
            Trend::Steady
        }
    }
}
