//! ESP32 clock adapter.
//!
//! Implements [`ClockPort`]: monotonic uptime plus local wall time.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for uptime,
//!   `gettimeofday` + `localtime_r` for wall time once SNTP has set the
//!   clock.  The POSIX TZ string is applied at construction.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` for uptime and
//!   a settable wall time for host tests.

use crate::app::ports::{ClockPort, WallTime};

/// Anything earlier than 2020-01-01 means SNTP has not synced yet.
#[cfg(target_os = "espidf")]
const EPOCH_2020: i64 = 1_577_836_800;

pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    wall: std::cell::Cell<Option<WallTime>>,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        use crate::config::TIMEZONE;

        let mut tz = heapless::Vec::<u8, 64>::new();
        let _ = tz.extend_from_slice(TIMEZONE.as_bytes());
        let _ = tz.push(0);
        // SAFETY: both strings are NUL-terminated and outlive the calls.
        unsafe {
            esp_idf_svc::sys::setenv(b"TZ\0".as_ptr() as *const _, tz.as_ptr() as *const _, 1);
            esp_idf_svc::sys::tzset();
        }
        log::info!("SystemClock: TZ={}", TIMEZONE);
        Self {}
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
            wall: std::cell::Cell::new(None),
        }
    }

    /// Simulation: pretend SNTP delivered this local time.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_wall_time(&self, wall: Option<WallTime>) {
        self.wall.set(wall);
    }
}

impl ClockPort for SystemClock {
    #[cfg(target_os = "espidf")]
    fn wall_time(&self) -> Option<WallTime> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        if (tv.tv_sec as i64) < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        if !(0..=23).contains(&tm.tm_hour) || !(1..=31).contains(&tm.tm_mday) {
            return None;
        }
        Some(WallTime {
            hour: tm.tm_hour as u8,
            minute: tm.tm_min as u8,
            second: tm.tm_sec as u8,
            day: tm.tm_mday as u8,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn wall_time(&self) -> Option<WallTime> {
        self.wall.get()
    }

    #[cfg(target_os = "espidf")]
    fn uptime_ms(&self) -> u32 {
        ((unsafe { esp_idf_svc::sys::esp_timer_get_time() }) / 1_000) as u32
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}
