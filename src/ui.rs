//! Text frame composition for the 128×64 panel.
//!
//! ```text
//!  ┌─────────────────────┐
//!  │HASS-Display    07:30│  title + clock
//!  │CO    45.5 ^ +0.4/m  │  primary sensor
//!  │CWU   51.0 -         │  secondary sensor
//!  │Fed   20/60 g        │  daily quota
//!  │ACTIVE               │  activity state
//!  └─────────────────────┘
//! ```
//!
//! Pixel-level drawing belongs to the display adapter.

use core::fmt::Write as _;

use crate::app::ports::WallTime;
use crate::fsm::StateId;
use crate::sensors::{SensorHub, SensorSlot};

pub const DEVICE_NAME: &str = "HASS-Display";

/// Characters per line with the 6 px font.
pub const LINE_CHARS: usize = 21;
pub const FRAME_LINES: usize = 5;

pub type FrameLine = heapless::String<LINE_CHARS>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub lines: [FrameLine; FRAME_LINES],
}

impl Frame {
    pub fn line(&self, idx: usize) -> &str {
        self.lines.get(idx).map_or("", |l| l.as_str())
    }
}

/// Everything the frame shows besides the sensor streams.
#[derive(Debug, Clone, Copy)]
pub struct StatusView {
    pub state: StateId,
    pub clock: Option<WallTime>,
    pub dispensed_grams_today: u32,
    pub max_grams_per_day: f32,
}

pub fn compose(hub: &SensorHub, status: &StatusView) -> Frame {
    let mut frame = Frame::default();

    // Overlong content is truncated by the fixed-capacity line.
    let title = &mut frame.lines[0];
    let _ = write!(title, "{DEVICE_NAME:<15}");
    let _ = match status.clock {
        Some(t) => write!(title, "{:02}:{:02}", t.hour, t.minute),
        None => write!(title, "--:--"),
    };

    for (i, slot) in [SensorSlot::Primary, SensorSlot::Secondary].into_iter().enumerate() {
        let line = &mut frame.lines[1 + i];
        let stream = hub.stream(slot);
        let _ = write!(line, "{:<5}", hub.label(slot));
        if stream.has_value() {
            let _ = write!(line, "{:5.1} {}", stream.current, stream.trend().arrow());
            if stream.rate_per_minute != 0.0 {
                let _ = write!(line, " {:+.1}/m", stream.rate_per_minute);
            }
        } else {
            let _ = write!(line, " --.-");
        }
    }

    let _ = write!(
        frame.lines[3],
        "Fed   {}/{:.0} g",
        status.dispensed_grams_today, status.max_grams_per_day
    );
    let _ = write!(frame.lines[4], "{}", status.state.label());

    frame
}
