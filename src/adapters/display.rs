//! Display adapter.
//!
//! Implements [`DisplayPort`] by mirroring each composed [`Frame`] to the
//! log.  Only frames that differ from the previous one are written, so a
//! 1 Hz render tick does not flood the console.  Contrast is kept as the
//! panel's electronic-volume setting and logged when it changes.

use log::debug;

use crate::app::ports::DisplayPort;
use crate::ui::Frame;

#[derive(Debug, Default)]
pub struct LogDisplay {
    pending: Option<Frame>,
    shown: Option<Frame>,
    flushes: u32,
    contrast: Option<u8>,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// The frame last pushed to the panel.
    pub fn shown(&self) -> Option<&Frame> {
        self.shown.as_ref()
    }

    /// Contrast last applied to the panel.
    pub fn contrast(&self) -> Option<u8> {
        self.contrast
    }

    /// Number of flushes that changed the panel.
    pub fn flushes(&self) -> u32 {
        self.flushes
    }
}

impl DisplayPort for LogDisplay {
    fn draw(&mut self, frame: &Frame) {
        self.pending = Some(frame.clone());
    }

    fn flush(&mut self) {
        let Some(frame) = self.pending.take() else {
            return;
        };
        if self.shown.as_ref() == Some(&frame) {
            return;
        }
        for line in &frame.lines {
            debug!("LCD | {}", line);
        }
        self.shown = Some(frame);
        self.flushes += 1;
    }

    fn set_contrast(&mut self, contrast: u8) {
        if self.contrast != Some(contrast) {
            debug!("LCD | contrast {}", contrast);
            self.contrast = Some(contrast);
        }
    }
}
