//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules of the feeder display: the
//! activity machine that owns the backlight, feeding with its daily quota,
//! remote commands and the sensor streams shown on the panel.  All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
