//! HASS-Display feeder firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module, so the whole crate
//! builds and tests on the host with in-memory simulations.

#![deny(unused_must_use)]

pub mod activity;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod feeder;
pub mod fsm;
pub mod hass;
pub mod settings;
pub mod ui;

mod pins;

// Hardware-facing modules; the ESP-IDF parts are cfg-gated inside.
pub mod adapters;
pub mod drivers;
pub mod sensors;
