//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements         | Connects to                  |
//! |------------------|--------------------|------------------------------|
//! | `hardware`       | ActuatorPort       | LEDC backlight               |
//! |                  | MotionPort         | Stepper timer core           |
//! | `display`        | DisplayPort        | Serial log (frame mirror)    |
//! | `log_sink`       | EventSink          | Serial log output            |
//! | `mqtt`           | EventSink          | ESP-IDF MQTT client          |
//! | `nvs`            | StoragePort        | NVS / in-memory store        |
//! | `settings_store` | SettingsPort       | Any StoragePort              |
//! | `time`           | ClockPort          | esp_timer + SNTP local time  |
//!
//! `device_id` is a helper rather than an adapter: it turns the factory
//! MAC into the node id used by `mqtt` and the discovery payloads.

pub mod device_id;
pub mod display;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod settings_store;
pub mod time;
