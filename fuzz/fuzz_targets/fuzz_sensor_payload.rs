//! Fuzz target: inbound MQTT payloads
//!
//! Routes arbitrary payloads to the sensor hub and to the Home Assistant
//! command parser and verifies:
//! - No panics under arbitrary byte inputs
//! - A rejected sensor payload leaves the stream untouched
//! - An accepted sensor value is always finite
//!
//! cargo fuzz run fuzz_sensor_payload

#![no_main]

use libfuzzer_sys::fuzz_target;
use hassfeeder::hass::{Entity, HassNode};
use hassfeeder::sensors::SensorHub;

const TOPIC: &str = "GreenThing/27B529/CO/temperature";

fuzz_target!(|data: &[u8]| {
    let mut hub = SensorHub::default();
    let Some(slot) = hub.slot_for(TOPIC) else {
        return;
    };
    let before = *hub.stream(slot);
    match hub.on_message(TOPIC, data, 1_000) {
        Some(_) => assert!(hub.stream(slot).current.is_finite()),
        None => assert_eq!(*hub.stream(slot), before),
    }

    let node = HassNode::new("feeder_fuzz00");
    for entity in Entity::ALL {
        let _ = node.classify(&node.command_topic(entity), data);
    }
    let _ = node.classify(&node.brightness_command_topic(), data);
    let _ = node.classify("homeassistant/status", data);
});
