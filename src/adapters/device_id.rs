//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable node id in the form `feeder_xxyyzz` (last 3 bytes of
//! the 6-byte MAC in lowercase hex).  It is used as the MQTT client id,
//! in every entity topic and in discovery unique ids.

use core::fmt::Write;

pub type NodeIdString = heapless::String<16>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn node_id(mac: &MacAddress) -> NodeIdString {
    let mut id = NodeIdString::new();
    let _ = write!(id, "feeder_{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_format() {
        let mac = [0x00, 0x11, 0x22, 0xAA, 0xBB, 0xCC];
        assert_eq!(node_id(&mac).as_str(), "feeder_aabbcc");
    }

    #[test]
    fn node_id_from_sim_mac() {
        assert_eq!(node_id(&read_mac()).as_str(), "feeder_efcafe");
    }
}
