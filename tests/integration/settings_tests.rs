//! Settings persistence through [`SettingsStore`] over a mock NVS.

use super::mock_hw::MockNvs;

use hassfeeder::adapters::settings_store::{SETTINGS_KEY, SETTINGS_NAMESPACE, SettingsStore};
use hassfeeder::app::ports::{ConfigError, SettingsPort, StoragePort};
use hassfeeder::config::{CredentialString, FeedTime, Settings};
use hassfeeder::settings::{CREDENTIALS_LEN, RECORD_LEN, encode_record};

fn creds(s: &str) -> CredentialString {
    let mut out = CredentialString::new();
    out.push_str(s).unwrap();
    out
}

fn customised() -> Settings {
    let mut s = Settings::default();
    s.mqtt.server = creds("192.168.1.10");
    s.mqtt.port = 8883;
    s.mqtt.user = creds("feeder");
    s.mqtt.password = creds("s3cret");
    s.device.display.contrast = 17;
    s.device.display.backlight_level = 200;
    s.device.display.backlight_enabled = false;
    s.device.motion.max_speed = 600.0;
    s.device.motion.acceleration = 250.0;
    s.device.feeding.rotations_per_feeding = 1.5;
    s.device.feeding.grams_per_feeding = 12.5;
    s.device.feeding.max_grams_per_day = 80.0;
    s.device.feeding.enforce_daily_cap = true;
    s.device.feeding.schedule[0] = FeedTime::at(7, 0);
    s.device.feeding.schedule[2] = FeedTime::at(19, 45);
    s.device.dispensed_grams_today = 25;
    s
}

#[test]
fn every_field_survives_a_reboot() {
    let mut store = SettingsStore::new(MockNvs::new());
    let settings = customised();
    store.save(&settings).unwrap();

    let raw = store.storage().raw(SETTINGS_NAMESPACE, SETTINGS_KEY).unwrap();
    assert_eq!(raw.len(), RECORD_LEN);

    // Fresh store over the same flash contents.
    let mut reboot = SettingsStore::new(store.storage().clone());
    assert_eq!(reboot.load().unwrap(), settings);
}

#[test]
fn first_boot_writes_defaults() {
    let mut store = SettingsStore::new(MockNvs::new());
    assert_eq!(store.load().unwrap(), Settings::default());
    assert!(store.storage().exists(SETTINGS_NAMESPACE, SETTINGS_KEY));
}

#[test]
fn older_schema_keeps_only_credentials() {
    let settings = customised();
    let record = encode_record(&settings).unwrap();

    let mut nvs = MockNvs::new();
    // A record from a firmware with a shorter device section.
    nvs.write(SETTINGS_NAMESPACE, SETTINGS_KEY, &record[..CREDENTIALS_LEN + 8])
        .unwrap();
    let mut store = SettingsStore::new(nvs);
    let loaded = store.load().unwrap();

    assert_eq!(loaded.mqtt, settings.mqtt);
    assert_eq!(loaded.device, Settings::default().device);
    // Upgraded in place.
    let raw = store.storage().raw(SETTINGS_NAMESPACE, SETTINGS_KEY).unwrap();
    assert_eq!(raw.len(), RECORD_LEN);
}

#[test]
fn truncated_record_falls_back_to_defaults() {
    let mut nvs = MockNvs::new();
    nvs.write(SETTINGS_NAMESPACE, SETTINGS_KEY, &[0xAA; 10]).unwrap();
    let mut store = SettingsStore::new(nvs);
    assert_eq!(store.load().unwrap(), Settings::default());
}

#[test]
fn out_of_range_values_are_rejected_not_clamped() {
    let mut store = SettingsStore::new(MockNvs::new());
    let mut settings = Settings::default();
    settings.device.motion.max_speed = 5_000.0;
    assert!(matches!(
        store.save(&settings),
        Err(ConfigError::ValidationFailed(_))
    ));
    assert!(!store.storage().exists(SETTINGS_NAMESPACE, SETTINGS_KEY));
}

#[test]
fn storage_failure_surfaces_as_config_error() {
    let mut nvs = MockNvs::new();
    nvs.fail_writes = true;
    let mut store = SettingsStore::new(nvs);
    assert!(store.save(&Settings::default()).is_err());
    // Loading still works, the write-back failure is only logged.
    assert_eq!(store.load().unwrap(), Settings::default());
}

#[test]
fn newer_schema_larger_than_read_buffer_keeps_credentials() {
    let settings = customised();
    let mut record = encode_record(&settings).unwrap().to_vec();
    // A record from a firmware with a much larger device section.
    record.resize(600, 0x5A);

    let mut nvs = MockNvs::new();
    nvs.write(SETTINGS_NAMESPACE, SETTINGS_KEY, &record).unwrap();
    let mut store = SettingsStore::new(nvs);
    let loaded = store.load().unwrap();

    assert_eq!(loaded.mqtt.server.as_str(), "192.168.1.10");
    assert_eq!(loaded.mqtt.port, 8883);
    assert_eq!(loaded.mqtt.user.as_str(), "feeder");
    assert_eq!(loaded.device, Settings::default().device);

    let raw = store.storage().raw(SETTINGS_NAMESPACE, SETTINGS_KEY).unwrap();
    assert_eq!(raw.len(), RECORD_LEN);
    assert_eq!(&raw[..CREDENTIALS_LEN], &record[..CREDENTIALS_LEN]);
}

#[test]
fn read_failure_leaves_stored_record_alone() {
    let settings = customised();
    let mut nvs = MockNvs::new();
    nvs.write(
        SETTINGS_NAMESPACE,
        SETTINGS_KEY,
        &encode_record(&settings).unwrap(),
    )
    .unwrap();
    nvs.fail_reads = true;
    let mut store = SettingsStore::new(nvs);

    assert_eq!(store.load(), Err(ConfigError::IoError));

    // Once the flash reads again, nothing was lost.
    let mut nvs = store.storage().clone();
    nvs.fail_reads = false;
    let mut reboot = SettingsStore::new(nvs);
    assert_eq!(reboot.load().unwrap(), settings);
}
