//! Fuzz target: persisted settings record
//!
//! Feeds arbitrary blobs to the record decoder, both directly and through
//! `SettingsStore::load`, and verifies:
//! - No panics under arbitrary byte inputs
//! - The decoded settings always pass validation
//! - Whatever was loaded can be saved and reloaded unchanged
//!
//! cargo fuzz run fuzz_settings_record

#![no_main]

use libfuzzer_sys::fuzz_target;
use hassfeeder::adapters::settings_store::{SETTINGS_KEY, SETTINGS_NAMESPACE, SettingsStore};
use hassfeeder::app::ports::{SettingsPort, StorageError, StoragePort};
use hassfeeder::settings::decode_record;
use std::collections::HashMap;

// ── In-memory StoragePort for fuzz testing ────────────────────

struct MemStore {
    data: HashMap<String, Vec<u8>>,
}

impl StoragePort for MemStore {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.data.get(&format!("{ns}::{key}")) {
            Some(v) if v.len() > buf.len() => Err(StorageError::BufferTooSmall),
            Some(v) => {
                buf[..v.len()].copy_from_slice(v);
                Ok(v.len())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn stored_len(&self, ns: &str, key: &str) -> Result<usize, StorageError> {
        self.data
            .get(&format!("{ns}::{key}"))
            .map(Vec::len)
            .ok_or(StorageError::NotFound)
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.data.insert(format!("{ns}::{key}"), data.to_vec());
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.data.contains_key(&format!("{ns}::{key}"))
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        self.data.remove(&format!("{ns}::{key}"));
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let (direct, _) = decode_record(data);
    assert!(direct.validate().is_ok(), "decoder produced invalid settings");

    let mut mem = MemStore {
        data: HashMap::new(),
    };
    let _ = mem.write(SETTINGS_NAMESPACE, SETTINGS_KEY, data);
    let mut store = SettingsStore::new(mem);

    let Ok(loaded) = store.load() else {
        panic!("load must degrade to defaults, never fail");
    };
    store.save(&loaded).expect("loaded settings must be saveable");
    let reloaded = store.load().expect("second load");
    assert_eq!(loaded, reloaded);
});
