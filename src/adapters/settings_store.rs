//! Settings persistence over a [`StoragePort`].
//!
//! The whole record lives in one blob (`hassfeeder/settings`).  A missing
//! or mis-sized record degrades to defaults (or credentials plus defaults)
//! and the result is written back so the next boot finds a current-schema
//! record.  A failed read is reported and leaves the stored blob alone.

use log::{info, warn};

use crate::app::ports::{ConfigError, SettingsPort, StorageError, StoragePort};
use crate::config::Settings;
use crate::settings::{RecordSource, decode_record, encode_record};

pub const SETTINGS_NAMESPACE: &str = "hassfeeder";
pub const SETTINGS_KEY: &str = "settings";

/// Read buffer; larger than any record this firmware has written.
const READ_BUF_LEN: usize = 512;

pub struct SettingsStore<S: StoragePort> {
    storage: S,
}

impl<S: StoragePort> SettingsStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// A record written by a newer schema: read it whole so the decoder
    /// can restore the credential prefix.
    fn load_oversized(&self) -> Result<(Settings, RecordSource), ConfigError> {
        let len = self.storage.stored_len(SETTINGS_NAMESPACE, SETTINGS_KEY)?;
        info!("SettingsStore: stored record is {len} bytes");
        let mut record = vec![0u8; len];
        let read = self
            .storage
            .read(SETTINGS_NAMESPACE, SETTINGS_KEY, &mut record)?;
        Ok(decode_record(&record[..read]))
    }

    fn write_back(&mut self, settings: &Settings) {
        match self.save(settings) {
            Ok(()) => info!("SettingsStore: record re-created"),
            Err(e) => warn!("SettingsStore: could not re-create record: {e}"),
        }
    }
}

impl<S: StoragePort> SettingsPort for SettingsStore<S> {
    fn load(&mut self) -> Result<Settings, ConfigError> {
        let mut buf = [0u8; READ_BUF_LEN];
        let (settings, source) =
            match self.storage.read(SETTINGS_NAMESPACE, SETTINGS_KEY, &mut buf) {
                Ok(len) => decode_record(&buf[..len]),
                Err(StorageError::NotFound) => {
                    info!("SettingsStore: no stored record, using defaults");
                    (Settings::default(), RecordSource::Defaults)
                }
                Err(StorageError::BufferTooSmall) => self.load_oversized()?,
                Err(e) => {
                    // The record may be intact; leave it for the next boot.
                    warn!("SettingsStore: read failed ({e}), keeping stored record");
                    return Err(e.into());
                }
            };

        if source != RecordSource::Full {
            self.write_back(&settings);
        } else {
            info!("SettingsStore: settings loaded");
        }
        Ok(settings)
    }

    fn save(&mut self, settings: &Settings) -> Result<(), ConfigError> {
        let record = encode_record(settings)?;
        self.storage
            .write(SETTINGS_NAMESPACE, SETTINGS_KEY, &record)
            .map_err(ConfigError::from)
    }
}
