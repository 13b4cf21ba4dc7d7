//! Fixed-width binary settings record.
//!
//! ```text
//!  offset  size  field
//!  ──────  ────  ─────────────────────────────────────
//!       0    64  MQTT server   (UTF-8, NUL-padded)
//!      64     4  MQTT port     (i32, little-endian)
//!      68    64  MQTT user     (UTF-8, NUL-padded)
//!     132    64  MQTT password (UTF-8, NUL-padded)
//!     196    40  DeviceSettings (postcard, fixed-width)
//! ```
//!
//! The record is rewritten whole on every change.  A record whose length
//! differs from [`RECORD_LEN`] but still covers the credential prefix
//! restores the credentials only; everything else falls back to defaults.
//! Shorter records restore nothing.

use log::{info, warn};

use crate::config::{CredentialString, DeviceSettings, MqttCredentials, Settings};
use crate::error::ConfigError;

const STR_FIELD_LEN: usize = 64;
const SERVER_OFFSET: usize = 0;
const PORT_OFFSET: usize = 64;
const USER_OFFSET: usize = 68;
const PASSWORD_OFFSET: usize = 132;

/// Length of the credential prefix.
pub const CREDENTIALS_LEN: usize = 196;
/// Length of the postcard-encoded [`DeviceSettings`] tail.
pub const TAIL_LEN: usize = 40;
/// Total record length for the current schema.
pub const RECORD_LEN: usize = CREDENTIALS_LEN + TAIL_LEN;

const DEFAULT_PORT: u16 = 1883;

/// How much of a stored record was usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    /// Every field came from the record.
    Full,
    /// Credentials restored, device settings defaulted.
    CredentialsOnly,
    /// Nothing usable; all defaults.
    Defaults,
}

pub type Record = [u8; RECORD_LEN];

// ═══════════════════════════════════════════════════════════════
//  Encode
// ═══════════════════════════════════════════════════════════════

/// Validate and serialise `settings` into a full record.
pub fn encode_record(settings: &Settings) -> Result<Record, ConfigError> {
    settings.validate()?;

    let mut out = [0u8; RECORD_LEN];
    put_str(&mut out, SERVER_OFFSET, &settings.mqtt.server);
    out[PORT_OFFSET..PORT_OFFSET + 4].copy_from_slice(&i32::from(settings.mqtt.port).to_le_bytes());
    put_str(&mut out, USER_OFFSET, &settings.mqtt.user);
    put_str(&mut out, PASSWORD_OFFSET, &settings.mqtt.password);

    let used = postcard::to_slice(&settings.device, &mut out[CREDENTIALS_LEN..])
        .map_err(|_| ConfigError::Corrupted)?
        .len();
    if used != TAIL_LEN {
        warn!("Settings: tail encoded to {used} bytes, expected {TAIL_LEN}");
        return Err(ConfigError::Corrupted);
    }
    Ok(out)
}

fn put_str(out: &mut [u8], offset: usize, s: &str) {
    let bytes = s.as_bytes();
    out[offset..offset + bytes.len()].copy_from_slice(bytes);
}

// ═══════════════════════════════════════════════════════════════
//  Decode
// ═══════════════════════════════════════════════════════════════

/// Decode whatever was stored.  Never fails: unusable parts fall back to
/// defaults, and the result always passes [`Settings::validate`].
pub fn decode_record(bytes: &[u8]) -> (Settings, RecordSource) {
    if bytes.len() < CREDENTIALS_LEN {
        warn!(
            "Settings: record too short ({} bytes), using defaults",
            bytes.len()
        );
        return (Settings::default(), RecordSource::Defaults);
    }

    let mqtt = decode_credentials(&bytes[..CREDENTIALS_LEN]);

    if bytes.len() != RECORD_LEN {
        info!(
            "Settings: record is {} bytes, schema is {}; restoring credentials only",
            bytes.len(),
            RECORD_LEN
        );
        return credentials_only(mqtt);
    }

    let device: DeviceSettings = match postcard::from_bytes(&bytes[CREDENTIALS_LEN..]) {
        Ok(d) => d,
        Err(_) => {
            warn!("Settings: device settings corrupt; restoring credentials only");
            return credentials_only(mqtt);
        }
    };

    let settings = Settings { mqtt, device };
    if let Err(e) = settings.validate() {
        warn!("Settings: stored values rejected ({e}); restoring credentials only");
        return credentials_only(settings.mqtt);
    }
    (settings, RecordSource::Full)
}

fn credentials_only(mqtt: MqttCredentials) -> (Settings, RecordSource) {
    (
        Settings {
            mqtt,
            device: DeviceSettings::default(),
        },
        RecordSource::CredentialsOnly,
    )
}

fn decode_credentials(prefix: &[u8]) -> MqttCredentials {
    let mut port_bytes = [0u8; 4];
    port_bytes.copy_from_slice(&prefix[PORT_OFFSET..PORT_OFFSET + 4]);
    let raw_port = i32::from_le_bytes(port_bytes);
    let port = u16::try_from(raw_port)
        .ok()
        .filter(|p| *p != 0)
        .unwrap_or(DEFAULT_PORT);

    MqttCredentials {
        server: get_str(prefix, SERVER_OFFSET),
        port,
        user: get_str(prefix, USER_OFFSET),
        password: get_str(prefix, PASSWORD_OFFSET),
    }
}

/// Read a NUL-terminated field.  At most 63 bytes are kept; invalid UTF-8
/// yields an empty string.
fn get_str(record: &[u8], offset: usize) -> CredentialString {
    let field = &record[offset..offset + STR_FIELD_LEN - 1];
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let mut out = CredentialString::new();
    if let Ok(s) = core::str::from_utf8(&field[..len]) {
        let _ = out.push_str(s);
    }
    out
}
