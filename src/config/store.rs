//! Configuration persistence over a byte-addressed non-volatile region.
//!
//! The region is [`CONFIG_SIZE`] bytes holding a NUL-terminated record
//! line. A freshly erased region reads as `0xFF` and is treated as empty.
//! Writes always replace the whole record; a torn write simply fails to
//! parse on the next boot and the device falls back to unconfigured.

use super::record::{ConfigurationRecord, StoredConfig};
use log::{debug, info};
use std::fmt;

/// Size of the persisted configuration region in bytes.
pub const CONFIG_SIZE: usize = 100;

/// Value of an erased flash/EEPROM byte.
pub const ERASED_BYTE: u8 = 0xFF;

/// Byte-addressed non-volatile storage.
///
/// `write` only stages data; nothing is durable until `commit` succeeds.
/// Addresses are always below [`CONFIG_SIZE`].
pub trait NonVolatileStore {
    fn read(&self, addr: usize) -> u8;
    fn write(&mut self, addr: usize, value: u8);
    fn commit(&mut self) -> Result<(), StorageError>;
}

/// Owner of the persisted configuration and its RAM mirror.
///
/// The record is read once at boot. Saving rewrites storage but does not
/// change [`ConfigStore::config`]; every save is followed by a restart.
pub struct ConfigStore<S> {
    store: S,
    mirror: [u8; CONFIG_SIZE],
    config: StoredConfig,
}

impl<S: NonVolatileStore> ConfigStore<S> {
    /// Read the region and parse it. Never fails.
    pub fn load(store: S) -> Self {
        let mut this = Self {
            store,
            mirror: [0; CONFIG_SIZE],
            config: StoredConfig::Unconfigured,
        };
        this.reload();
        this
    }

    /// Re-read the whole region from storage.
    pub fn reload(&mut self) -> &StoredConfig {
        for addr in (0..CONFIG_SIZE).rev() {
            self.mirror[addr] = self.store.read(addr);
        }
        if self.mirror[0] == ERASED_BYTE {
            debug!("Configuration region is erased");
            self.mirror[0] = 0;
        }

        self.config = StoredConfig::from_bytes(&self.mirror);
        match &self.config {
            StoredConfig::Configured(record) => {
                info!("Loaded configuration, UART {}", record.framing())
            }
            StoredConfig::Unconfigured => info!("No usable configuration stored"),
        }
        &self.config
    }

    /// Configuration read at boot.
    pub fn config(&self) -> &StoredConfig {
        &self.config
    }

    /// Persist a raw record line.
    ///
    /// At most `CONFIG_SIZE - 1` bytes are written, followed by a NUL.
    /// Longer input is truncated silently.
    pub fn save(&mut self, raw: &[u8]) -> Result<(), StorageError> {
        let len = raw.len().min(CONFIG_SIZE - 1);
        if len < raw.len() {
            debug!(
                "Truncating configuration from {} to {} bytes",
                raw.len(),
                len
            );
        }

        for (addr, &byte) in raw[..len].iter().enumerate() {
            self.store.write(addr, byte);
            self.mirror[addr] = byte;
        }
        self.store.write(len, 0);
        self.mirror[len] = 0;

        self.store.commit()
    }

    /// Persist a validated record.
    pub fn save_record(&mut self, record: &ConfigurationRecord) -> Result<(), StorageError> {
        self.save(&record.to_line())
    }

    /// Wipe the stored record so the next client provisions the device.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.save(b"")
    }

    /// Mutable access to the backing store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

/// Errors that can occur while committing the configuration.
#[derive(Debug)]
pub enum StorageError {
    /// Data read back after commit differs from what was written.
    VerificationFailed,
    /// I/O error (host file backend).
    Io(std::io::Error),
    /// ESP-IDF NVS error.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VerificationFailed => write!(f, "read-back verification failed"),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for StorageError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}
