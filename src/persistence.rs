//! Configuration persistence in ESP32 Non-Volatile Storage (NVS).
//!
//! The 100-byte configuration region is kept as one NVS blob. It is read
//! into RAM at boot; writes only touch the RAM image and `commit` stores the
//! whole blob, then reads it back to catch silent flash failures.
//!
//! # Usage
//!
//! ```ignore
//! use serial_bridge_esp32::config::ConfigStore;
//! use serial_bridge_esp32::persistence::NvsStore;
//!
//! let nvs = EspDefaultNvsPartition::take()?;
//! let store = ConfigStore::load(NvsStore::open(nvs.clone())?);
//! ```

use crate::config::{NonVolatileStore, StorageError, CONFIG_SIZE, ERASED_BYTE};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_sys::EspError;
use log::{debug, error, info, warn};

/// NVS namespace for bridge storage.
const NVS_NAMESPACE: &str = "bridge";

/// NVS key of the configuration region.
const CONFIG_KEY: &str = "config";

/// NVS-backed [`NonVolatileStore`].
pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
    image: [u8; CONFIG_SIZE],
}

impl NvsStore {
    /// Open the namespace and load the region. A missing blob reads as
    /// erased.
    pub fn open(partition: EspDefaultNvsPartition) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        let mut image = [ERASED_BYTE; CONFIG_SIZE];

        let mut buf = [0u8; CONFIG_SIZE];
        match nvs.get_raw(CONFIG_KEY, &mut buf) {
            Ok(Some(bytes)) => {
                image[..bytes.len()].copy_from_slice(bytes);
                debug!("Loaded {} configuration bytes from NVS", bytes.len());
            }
            Ok(None) => debug!("No configuration found in NVS"),
            Err(e) => warn!("Failed to read configuration from NVS: {:?}", e),
        }

        Ok(Self { nvs, image })
    }

    fn store_verified(&mut self) -> Result<(), EspError> {
        self.nvs.set_raw(CONFIG_KEY, &self.image)?;

        // Read back and verify to catch silent flash write failures
        let mut verify_buf = [0u8; CONFIG_SIZE];
        let read_bytes = self
            .nvs
            .get_raw(CONFIG_KEY, &mut verify_buf)
            .map_err(|e| {
                error!("Failed to read back configuration after save: {:?}", e);
                e
            })?
            .ok_or_else(|| {
                error!("Configuration not found after save - possible flash failure");
                EspError::from_infallible::<{ esp_idf_sys::ESP_ERR_NVS_NOT_FOUND }>()
            })?;

        if read_bytes != &self.image[..] {
            error!("Configuration verification failed - data mismatch after save");
            return Err(EspError::from_infallible::<
                { esp_idf_sys::ESP_ERR_INVALID_CRC },
            >());
        }

        Ok(())
    }
}

impl NonVolatileStore for NvsStore {
    fn read(&self, addr: usize) -> u8 {
        self.image[addr]
    }

    fn write(&mut self, addr: usize, value: u8) {
        self.image[addr] = value;
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.store_verified()?;
        info!("Configuration saved and verified in NVS");
        Ok(())
    }
}
