//! Configuration persistence for host (development) builds.
//!
//! Stores the 100-byte configuration region in a file so provisioning
//! survives restarts of the host bridge. Uses
//! `~/.serial-bridge-esp32/config.bin` by default; `SERIAL_BRIDGE_STORE`
//! overrides the path.
//!
//! # Usage
//!
//! ```ignore
//! use serial_bridge_esp32::config::ConfigStore;
//! use serial_bridge_esp32::persistence_host::{default_store_path, FileStore};
//!
//! let store = ConfigStore::load(FileStore::open(default_store_path()?)?);
//! log::info!("Configured: {}", store.config().is_configured());
//! ```

use crate::config::{NonVolatileStore, StorageError, CONFIG_SIZE, ERASED_BYTE};
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable overriding the store path.
pub const STORE_PATH_ENV: &str = "SERIAL_BRIDGE_STORE";

/// Get the default store file path.
///
/// Returns `$SERIAL_BRIDGE_STORE` if set, else
/// `~/.serial-bridge-esp32/config.bin`.
pub fn default_store_path() -> io::Result<PathBuf> {
    if let Ok(path) = std::env::var(STORE_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }

    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home)
        .join(".serial-bridge-esp32")
        .join("config.bin"))
}

/// File-backed [`NonVolatileStore`].
///
/// The region lives in RAM; `commit` writes it to the file and reads it back.
/// A missing file reads as erased.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    image: [u8; CONFIG_SIZE],
}

impl FileStore {
    /// Load the region from `path`.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let mut image = [ERASED_BYTE; CONFIG_SIZE];

        match fs::read(&path) {
            Ok(bytes) => {
                let n = bytes.len().min(CONFIG_SIZE);
                image[..n].copy_from_slice(&bytes[..n]);
                debug!("Loaded {} bytes from {:?}", n, path);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No store file at {:?}, starting erased", path);
            }
            Err(e) => return Err(e),
        }

        Ok(Self { path, image })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NonVolatileStore for FileStore {
    fn read(&self, addr: usize) -> u8 {
        self.image[addr]
    }

    fn write(&mut self, addr: usize, value: u8) {
        self.image[addr] = value;
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        // Create parent directory if needed
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, self.image)?;

        // Verify write by reading back
        let read_back = fs::read(&self.path)?;
        if read_back != self.image {
            return Err(StorageError::VerificationFailed);
        }

        info!("Configuration saved to {:?}", self.path);
        Ok(())
    }
}
