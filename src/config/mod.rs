//! Persisted bridge configuration.
//!
//! # Components
//!
//! - `record` - record grammar, UART framing, stored state (host-testable)
//! - `store` - non-volatile mirror, load/save/clear
//!
//! Backends for [`NonVolatileStore`] live in `persistence` (ESP32 NVS) and
//! `persistence_host` (file on the host).

mod record;
mod store;

pub use record::{
    ConfigError, ConfigurationRecord, SerialFraming, StopBits, StoredConfig, DATA_BITS,
    DEFAULT_BAUD_RATE, MAX_BAUD_DIGITS, MAX_RECORD_LEN, PARITY_NONE,
};
pub use store::{ConfigStore, NonVolatileStore, StorageError, CONFIG_SIZE, ERASED_BYTE};
