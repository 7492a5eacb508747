//! Serial bridge ESP32 firmware library.
//!
//! Bridges a UART to a single TCP client over WiFi, with a two-button front
//! panel for WPS setup and for wiping the stored configuration.
//!
//! Everything except the hardware backends is platform-independent and
//! tested on the host machine without ESP32 hardware.

pub mod app;
pub mod bridge;
pub mod config;
pub mod gate;
pub mod mode;
pub mod network;
pub mod panel;
#[cfg(feature = "esp32")]
pub mod persistence;
#[cfg(not(feature = "esp32"))]
pub mod persistence_host;
pub mod serial;
#[cfg(test)]
mod sim;
pub mod wps;

// Re-export commonly used items
pub use app::{BridgeApp, Cycle, Peripherals};
pub use config::{ConfigStore, ConfigurationRecord, SerialFraming, StoredConfig};
pub use gate::{GateEvent, SlotState};
pub use mode::Mode;
pub use network::{BridgeStats, StatsServer, TcpBridgeListener, BRIDGE_PORT, DEFAULT_STATS_PORT};
