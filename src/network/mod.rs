//! Network abstraction layer.
//!
//! This module provides a platform-independent network interface that works on:
//! - **ESP32** (`esp32` feature): WiFi station with WPS push-button join
//! - **Host**: Native OS networking, always connected
//!
//! The TCP side ([`TcpBridgeListener`], [`TcpClient`]) uses `std::net` in
//! non-blocking mode on both platforms.
//!
//! # Example
//!
//! ```ignore
//! use serial_bridge_esp32::network::NetworkProvider;
//!
//! #[cfg(feature = "esp32")]
//! let mut network = network::WifiNetwork::new(modem, sysloop, nvs)?;
//!
//! #[cfg(not(feature = "esp32"))]
//! let mut network = network::HostNetwork::new();
//!
//! if let Err(e) = network.connect() {
//!     log::warn!("No stored network: {}", e);
//! }
//! ```

use std::net::IpAddr;

#[cfg(not(feature = "esp32"))]
mod host;
mod stats_server;
mod tcp;
#[cfg(feature = "esp32")]
mod wifi;

#[cfg(not(feature = "esp32"))]
pub use host::HostNetwork;
pub use stats_server::{BridgeStats, StatsServer, DEFAULT_STATS_PORT};
pub use tcp::{ClientListener, ClientStream, TcpBridgeListener, TcpClient, BRIDGE_PORT};
#[cfg(feature = "esp32")]
pub use wifi::WifiNetwork;

/// Network provider abstraction.
///
/// This trait abstracts over platform-specific network bring-up so the
/// bridge state machine runs unchanged on ESP32 (WiFi) and host (native).
pub trait NetworkProvider {
    /// Start joining the stored network without waiting for it.
    ///
    /// - On ESP32: uses credentials kept by the WiFi driver
    /// - On Host: detects the local address
    fn connect(&mut self) -> Result<(), NetworkError>;

    /// Check if the network is connected.
    fn is_connected(&self) -> bool;

    /// Get the local IP address.
    ///
    /// Returns `None` if not connected.
    fn ip_addr(&self) -> Option<IpAddr>;

    /// Run a push-button network negotiation (WPS).
    ///
    /// Blocks until the negotiation finishes. Returns the SSID of the
    /// joined network, which may be empty if the driver did not report one.
    fn begin_negotiation(&mut self) -> Result<String, NetworkError>;
}

/// Network errors.
#[derive(Debug)]
pub enum NetworkError {
    /// No WiFi credentials stored.
    NotConfigured,
    /// The platform cannot negotiate a network.
    Unsupported,
    /// Push-button negotiation did not produce credentials.
    NegotiationFailed(String),
    /// Listener has not been started.
    NotListening,
    /// ESP-IDF error.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
    /// Generic I/O error.
    Io(std::io::Error),
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "network not configured"),
            Self::Unsupported => write!(f, "network negotiation not supported"),
            Self::NegotiationFailed(reason) => write!(f, "negotiation failed: {}", reason),
            Self::NotListening => write!(f, "listener not started"),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "ESP error: {:?}", e),
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for NetworkError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}
