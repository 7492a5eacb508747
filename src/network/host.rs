//! Host network provider.
//!
//! On host systems, the OS handles networking. This provider is a thin wrapper
//! that reports the system's network status.

use super::{NetworkError, NetworkProvider};
use log::info;
use std::net::IpAddr;

/// Host network provider.
///
/// On host systems, networking is always available via the OS and there is
/// no push-button negotiation.
pub struct HostNetwork {
    ip_addr: Option<IpAddr>,
}

impl HostNetwork {
    /// Create a new host network provider.
    pub fn new() -> Self {
        Self { ip_addr: None }
    }

    /// Get the primary local IP address.
    ///
    /// Creates a UDP socket and "connects" it to a public IP (nothing is
    /// sent), then checks which local address was chosen.
    fn detect_local_ip() -> Option<IpAddr> {
        use std::net::UdpSocket;

        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        let local_addr = socket.local_addr().ok()?;
        Some(local_addr.ip())
    }
}

impl Default for HostNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkProvider for HostNetwork {
    fn connect(&mut self) -> Result<(), NetworkError> {
        self.ip_addr = Self::detect_local_ip();

        if let Some(ip) = self.ip_addr {
            info!("Host network ready, local IP: {}", ip);
        } else {
            info!("Host network ready, binding to 0.0.0.0");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        // The actual connection will fail at socket level if not
        true
    }

    fn ip_addr(&self) -> Option<IpAddr> {
        self.ip_addr
    }

    fn begin_negotiation(&mut self) -> Result<String, NetworkError> {
        Err(NetworkError::Unsupported)
    }
}
