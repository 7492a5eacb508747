//! TCP listener and client for the bridge port.
//!
//! Works on both host (via standard sockets) and ESP32 (via ESP-IDF lwIP
//! sockets). Everything is non-blocking so one polling cycle never waits on
//! the network.

use super::NetworkError;
use log::{debug, info, warn};
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};

/// Port clients connect to.
pub const BRIDGE_PORT: u16 = 29111;

/// Receive buffer per client read.
const RX_CHUNK: usize = 256;

/// Source of incoming bridge connections.
pub trait ClientListener {
    type Client: ClientStream;

    /// Bind and start listening.
    fn start(&mut self) -> Result<(), NetworkError>;

    /// Accept one pending connection, if any.
    fn accept(&mut self) -> Result<Option<Self::Client>, NetworkError>;
}

/// One accepted client connection.
pub trait ClientStream {
    /// Next received byte, or `None` when nothing is buffered.
    fn read_byte(&mut self) -> Result<Option<u8>, NetworkError>;

    /// Send bytes. Returns 0 when the socket cannot take more right now.
    fn write(&mut self, data: &[u8]) -> Result<usize, NetworkError>;

    /// False once the peer closed the connection or an I/O error occurred.
    fn is_connected(&self) -> bool;

    /// Close the connection immediately, without a graceful handshake.
    fn abort(&mut self);

    fn peer_addr(&self) -> Option<SocketAddr>;
}

/// Non-blocking `std::net` listener on all interfaces.
pub struct TcpBridgeListener {
    port: u16,
    listener: Option<TcpListener>,
}

impl TcpBridgeListener {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            listener: None,
        }
    }

    /// Bound address, once started. Useful with port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref()?.local_addr().ok()
    }
}

impl Default for TcpBridgeListener {
    fn default() -> Self {
        Self::new(BRIDGE_PORT)
    }
}

impl ClientListener for TcpBridgeListener {
    type Client = TcpClient;

    fn start(&mut self) -> Result<(), NetworkError> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, self.port))?;
        listener.set_nonblocking(true)?;
        info!("Listening on {}", listener.local_addr()?);
        self.listener = Some(listener);
        Ok(())
    }

    fn accept(&mut self) -> Result<Option<TcpClient>, NetworkError> {
        let listener = self.listener.as_ref().ok_or(NetworkError::NotListening)?;
        match listener.accept() {
            Ok((stream, peer)) => Ok(Some(TcpClient::new(stream, peer)?)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Accepted bridge client.
pub struct TcpClient {
    stream: TcpStream,
    peer: SocketAddr,
    rx: [u8; RX_CHUNK],
    rx_pos: usize,
    rx_len: usize,
    connected: bool,
}

impl TcpClient {
    fn new(stream: TcpStream, peer: SocketAddr) -> Result<Self, NetworkError> {
        stream.set_nonblocking(true)?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to disable Nagle's algorithm: {}", e);
        }

        Ok(Self {
            stream,
            peer,
            rx: [0; RX_CHUNK],
            rx_pos: 0,
            rx_len: 0,
            connected: true,
        })
    }

    fn fill(&mut self) -> Result<(), NetworkError> {
        if self.rx_pos < self.rx_len || !self.connected {
            return Ok(());
        }

        match self.stream.read(&mut self.rx) {
            Ok(0) => {
                debug!("{} closed the connection", self.peer);
                self.connected = false;
                Ok(())
            }
            Ok(n) => {
                self.rx_pos = 0;
                self.rx_len = n;
                Ok(())
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(())
            }
            Err(e) => {
                self.connected = false;
                Err(e.into())
            }
        }
    }
}

impl ClientStream for TcpClient {
    fn read_byte(&mut self) -> Result<Option<u8>, NetworkError> {
        self.fill()?;
        if self.rx_pos == self.rx_len {
            return Ok(None);
        }
        let byte = self.rx[self.rx_pos];
        self.rx_pos += 1;
        Ok(Some(byte))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, NetworkError> {
        if !self.connected {
            return Ok(0);
        }
        match self.stream.write(data) {
            Ok(n) => Ok(n),
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(0)
            }
            Err(e) => {
                self.connected = false;
                Err(e.into())
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn abort(&mut self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("Shutdown of {} failed: {}", self.peer, e);
        }
        self.connected = false;
        self.rx_pos = 0;
        self.rx_len = 0;
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}

impl std::fmt::Debug for TcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpClient")
            .field("peer", &self.peer)
            .field("connected", &self.connected)
            .finish()
    }
}
