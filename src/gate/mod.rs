//! Listener lifecycle and the single client slot.
//!
//! Every accepted connection walks through a small state machine:
//!
//! ```text
//! Empty -> PendingInitialConfig   (device unconfigured)
//!       -> PendingAuth            (device configured)
//! PendingAuth --token line--> Authorized
//! PendingAuth --other line--> Empty (connection aborted)
//! any --peer closed--> Empty
//! ```
//!
//! A second connection while the slot is taken is accepted and aborted
//! straight away so it never lingers in the network stack.

mod line;

pub use line::{LineBuffer, Push, LINE_CAPACITY, LINE_TERMINATOR};

use crate::mode::Mode;
use crate::network::{BridgeStats, ClientListener, ClientStream, NetworkProvider};
use crate::panel::{Led, Panel};
use log::{debug, info, warn};
use std::fmt;
use zeroize::Zeroizing;

/// State of the client slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Empty,
    /// First client of an unconfigured device; its first line becomes the
    /// stored record.
    PendingInitialConfig,
    /// Waiting for the token line.
    PendingAuth,
    /// Bytes are bridged to and from the UART.
    Authorized,
}

impl SlotState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::PendingInitialConfig => "pending_initial_config",
            Self::PendingAuth => "pending_auth",
            Self::Authorized => "authorized",
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::PendingInitialConfig => 1,
            Self::PendingAuth => 2,
            Self::Authorized => 3,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Empty),
            1 => Some(Self::PendingInitialConfig),
            2 => Some(Self::PendingAuth),
            3 => Some(Self::Authorized),
            _ => None,
        }
    }

    /// A line exchange is in progress.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::PendingInitialConfig | Self::PendingAuth)
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of feeding client bytes into a pending exchange.
#[derive(Debug, PartialEq, Eq)]
pub enum GateEvent {
    /// Nothing completed this cycle.
    Idle,
    /// The client sent the right token.
    Authorized,
    /// The client sent a wrong token and was disconnected.
    Rejected,
    /// The first client of an unconfigured device sent its record line.
    /// The caller persists it and restarts.
    Provisioned(Zeroizing<Vec<u8>>),
}

/// Owner of the listener, the client slot and the line buffer.
pub struct ConnectionGate<L: ClientListener> {
    listener: L,
    started: bool,
    client: Option<L::Client>,
    state: SlotState,
    line: LineBuffer,
}

impl<L: ClientListener> ConnectionGate<L> {
    pub fn new(listener: L) -> Self {
        Self {
            listener,
            started: false,
            client: None,
            state: SlotState::Empty,
            line: LineBuffer::new(),
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn is_occupied(&self) -> bool {
        self.client.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.started
    }

    /// Track the network and start listening once it is up.
    ///
    /// Only acts in [`Mode::Running`]. The WLAN LED is lit while the network
    /// is down. The listener is started the first time the network is
    /// connected and is never restarted afterwards.
    pub fn check_network<N, P>(
        &mut self,
        mode: Mode,
        network: &N,
        panel: &mut P,
        stats: &BridgeStats,
    ) where
        N: NetworkProvider,
        P: Panel,
    {
        if mode != Mode::Running {
            return;
        }

        let connected = network.is_connected();
        panel.set_led(Led::Wlan, !connected);

        if !connected || self.started {
            return;
        }

        match self.listener.start() {
            Ok(()) => {
                self.started = true;
                stats.set_listening(true);
                match network.ip_addr() {
                    Some(ip) => info!("Bridge reachable at {}", ip),
                    None => info!("Bridge listening"),
                }
            }
            Err(e) => warn!("Failed to start listener, retrying: {}", e),
        }
    }

    /// Reap a closed client and accept at most one pending connection.
    pub fn check_listener(&mut self, configured: bool, stats: &BridgeStats) {
        if self.client.as_ref().is_some_and(|c| !c.is_connected()) {
            info!("Client disconnected");
            self.disconnect(stats);
        }

        if !self.started {
            return;
        }

        let mut incoming = match self.listener.accept() {
            Ok(Some(client)) => client,
            Ok(None) => return,
            Err(e) => {
                warn!("Accept failed: {}", e);
                return;
            }
        };

        if self.client.is_some() {
            info!("Rejecting {:?}: slot occupied", incoming.peer_addr());
            incoming.abort();
            BridgeStats::record(&stats.clients_rejected);
            return;
        }

        self.line.clear();
        let state = if configured {
            SlotState::PendingAuth
        } else {
            SlotState::PendingInitialConfig
        };
        info!("Client {:?} connected, {}", incoming.peer_addr(), state);
        self.client = Some(incoming);
        self.set_state(state, stats);
        BridgeStats::record(&stats.clients_accepted);
    }

    /// Consume client bytes while a line exchange is pending.
    ///
    /// Stops at the first completed line so bytes after it stay in the
    /// client for the next stage.
    pub fn intake(&mut self, token: Option<&[u8]>, stats: &BridgeStats) -> GateEvent {
        while self.state.is_pending() {
            let Some(client) = self.client.as_mut() else {
                break;
            };

            let byte = match client.read_byte() {
                Ok(Some(byte)) => byte,
                Ok(None) => break,
                Err(e) => {
                    debug!("Client read failed: {}", e);
                    break;
                }
            };

            if self.line.push(byte) == Push::Pending {
                continue;
            }

            if self.line.overflowed() {
                debug!("Line exceeded {} bytes, excess dropped", LINE_CAPACITY - 1);
            }

            if self.state == SlotState::PendingInitialConfig {
                let line = Zeroizing::new(self.line.as_bytes().to_vec());
                self.line.clear();
                info!("Received initial configuration ({} bytes)", line.len());
                BridgeStats::record(&stats.provisioned);
                return GateEvent::Provisioned(line);
            }

            let matches = token == Some(self.line.as_bytes());
            self.line.clear();

            if matches {
                info!("Client authorized");
                self.set_state(SlotState::Authorized, stats);
                BridgeStats::record(&stats.auth_successes);
                return GateEvent::Authorized;
            }

            warn!("Wrong token from {:?}, disconnecting", client.peer_addr());
            BridgeStats::record(&stats.auth_failures);
            self.disconnect(stats);
            return GateEvent::Rejected;
        }

        GateEvent::Idle
    }

    /// The slot client, once it passed the challenge.
    pub fn authorized_client(&mut self) -> Option<&mut L::Client> {
        if self.state != SlotState::Authorized {
            return None;
        }
        self.client.as_mut()
    }

    /// Abort the slot client, if any, and empty the slot.
    pub fn disconnect(&mut self, stats: &BridgeStats) {
        if let Some(mut client) = self.client.take() {
            client.abort();
        }
        self.line.clear();
        self.set_state(SlotState::Empty, stats);
    }

    /// Give back the listener, dropping any client.
    pub fn into_listener(mut self) -> L {
        if let Some(mut client) = self.client.take() {
            client.abort();
        }
        self.listener
    }

    fn set_state(&mut self, state: SlotState, stats: &BridgeStats) {
        if self.state != state {
            debug!("Slot {} -> {}", self.state, state);
            self.state = state;
        }
        stats.set_slot(state);
    }
}
