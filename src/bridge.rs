//! Byte forwarding between the authorized client and the UART.
//!
//! Nothing is forwarded outside [`Mode::Running`]. Each pass does a bounded
//! amount of work and never waits: when the destination cannot take more
//! bytes the pass ends and the rest moves on the next cycle.

use crate::gate::{ConnectionGate, GateEvent, SlotState};
use crate::mode::Mode;
use crate::network::{BridgeStats, ClientListener, ClientStream};
use crate::panel::{Led, Panel};
use crate::serial::SerialPort;
use log::{debug, warn};

/// UART bytes read per cycle.
pub const SERIAL_CHUNK: usize = 256;

/// The two forwarding passes.
pub struct BridgeLoop {
    /// UART bytes the client has not taken yet.
    pending: [u8; SERIAL_CHUNK],
    pending_start: usize,
    pending_end: usize,
    /// Client byte the UART refused, retried first next cycle.
    stash: Option<u8>,
}

impl BridgeLoop {
    pub fn new() -> Self {
        Self {
            pending: [0; SERIAL_CHUNK],
            pending_start: 0,
            pending_end: 0,
            stash: None,
        }
    }

    /// Bytes read from the UART but not yet sent to the client.
    pub fn pending_len(&self) -> usize {
        self.pending_end - self.pending_start
    }

    /// Client to UART.
    ///
    /// Lights the activity LED while a client holds the slot. Pending
    /// exchanges are handed to the gate; once authorized, client bytes go to
    /// the UART as long as it has room.
    pub fn client_to_serial<L, U, P>(
        &mut self,
        mode: Mode,
        gate: &mut ConnectionGate<L>,
        serial: &mut U,
        panel: &mut P,
        token: Option<&[u8]>,
        stats: &BridgeStats,
    ) -> GateEvent
    where
        L: ClientListener,
        U: SerialPort,
        P: Panel,
    {
        if mode != Mode::Running {
            return GateEvent::Idle;
        }

        panel.set_led(Led::Active, gate.is_occupied());

        let event = match gate.state() {
            SlotState::Empty => {
                self.stash = None;
                return GateEvent::Idle;
            }
            SlotState::PendingInitialConfig | SlotState::PendingAuth => {
                self.stash = None;
                match gate.intake(token, stats) {
                    GateEvent::Authorized => GateEvent::Authorized,
                    other => return other,
                }
            }
            SlotState::Authorized => GateEvent::Idle,
        };

        let Some(client) = gate.authorized_client() else {
            return event;
        };

        let mut forwarded = 0;
        loop {
            match serial.available_for_write() {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("UART not writable: {}", e);
                    break;
                }
            }

            let byte = match self.stash.take() {
                Some(byte) => byte,
                None => match client.read_byte() {
                    Ok(Some(byte)) => byte,
                    Ok(None) => break,
                    Err(e) => {
                        debug!("Client read failed: {}", e);
                        break;
                    }
                },
            };

            match serial.write(&[byte]) {
                Ok(0) => {
                    warn!("UART refused a byte despite free space");
                    self.stash = Some(byte);
                    break;
                }
                Ok(_) => forwarded += 1,
                Err(e) => {
                    warn!("UART write failed: {}", e);
                    self.stash = Some(byte);
                    break;
                }
            }
        }

        BridgeStats::add(&stats.bytes_to_serial, forwarded);
        event
    }

    /// UART to client, only for an authorized client.
    pub fn serial_to_client<L, U>(
        &mut self,
        mode: Mode,
        gate: &mut ConnectionGate<L>,
        serial: &mut U,
        stats: &BridgeStats,
    ) where
        L: ClientListener,
        U: SerialPort,
    {
        if mode != Mode::Running {
            return;
        }

        let Some(client) = gate.authorized_client() else {
            if self.pending_len() > 0 {
                debug!("Dropping {} UART bytes, no client", self.pending_len());
            }
            self.pending_start = 0;
            self.pending_end = 0;
            return;
        };

        if self.pending_len() == 0 {
            match serial.read(&mut self.pending) {
                Ok(n) => {
                    self.pending_start = 0;
                    self.pending_end = n;
                }
                Err(e) => {
                    warn!("UART read failed: {}", e);
                    return;
                }
            }
        }

        while self.pending_start < self.pending_end {
            match client.write(&self.pending[self.pending_start..self.pending_end]) {
                Ok(0) => break,
                Ok(n) => {
                    self.pending_start += n;
                    BridgeStats::add(&stats.bytes_to_client, n);
                }
                Err(e) => {
                    debug!("Client write failed: {}", e);
                    break;
                }
            }
        }
    }
}

impl Default for BridgeLoop {
    fn default() -> Self {
        Self::new()
    }
}
