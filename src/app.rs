//! The application state and its polling cycle.
//!
//! [`BridgeApp`] holds every component plus the board peripherals and runs
//! them in a fixed order on each [`BridgeApp::poll`]:
//!
//! 1. menu buttons ([`ModeController`]), WPS negotiation when confirmed
//! 2. network check and one-time listener start
//! 3. reap closed client, accept one connection
//! 4. client to UART, including the token / provisioning exchange
//! 5. UART to client
//!
//! Restarting is left to the caller so the whole cycle runs on the host.

use crate::bridge::BridgeLoop;
use crate::config::{ConfigStore, NonVolatileStore, StoredConfig};
use crate::gate::{ConnectionGate, GateEvent, SlotState};
use crate::mode::{MenuAction, Mode, ModeController};
use crate::network::{BridgeStats, ClientListener, NetworkError, NetworkProvider};
use crate::panel::Panel;
use crate::serial::SerialPort;
use crate::wps::WpsNegotiator;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Instant;

/// What the driver should do after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Continue,
    /// Reboot and read the configuration again.
    Restart,
}

/// Board peripherals handed to the application.
pub struct Peripherals<N, L, U, P> {
    pub network: N,
    pub listener: L,
    pub serial: U,
    pub panel: P,
}

/// Single owner of all bridge state.
pub struct BridgeApp<S, N, L: ClientListener, U, P> {
    store: ConfigStore<S>,
    mode: ModeController,
    wps: WpsNegotiator,
    gate: ConnectionGate<L>,
    bridge: BridgeLoop,
    network: N,
    serial: U,
    panel: P,
    stats: Arc<BridgeStats>,
}

impl<S, N, L, U, P> BridgeApp<S, N, L, U, P>
where
    S: NonVolatileStore,
    N: NetworkProvider,
    L: ClientListener,
    U: SerialPort,
    P: Panel,
{
    /// Set the power-on LEDs and start joining the stored network.
    pub fn new(
        store: ConfigStore<S>,
        peripherals: Peripherals<N, L, U, P>,
        stats: Arc<BridgeStats>,
    ) -> Self {
        let Peripherals {
            mut network,
            listener,
            serial,
            mut panel,
        } = peripherals;

        let mode = ModeController::new();
        mode.boot(&mut panel);

        match network.connect() {
            Ok(()) => {}
            Err(NetworkError::NotConfigured) => info!("No stored network, use WPS to join one"),
            Err(e) => warn!("Network connect failed: {}", e),
        }

        stats.set_mode(mode.mode());
        stats.set_slot(SlotState::Empty);
        stats.set_listening(false);

        Self {
            store,
            mode,
            wps: WpsNegotiator::new(),
            gate: ConnectionGate::new(listener),
            bridge: BridgeLoop::new(),
            network,
            serial,
            panel,
            stats,
        }
    }

    /// Run one cooperative cycle.
    pub fn poll(&mut self, now: Instant) -> Cycle {
        if let Some(action) = self.mode.poll(&mut self.panel, now) {
            match action {
                MenuAction::NegotiateWps => {
                    if self.wps.negotiate(&mut self.network, &mut self.panel, now) {
                        self.mode.enter_running(&mut self.panel);
                    }
                }
                MenuAction::ClearConfiguration => {
                    info!("Clearing configuration");
                    if let Err(e) = self.store.clear() {
                        error!("Failed to clear configuration: {}", e);
                    }
                    return Cycle::Restart;
                }
            }
        }

        let mode = self.mode.mode();
        if mode == Mode::WpsSetup {
            self.wps.tick(&mut self.panel, now);
        } else {
            self.wps.cancel_feedback();
        }
        self.stats.set_mode(mode);

        self.gate
            .check_network(mode, &self.network, &mut self.panel, &self.stats);
        self.gate
            .check_listener(self.store.config().is_configured(), &self.stats);

        let event = self.bridge.client_to_serial(
            mode,
            &mut self.gate,
            &mut self.serial,
            &mut self.panel,
            self.store.config().token(),
            &self.stats,
        );
        if let GateEvent::Provisioned(line) = event {
            if !StoredConfig::from_bytes(&line).is_configured() {
                warn!("Initial configuration is malformed, storing it anyway");
            }
            if let Err(e) = self.store.save(&line) {
                error!("Failed to store configuration: {}", e);
            }
            return Cycle::Restart;
        }

        self.bridge
            .serial_to_client(mode, &mut self.gate, &mut self.serial, &self.stats);

        Cycle::Continue
    }

    pub fn mode(&self) -> Mode {
        self.mode.mode()
    }

    pub fn slot(&self) -> SlotState {
        self.gate.state()
    }

    pub fn is_listening(&self) -> bool {
        self.gate.is_listening()
    }

    /// Configuration read at boot.
    pub fn config(&self) -> &StoredConfig {
        self.store.config()
    }

    pub fn stats(&self) -> &Arc<BridgeStats> {
        &self.stats
    }

    /// Tear down for a restart, dropping any client.
    pub fn into_parts(self) -> (ConfigStore<S>, Peripherals<N, L, U, P>) {
        let listener = self.gate.into_listener();
        (
            self.store,
            Peripherals {
                network: self.network,
                listener,
                serial: self.serial,
                panel: self.panel,
            },
        )
    }
}
