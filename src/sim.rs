//! Simulated peripherals for host tests.
//!
//! Every simulator is a cheap handle over shared state: hand one clone to
//! the code under test and keep another to drive and inspect it.

use crate::app::{BridgeApp, Cycle, Peripherals};
use crate::config::{ConfigStore, NonVolatileStore, StorageError, CONFIG_SIZE, ERASED_BYTE};
use crate::network::{BridgeStats, ClientListener, ClientStream, NetworkError, NetworkProvider};
use crate::panel::{Button, Led, Panel};
use crate::serial::{SerialError, SerialPort};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Non-volatile store
// ---------------------------------------------------------------------------

struct MemoryInner {
    bytes: [u8; CONFIG_SIZE],
    commits: usize,
    fail_commits: bool,
}

/// RAM-backed [`NonVolatileStore`].
#[derive(Clone)]
pub struct MemoryStore(Rc<RefCell<MemoryInner>>);

impl MemoryStore {
    pub fn erased() -> Self {
        Self(Rc::new(RefCell::new(MemoryInner {
            bytes: [ERASED_BYTE; CONFIG_SIZE],
            commits: 0,
            fail_commits: false,
        })))
    }

    /// A region holding `contents` followed by a NUL.
    pub fn with_contents(contents: &[u8]) -> Self {
        let store = Self::erased();
        {
            let mut inner = store.0.borrow_mut();
            inner.bytes[..contents.len()].copy_from_slice(contents);
            inner.bytes[contents.len()] = 0;
        }
        store
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.borrow().bytes.to_vec()
    }

    pub fn commits(&self) -> usize {
        self.0.borrow().commits
    }

    pub fn fail_commits(&self, fail: bool) {
        self.0.borrow_mut().fail_commits = fail;
    }
}

impl NonVolatileStore for MemoryStore {
    fn read(&self, addr: usize) -> u8 {
        self.0.borrow().bytes[addr]
    }

    fn write(&mut self, addr: usize, value: u8) {
        self.0.borrow_mut().bytes[addr] = value;
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let mut inner = self.0.borrow_mut();
        inner.commits += 1;
        if inner.fail_commits {
            return Err(StorageError::VerificationFailed);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[derive(Default)]
struct NetworkInner {
    connected: bool,
    connects: usize,
    negotiations: usize,
    next_negotiation: Option<Result<String, NetworkError>>,
}

/// Network whose link state and WPS outcome are set by the test.
///
/// An unset WPS outcome fails.
#[derive(Clone, Default)]
pub struct SimNetwork(Rc<RefCell<NetworkInner>>);

impl SimNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&self, connected: bool) {
        self.0.borrow_mut().connected = connected;
    }

    pub fn set_negotiation(&self, outcome: Result<String, NetworkError>) {
        self.0.borrow_mut().next_negotiation = Some(outcome);
    }

    pub fn connects(&self) -> usize {
        self.0.borrow().connects
    }

    pub fn negotiations(&self) -> usize {
        self.0.borrow().negotiations
    }
}

impl NetworkProvider for SimNetwork {
    fn connect(&mut self) -> Result<(), NetworkError> {
        self.0.borrow_mut().connects += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.0.borrow().connected
    }

    fn ip_addr(&self) -> Option<IpAddr> {
        self.is_connected()
            .then_some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)))
    }

    fn begin_negotiation(&mut self) -> Result<String, NetworkError> {
        let mut inner = self.0.borrow_mut();
        inner.negotiations += 1;
        let outcome = inner
            .next_negotiation
            .take()
            .unwrap_or_else(|| Err(NetworkError::NegotiationFailed("no access point".into())));
        if matches!(&outcome, Ok(ssid) if !ssid.is_empty()) {
            inner.connected = true;
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// TCP
// ---------------------------------------------------------------------------

struct Wire {
    to_server: VecDeque<u8>,
    to_peer: Vec<u8>,
    write_budget: usize,
    closed_by_peer: bool,
    aborted: bool,
}

/// Server side of a simulated connection.
pub struct SimClient {
    wire: Rc<RefCell<Wire>>,
    peer: SocketAddr,
}

/// Test side of a simulated connection.
#[derive(Clone)]
pub struct SimPeer(Rc<RefCell<Wire>>);

impl SimPeer {
    pub fn send(&self, data: &[u8]) {
        self.0.borrow_mut().to_server.extend(data);
    }

    /// Everything the bridge has sent so far.
    pub fn received(&self) -> Vec<u8> {
        self.0.borrow().to_peer.clone()
    }

    /// Bytes sent by the peer that the bridge has not read.
    pub fn unread(&self) -> Vec<u8> {
        self.0.borrow().to_server.iter().copied().collect()
    }

    /// Bytes the bridge may still write before the socket is full.
    pub fn set_write_capacity(&self, bytes: usize) {
        self.0.borrow_mut().write_budget = bytes;
    }

    pub fn close(&self) {
        self.0.borrow_mut().closed_by_peer = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.0.borrow().aborted
    }
}

impl ClientStream for SimClient {
    fn read_byte(&mut self) -> Result<Option<u8>, NetworkError> {
        let mut wire = self.wire.borrow_mut();
        if wire.aborted {
            return Ok(None);
        }
        Ok(wire.to_server.pop_front())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, NetworkError> {
        let mut wire = self.wire.borrow_mut();
        if wire.aborted || wire.closed_by_peer {
            return Ok(0);
        }
        let n = data.len().min(wire.write_budget);
        wire.write_budget -= n;
        wire.to_peer.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn is_connected(&self) -> bool {
        let wire = self.wire.borrow();
        !wire.aborted && !wire.closed_by_peer
    }

    fn abort(&mut self) {
        self.wire.borrow_mut().aborted = true;
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}

#[derive(Default)]
struct ListenerInner {
    started: bool,
    starts: usize,
    failing_starts: usize,
    pending: VecDeque<SimClient>,
    next_port: u16,
}

/// Listener fed by [`SimListener::connect`].
#[derive(Clone, Default)]
pub struct SimListener(Rc<RefCell<ListenerInner>>);

impl SimListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an incoming connection and return its test side.
    pub fn connect(&self) -> SimPeer {
        let wire = Rc::new(RefCell::new(Wire {
            to_server: VecDeque::new(),
            to_peer: Vec::new(),
            write_budget: usize::MAX,
            closed_by_peer: false,
            aborted: false,
        }));

        let mut inner = self.0.borrow_mut();
        inner.next_port += 1;
        let peer = SocketAddr::from((Ipv4Addr::new(192, 168, 1, 10), 40000 + inner.next_port));
        inner.pending.push_back(SimClient {
            wire: wire.clone(),
            peer,
        });
        SimPeer(wire)
    }

    pub fn starts(&self) -> usize {
        self.0.borrow().starts
    }

    pub fn fail_next_starts(&self, count: usize) {
        self.0.borrow_mut().failing_starts = count;
    }
}

impl ClientListener for SimListener {
    type Client = SimClient;

    fn start(&mut self) -> Result<(), NetworkError> {
        let mut inner = self.0.borrow_mut();
        inner.starts += 1;
        if inner.failing_starts > 0 {
            inner.failing_starts -= 1;
            return Err(NetworkError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                "port busy",
            )));
        }
        inner.started = true;
        Ok(())
    }

    fn accept(&mut self) -> Result<Option<SimClient>, NetworkError> {
        let mut inner = self.0.borrow_mut();
        if !inner.started {
            return Err(NetworkError::NotListening);
        }
        Ok(inner.pending.pop_front())
    }
}

// ---------------------------------------------------------------------------
// UART
// ---------------------------------------------------------------------------

struct SerialInner {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    write_capacity: usize,
    failing_writes: usize,
}

/// UART with injectable input and recorded output.
#[derive(Clone)]
pub struct SimSerial(Rc<RefCell<SerialInner>>);

impl SimSerial {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(SerialInner {
            rx: VecDeque::new(),
            tx: Vec::new(),
            write_capacity: 128,
            failing_writes: 0,
        })))
    }

    /// Bytes arriving from the serial device.
    pub fn inject(&self, data: &[u8]) {
        self.0.borrow_mut().rx.extend(data);
    }

    /// Everything written towards the serial device.
    pub fn written(&self) -> Vec<u8> {
        self.0.borrow().tx.clone()
    }

    pub fn unread(&self) -> usize {
        self.0.borrow().rx.len()
    }

    /// Free TX space reported on every query.
    pub fn set_write_capacity(&self, bytes: usize) {
        self.0.borrow_mut().write_capacity = bytes;
    }

    /// Fail the next `count` writes while still reporting free space.
    pub fn fail_next_writes(&self, count: usize) {
        self.0.borrow_mut().failing_writes = count;
    }
}

impl Default for SimSerial {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPort for SimSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let mut inner = self.0.borrow_mut();
        let n = buf.len().min(inner.rx.len());
        for (slot, byte) in buf.iter_mut().zip(inner.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, SerialError> {
        let mut inner = self.0.borrow_mut();
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(SerialError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated UART fault",
            )));
        }
        let n = data.len().min(inner.write_capacity);
        inner.tx.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn available_for_write(&self) -> Result<usize, SerialError> {
        Ok(self.0.borrow().write_capacity)
    }
}

// ---------------------------------------------------------------------------
// Panel
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PanelInner {
    leds: [bool; 3],
    led_writes: [usize; 3],
    menu: bool,
    confirm: bool,
}

/// Panel with scriptable buttons.
#[derive(Clone, Default)]
pub struct SimPanel(Rc<RefCell<PanelInner>>);

impl SimPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn led(&self, led: Led) -> bool {
        self.0.borrow().leds[led.index()]
    }

    /// Power, Wlan, Active.
    pub fn leds(&self) -> [bool; 3] {
        self.0.borrow().leds
    }

    /// Number of writes to an LED, changed or not.
    pub fn led_writes(&self, led: Led) -> usize {
        self.0.borrow().led_writes[led.index()]
    }

    pub fn hold(&self, button: Button) {
        self.set_button(button, true);
    }

    pub fn release(&self, button: Button) {
        self.set_button(button, false);
    }

    fn set_button(&self, button: Button, pressed: bool) {
        let mut inner = self.0.borrow_mut();
        match button {
            Button::Menu => inner.menu = pressed,
            Button::Confirm => inner.confirm = pressed,
        }
    }
}

impl Panel for SimPanel {
    fn set_led(&mut self, led: Led, on: bool) {
        let mut inner = self.0.borrow_mut();
        inner.leds[led.index()] = on;
        inner.led_writes[led.index()] += 1;
    }

    fn is_pressed(&mut self, button: Button) -> bool {
        let inner = self.0.borrow();
        match button {
            Button::Menu => inner.menu,
            Button::Confirm => inner.confirm,
        }
    }
}

// ---------------------------------------------------------------------------
// Whole device
// ---------------------------------------------------------------------------

/// Time advanced per simulated cycle.
pub const CYCLE: Duration = Duration::from_millis(10);

pub type SimApp = BridgeApp<MemoryStore, SimNetwork, SimListener, SimSerial, SimPanel>;

/// A booted device on simulated hardware with a simulated clock.
pub struct Harness {
    pub app: SimApp,
    pub store: MemoryStore,
    pub network: SimNetwork,
    pub listener: SimListener,
    pub serial: SimSerial,
    pub panel: SimPanel,
    pub stats: Arc<BridgeStats>,
    pub now: Instant,
}

impl Harness {
    /// Boot with the given region contents on a connected network.
    pub fn boot(store: MemoryStore) -> Self {
        let network = SimNetwork::new();
        network.set_connected(true);
        Self::boot_with(store, network)
    }

    pub fn boot_with(store: MemoryStore, network: SimNetwork) -> Self {
        let listener = SimListener::new();
        let serial = SimSerial::new();
        let panel = SimPanel::new();
        let stats = Arc::new(BridgeStats::new());

        let app = BridgeApp::new(
            ConfigStore::load(store.clone()),
            Peripherals {
                network: network.clone(),
                listener: listener.clone(),
                serial: serial.clone(),
                panel: panel.clone(),
            },
            stats.clone(),
        );

        Self {
            app,
            store,
            network,
            listener,
            serial,
            panel,
            stats,
            now: Instant::now(),
        }
    }

    /// Boot again from what is stored, as after a restart.
    pub fn restart(self) -> Self {
        Self::boot_with(self.store, self.network)
    }

    pub fn cycle(&mut self) -> Cycle {
        let result = self.app.poll(self.now);
        self.now += CYCLE;
        result
    }

    /// Run `count` cycles, stopping early on a restart request.
    pub fn cycles(&mut self, count: usize) -> Cycle {
        for _ in 0..count {
            if self.cycle() == Cycle::Restart {
                return Cycle::Restart;
            }
        }
        Cycle::Continue
    }

    /// Press and release a button, then let the debounce window pass.
    pub fn press(&mut self, button: Button) -> Cycle {
        self.panel.hold(button);
        if self.cycle() == Cycle::Restart {
            return Cycle::Restart;
        }
        self.panel.release(button);
        let result = self.cycle();
        self.now += crate::mode::DEBOUNCE_WINDOW;
        result
    }

    /// Open a connection and let the device accept it.
    pub fn connect(&mut self) -> SimPeer {
        let peer = self.listener.connect();
        self.cycle();
        peer
    }
}
