//! HTTP stats server for bridge monitoring.
//!
//! Provides a simple `/stats` endpoint that returns bridge statistics as JSON.
//! Uses `tiny_http` which works on both host and ESP32 (via std::net).
//!
//! # Example Response
//!
//! ```json
//! {
//!   "uptime_secs": 3600,
//!   "mode": "running",
//!   "slot": "authorized",
//!   "listening": true,
//!   "bytes": { "to_serial": 1520, "to_client": 88012 },
//!   "clients": { "accepted": 4, "rejected_busy": 1 },
//!   "auth": { "successes": 3, "failures": 1, "provisioned": 0 }
//! }
//! ```

use crate::gate::SlotState;
use crate::mode::Mode;
use log::{error, info, warn};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tiny_http::{Method, Response, Server};

/// Default port for the stats server.
pub const DEFAULT_STATS_PORT: u16 = 8080;

/// Bridge statistics container.
///
/// Written by the polling loop, read by the stats server thread. All fields
/// are atomics so neither side ever blocks the other.
#[derive(Debug)]
pub struct BridgeStats {
    /// When the bridge started.
    start_time: Instant,
    mode: AtomicU8,
    slot: AtomicU8,
    listening: AtomicBool,
    /// Bytes forwarded from the TCP client to the UART.
    pub bytes_to_serial: AtomicUsize,
    /// Bytes forwarded from the UART to the TCP client.
    pub bytes_to_client: AtomicUsize,
    /// Connections that took the slot.
    pub clients_accepted: AtomicUsize,
    /// Connections torn down because the slot was occupied.
    pub clients_rejected: AtomicUsize,
    pub auth_successes: AtomicUsize,
    pub auth_failures: AtomicUsize,
    /// Initial configuration lines received.
    pub provisioned: AtomicUsize,
}

impl BridgeStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            mode: AtomicU8::new(Mode::Running.to_u8()),
            slot: AtomicU8::new(SlotState::Empty.to_u8()),
            listening: AtomicBool::new(false),
            bytes_to_serial: AtomicUsize::new(0),
            bytes_to_client: AtomicUsize::new(0),
            clients_accepted: AtomicUsize::new(0),
            clients_rejected: AtomicUsize::new(0),
            auth_successes: AtomicUsize::new(0),
            auth_failures: AtomicUsize::new(0),
            provisioned: AtomicUsize::new(0),
        }
    }

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn set_mode(&self, mode: Mode) {
        self.mode.store(mode.to_u8(), Ordering::Relaxed);
    }

    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set_slot(&self, slot: SlotState) {
        self.slot.store(slot.to_u8(), Ordering::Relaxed);
    }

    pub fn slot(&self) -> SlotState {
        SlotState::from_u8(self.slot.load(Ordering::Relaxed)).unwrap_or(SlotState::Empty)
    }

    pub fn set_listening(&self, listening: bool) {
        self.listening.store(listening, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicUsize, amount: usize) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn record(counter: &AtomicUsize) {
        Self::add(counter, 1);
    }

    /// Serialize all statistics to JSON.
    pub fn to_json(&self) -> String {
        format!(
            r#"{{"uptime_secs":{},"mode":"{}","slot":"{}","listening":{},"bytes":{{"to_serial":{},"to_client":{}}},"clients":{{"accepted":{},"rejected_busy":{}}},"auth":{{"successes":{},"failures":{},"provisioned":{}}}}}"#,
            self.uptime_secs(),
            self.mode(),
            self.slot(),
            self.listening.load(Ordering::Relaxed),
            self.bytes_to_serial.load(Ordering::Relaxed),
            self.bytes_to_client.load(Ordering::Relaxed),
            self.clients_accepted.load(Ordering::Relaxed),
            self.clients_rejected.load(Ordering::Relaxed),
            self.auth_successes.load(Ordering::Relaxed),
            self.auth_failures.load(Ordering::Relaxed),
            self.provisioned.load(Ordering::Relaxed)
        )
    }
}

impl Default for BridgeStats {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP stats server.
///
/// Runs in a background thread and serves bridge statistics as JSON.
pub struct StatsServer {
    /// Server thread handle.
    handle: Option<thread::JoinHandle<()>>,
    /// Flag to signal shutdown.
    shutdown: Arc<AtomicBool>,
}

impl StatsServer {
    /// Start the stats server.
    ///
    /// # Arguments
    ///
    /// * `bind_addr` - IP address to bind to (use `None` for 0.0.0.0)
    /// * `port` - Port to listen on
    /// * `stats` - Shared statistics to serve
    ///
    /// # Returns
    ///
    /// A handle to the running server. Drop it to stop the server.
    pub fn start(
        bind_addr: Option<IpAddr>,
        port: u16,
        stats: Arc<BridgeStats>,
    ) -> Result<Self, std::io::Error> {
        let addr = match bind_addr {
            Some(ip) => format!("{}:{}", ip, port),
            None => format!("0.0.0.0:{}", port),
        };

        let server = Server::http(&addr)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::AddrInUse, format!("{}", e)))?;

        info!("Stats server listening on http://{}/stats", addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let handle = thread::spawn(move || {
            Self::run_server(server, stats, shutdown_clone);
        });

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    fn run_server(server: Server, stats: Arc<BridgeStats>, shutdown: Arc<AtomicBool>) {
        let content_type =
            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("static header");
        let location =
            tiny_http::Header::from_bytes(&b"Location"[..], &b"/stats"[..]).expect("static header");
        let allow_get =
            tiny_http::Header::from_bytes(&b"Allow"[..], &b"GET"[..]).expect("static header");

        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Stats server shutting down");
                break;
            }

            match server.recv_timeout(std::time::Duration::from_millis(100)) {
                Ok(Some(request)) => {
                    if request.method() != &Method::Get {
                        let response = Response::from_string("Method Not Allowed")
                            .with_status_code(405)
                            .with_header(allow_get.clone());
                        let _ = request.respond(response);
                        continue;
                    }

                    let response = match request.url() {
                        "/stats" | "/stats/" => Response::from_string(stats.to_json())
                            .with_header(content_type.clone())
                            .with_status_code(200),
                        "/" => Response::from_string("See /stats for bridge statistics")
                            .with_status_code(302)
                            .with_header(location.clone()),
                        _ => Response::from_string("Not Found").with_status_code(404),
                    };

                    if let Err(e) = request.respond(response) {
                        warn!("Failed to send response: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Server error: {}", e);
                    break;
                }
            }
        }
    }

    /// Stop the server.
    ///
    /// Note: May take up to 100ms due to polling interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatsServer {
    fn drop(&mut self) {
        self.stop();
    }
}
