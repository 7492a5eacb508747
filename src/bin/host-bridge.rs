//! Host bridge for development.
//!
//! Runs the full bridge on a workstation: stdin/stdout stand in for the
//! UART, TCP clients connect on port 29111, and the configuration region is
//! a file (see `SERIAL_BRIDGE_STORE`). A restart re-reads the stored
//! configuration without exiting the process.
//!
//! ```text
//! cargo run --bin host-bridge
//! printf 'secret;9600;8;1;0\r' | nc localhost 29111
//! ```

#[cfg(not(feature = "esp32"))]
fn main() {
    use log::{error, info, warn};
    use serial_bridge_esp32::config::ConfigStore;
    use serial_bridge_esp32::network::HostNetwork;
    use serial_bridge_esp32::panel::HeadlessPanel;
    use serial_bridge_esp32::persistence_host::{default_store_path, FileStore};
    use serial_bridge_esp32::serial::StdioSerial;
    use serial_bridge_esp32::{
        BridgeApp, BridgeStats, Cycle, Peripherals, StatsServer, TcpBridgeListener,
        DEFAULT_STATS_PORT,
    };
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Pause between polling cycles.
    const IDLE_SLEEP: Duration = Duration::from_millis(5);

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== Serial Host Bridge starting ===");

    let path = match default_store_path() {
        Ok(path) => path,
        Err(e) => {
            error!("No store path: {}", e);
            std::process::exit(1);
        }
    };
    let store = match FileStore::open(&path) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open {:?}: {}", path, e);
            std::process::exit(1);
        }
    };
    info!("Configuration store: {:?}", store.path());

    let stats = Arc::new(BridgeStats::new());
    let _stats_server = match StatsServer::start(None, DEFAULT_STATS_PORT, stats.clone()) {
        Ok(server) => {
            info!(
                "Stats server running at http://localhost:{}/stats",
                DEFAULT_STATS_PORT
            );
            Some(server)
        }
        Err(e) => {
            warn!("Failed to start stats server: {}", e);
            warn!("Continuing without stats server");
            None
        }
    };

    let mut store = ConfigStore::load(store);
    let mut peripherals = Peripherals {
        network: HostNetwork::new(),
        listener: TcpBridgeListener::default(),
        serial: StdioSerial::new(),
        panel: HeadlessPanel::new(),
    };

    loop {
        let mut app = BridgeApp::new(store, peripherals, stats.clone());

        while app.poll(Instant::now()) == Cycle::Continue {
            std::thread::sleep(IDLE_SLEEP);
        }

        info!("Restarting");
        (store, peripherals) = app.into_parts();
        store.reload();
        // Release the port before the next boot binds it again.
        peripherals.listener = TcpBridgeListener::default();
    }
}

#[cfg(feature = "esp32")]
fn main() {
    println!("host-bridge runs on the host only; build without the 'esp32' feature.");
}
