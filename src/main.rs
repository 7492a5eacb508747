//! Serial bridge ESP32 firmware binary.

#[cfg(feature = "esp32")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin};
    use esp_idf_hal::peripherals::Peripherals as Board;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::{info, warn};
    use serial_bridge_esp32::config::ConfigStore;
    use serial_bridge_esp32::network::{WifiNetwork, DEFAULT_STATS_PORT};
    use serial_bridge_esp32::panel::{GpioPanel, PanelPins};
    use serial_bridge_esp32::persistence::NvsStore;
    use serial_bridge_esp32::serial::UartPort;
    use serial_bridge_esp32::{BridgeApp, BridgeStats, Cycle, Peripherals, StatsServer};
    use serial_bridge_esp32::TcpBridgeListener;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Pause between polling cycles.
    const IDLE_SLEEP: Duration = Duration::from_millis(10);

    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    // Initialize ESP-IDF logger for log crate integration
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("=== Serial bridge starting ===");

    let board = Board::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let store = ConfigStore::load(NvsStore::open(nvs.clone())?);
    let framing = store.config().framing();

    let panel = GpioPanel::new(PanelPins {
        power_led: AnyOutputPin::from(board.pins.gpio25),
        wlan_led: AnyOutputPin::from(board.pins.gpio26),
        active_led: AnyOutputPin::from(board.pins.gpio27),
        menu_button: AnyIOPin::from(board.pins.gpio32),
        confirm_button: AnyIOPin::from(board.pins.gpio33),
    })?;
    let serial = UartPort::new(board.uart1, board.pins.gpio17, board.pins.gpio16, &framing)?;
    let network = WifiNetwork::new(board.modem, sysloop, nvs)?;

    let stats = Arc::new(BridgeStats::new());
    let _stats_server = match StatsServer::start(None, DEFAULT_STATS_PORT, stats.clone()) {
        Ok(server) => Some(server),
        Err(e) => {
            warn!("Failed to start stats server: {}", e);
            None
        }
    };

    let mut app = BridgeApp::new(
        store,
        Peripherals {
            network,
            listener: TcpBridgeListener::default(),
            serial,
            panel,
        },
        stats,
    );

    info!("Entering main loop...");
    loop {
        if app.poll(Instant::now()) == Cycle::Restart {
            info!("Restarting");
            esp_idf_hal::reset::restart();
        }
        std::thread::sleep(IDLE_SLEEP);
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-bridge' to run the bridge on the host.");
}
