//! ESP32 WiFi network provider.
//!
//! Credentials are kept by the ESP-IDF WiFi driver in its own NVS
//! namespace. They are obtained via WPS push-button negotiation from the
//! panel and reused on every boot.

use super::{NetworkError, NetworkProvider};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    BlockingWifi, ClientConfiguration, Configuration, EspWifi, WpsConfig, WpsFactoryInfo,
    WpsStatus, WpsType,
};
use log::{info, warn};
use std::net::IpAddr;

/// Identity announced during WPS negotiation.
const WPS_CONFIG: WpsConfig = WpsConfig {
    wps_type: WpsType::Pbc,
    factory_info: WpsFactoryInfo {
        manufacturer: "SerialBridge",
        model_number: "esp32",
        model_name: "Serial Bridge",
        device_name: "serial-bridge",
    },
};

/// WiFi-based network provider for ESP32.
pub struct WifiNetwork<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
}

impl<'a> WifiNetwork<'a> {
    /// Create a new WiFi network provider.
    ///
    /// # Arguments
    ///
    /// * `modem` - The WiFi/BT modem peripheral
    /// * `sysloop` - The ESP-IDF system event loop
    /// * `nvs` - Partition the driver stores its credentials in
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self, NetworkError> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

        Ok(Self { wifi })
    }

    /// SSID of the credentials stored by the driver, if any.
    pub fn stored_ssid(&self) -> Option<String> {
        match self.wifi.get_configuration() {
            Ok(Configuration::Client(client)) if !client.ssid.is_empty() => {
                Some(client.ssid.to_string())
            }
            _ => None,
        }
    }

    fn ensure_started(&mut self) -> Result<(), NetworkError> {
        if !matches!(
            self.wifi.get_configuration()?,
            Configuration::Client(_)
        ) {
            self.wifi
                .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        }
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        Ok(())
    }
}

impl NetworkProvider for WifiNetwork<'_> {
    fn connect(&mut self) -> Result<(), NetworkError> {
        let ssid = self.stored_ssid().ok_or(NetworkError::NotConfigured)?;
        self.ensure_started()?;

        info!("Connecting to stored network: {}", ssid);
        // Non-blocking; `is_connected` reports when the station is up.
        self.wifi.wifi_mut().connect()?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn ip_addr(&self) -> Option<IpAddr> {
        if !self.is_connected() {
            return None;
        }
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| IpAddr::V4(info.ip))
    }

    fn begin_negotiation(&mut self) -> Result<String, NetworkError> {
        self.ensure_started()?;
        if self.is_connected() {
            if let Err(e) = self.wifi.disconnect() {
                warn!("Failed to leave current network before WPS: {:?}", e);
            }
        }

        info!("Starting WPS push-button negotiation");
        match self.wifi.start_wps(&WPS_CONFIG)? {
            WpsStatus::SuccessConnected => {}
            WpsStatus::SuccessMultipleAccessPoints(credentials) => {
                let first = credentials
                    .first()
                    .ok_or_else(|| NetworkError::NegotiationFailed("no credentials".into()))?;
                self.wifi
                    .set_configuration(&Configuration::Client(ClientConfiguration {
                        ssid: first.ssid.clone(),
                        password: first.passphrase.clone(),
                        ..Default::default()
                    }))?;
                self.wifi.wifi_mut().connect()?;
            }
            other => return Err(NetworkError::NegotiationFailed(format!("{:?}", other))),
        }

        Ok(self.stored_ssid().unwrap_or_default())
    }
}
