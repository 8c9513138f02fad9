use esp_idf_hal::peripheral;
/// WiFi access point for the phone dashboard
use esp_idf_svc::wifi::{AccessPointConfiguration, AuthMethod, BlockingWifi, Configuration, EspWifi};
use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
use log::info;

pub struct WifiManager {
    wifi: BlockingWifi<EspWifi<'static>>,
}

impl WifiManager {
    pub fn new(
        modem: impl peripheral::Peripheral<P = esp_idf_hal::modem::Modem> + 'static,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let wifi = BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), nvs)?, sysloop)?;
        Ok(Self { wifi })
    }

    /// Start the access point; clients reach the device at the AP gateway
    /// address (192.168.71.1 by default)
    pub fn start_ap(
        &mut self,
        ssid: &str,
        password: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        info!(
            "Starting AP '{}', password: {}",
            ssid,
            if password.is_empty() { "(open)" } else { "****" }
        );

        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let wifi_config = Configuration::AccessPoint(AccessPointConfiguration {
            ssid: ssid.try_into().map_err(|_| "SSID too long")?,
            password: password.try_into().map_err(|_| "password too long")?,
            auth_method,
            channel: 6,
            max_connections: 4,
            ..Default::default()
        });

        self.wifi.set_configuration(&wifi_config)?;
        self.wifi.start()?;
        self.wifi.wait_netif_up()?;

        let ip_info = self.wifi.wifi().ap_netif().get_ip_info()?;
        info!("WiFi AP up, dashboard at http://{}/", ip_info.ip);
        Ok(())
    }

    pub fn is_up(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }
}
