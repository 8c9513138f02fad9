/// Configuration for the trailer level firmware
///
/// Compile-time overrides come from environment variables, everything else
/// is a fixed default for the reference board.
use level_fusion::EngineConfig;

/// Network configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Access point name
    pub wifi_ssid: &'static str,
    /// WPA2 passphrase (empty for an open network)
    pub wifi_password: &'static str,
    /// HTTP server port
    pub http_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: "TrailerLevel",
            wifi_password: "password",
            http_port: 80,
        }
    }
}

/// MPU-9250 bus settings (pins are fixed in `main`: SDA 13, SCL 12)
#[derive(Debug, Clone, Copy)]
pub struct ImuConfig {
    pub address: u8,
    pub i2c_hz: u32,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            address: mpu9250::DEFAULT_ADDRESS,
            i2c_hz: 400_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    pub tick_interval_ms: u32,
    /// Diagnostics refresh period
    pub diagnostics_interval_ms: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 20, // 50 Hz
            diagnostics_interval_ms: 1000,
        }
    }
}

/// Complete system configuration
#[derive(Debug, Clone, Default)]
pub struct SystemConfig {
    pub network: NetworkConfig,
    pub imu: ImuConfig,
    pub tick: LoopConfig,
    pub engine: EngineConfig,
}

impl SystemConfig {
    /// Create configuration from environment variables (compile-time)
    ///
    /// ```bash
    /// export WIFI_SSID="MyTrailer"
    /// export WIFI_PASSWORD="hunter22"
    /// export HTTP_PORT="8080"
    /// cargo build --release
    /// ```
    ///
    /// Unset variables keep the defaults ("TrailerLevel" / "password",
    /// port 80). An unparsable port is ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ssid) = option_env!("WIFI_SSID") {
            config.network.wifi_ssid = ssid;
        }
        if let Some(password) = option_env!("WIFI_PASSWORD") {
            config.network.wifi_password = password;
        }
        if let Some(port) = option_env!("HTTP_PORT").and_then(|p| p.parse().ok()) {
            config.network.http_port = port;
        }

        config
    }
}
