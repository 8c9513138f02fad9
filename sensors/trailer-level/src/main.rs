mod config;
mod diagnostics;
mod imu;
mod nvs_storage;
mod report;
mod system;
mod web_server;
mod wifi;

use config::SystemConfig;
use diagnostics::{DiagnosticsState, RateCounter};
use esp_idf_hal::{
    delay::FreeRtos,
    gpio::AnyIOPin,
    i2c::{I2cConfig, I2cDriver},
    peripherals::Peripherals,
    units::Hertz,
};
use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
use imu::Mpu9250Source;
use log::{error, info, warn};
use mpu9250::Mpu9250Config;
use nvs_storage::NvsCalibrationStore;
use system::LevelDevice;
use web_server::LevelServer;
use wifi::WifiManager;

fn main() {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let config = SystemConfig::from_env();

    info!("=== Trailer Level ===");
    info!(
        "SSID: {}, HTTP port: {}, tick: {} ms",
        config.network.wifi_ssid, config.network.http_port, config.tick.tick_interval_ms
    );

    let peripherals = Peripherals::take().expect("peripherals already taken");
    let sysloop = EspSystemEventLoop::take().expect("system event loop unavailable");
    let nvs = EspDefaultNvsPartition::take().expect("NVS partition unavailable");

    // MPU-9250 on I2C0, SDA GPIO13 / SCL GPIO12
    let pins = peripherals.pins;
    let sda: AnyIOPin = pins.gpio13.into();
    let scl: AnyIOPin = pins.gpio12.into();
    let i2c_config = I2cConfig::new().baudrate(Hertz(config.imu.i2c_hz));
    let i2c = I2cDriver::new(peripherals.i2c0, sda, scl, &i2c_config).expect("I2C init failed");

    let source = match Mpu9250Source::new(i2c, config.imu.address, Mpu9250Config::default()) {
        Ok(source) => source,
        Err(e) => {
            // Nothing useful to show without the sensor
            error!("IMU initialization failed: {}", e);
            loop {
                FreeRtos::delay_ms(1000);
            }
        }
    };

    let store = NvsCalibrationStore::new(nvs.clone()).expect("NVS open failed");
    let device = LevelDevice::new(config.engine, source, store);
    {
        let engine = device.engine();
        info!(
            "Engine ready: calibrated={}, hint={}, |g|={:.3}",
            engine.is_calibrated(),
            engine.hint(),
            engine.gravity_magnitude()
        );
    }
    let device = device.into_shared();

    let tick_hz = 1000.0 / config.tick.tick_interval_ms.max(1) as f32;
    let diagnostics = DiagnosticsState::new(config.network.wifi_ssid, tick_hz);

    info!("Initializing WiFi");
    let mut wifi =
        WifiManager::new(peripherals.modem, sysloop.clone(), Some(nvs)).expect("WiFi init failed");
    if let Err(e) = wifi.start_ap(config.network.wifi_ssid, config.network.wifi_password) {
        warn!("WiFi AP failed: {}, running without dashboard", e);
    }

    let _server = match LevelServer::new(config.network.http_port, device.clone(), diagnostics.clone())
    {
        Ok(server) => Some(server),
        Err(e) => {
            warn!("HTTP server failed: {}", e);
            None
        }
    };

    let mut rate = RateCounter::new(system::now_ms());
    let mut last_diag_ms = system::now_ms();

    loop {
        let now = system::now_ms();
        system::lock(&device).tick(now);
        rate.tick();

        if now.wrapping_sub(last_diag_ms) >= config.tick.diagnostics_interval_ms {
            last_diag_ms = now;
            let measured_hz = rate.poll(now, config.tick.diagnostics_interval_ms);
            let wifi_up = wifi.is_up();
            let dev = system::lock(&device);
            let engine = dev.engine();
            diagnostics.update(|d| {
                d.uptime_seconds = now / 1000;
                d.free_heap_bytes = system::free_heap_bytes();
                if let Some(hz) = measured_hz {
                    d.tick_hz = hz;
                }
                d.samples = engine.sample_stats();
                d.calibrated = engine.is_calibrated();
                d.forward_hint = engine.hint();
                d.gravity_magnitude = engine.gravity_magnitude();
                d.temperature_c = dev.temperature_c();
                d.wifi_up = wifi_up;
            });
        }

        FreeRtos::delay_ms(config.tick.tick_interval_ms);
    }
}
