//! MPU-9250 sample source over the ESP-IDF I²C driver

use esp_idf_hal::delay::{FreeRtos, BLOCK};
use esp_idf_hal::i2c::I2cDriver;
use level_fusion::{PartialSample, RawSample, SampleSource, SensorError, Vector3};
use log::{info, warn};
use mpu9250::{
    decode_axis, decode_burst, init_sequence, is_supported_who_am_i, reg, Axis, Mpu9250Config,
    Scale, BURST_LEN, H_RESET,
};

pub struct Mpu9250Source {
    i2c: I2cDriver<'static>,
    address: u8,
    scale: Scale,
    last_temp_c: f32,
}

impl Mpu9250Source {
    /// Probe, reset and configure the device
    pub fn new(
        i2c: I2cDriver<'static>,
        address: u8,
        config: Mpu9250Config,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut source = Self {
            i2c,
            address,
            scale: config.scale(),
            last_temp_c: 0.0,
        };

        let who = source.read_register(reg::WHO_AM_I)?;
        if !is_supported_who_am_i(who) {
            return Err(format!("unexpected WHO_AM_I 0x{:02X} at 0x{:02X}", who, address).into());
        }
        info!("MPU-9250 found at 0x{:02X} (WHO_AM_I 0x{:02X})", address, who);

        source.write_register(reg::PWR_MGMT_1, H_RESET)?;
        FreeRtos::delay_ms(100);

        for (register, value) in init_sequence(&config) {
            source.write_register(register, value)?;
        }
        FreeRtos::delay_ms(20);

        info!(
            "MPU-9250 configured: {:?}, {:?}, {:.0} Hz",
            config.accel_range,
            config.gyro_range,
            config.sample_rate_hz()
        );
        Ok(source)
    }

    /// Die temperature from the last successful burst
    pub fn temperature_c(&self) -> f32 {
        self.last_temp_c
    }

    fn read_register(&mut self, register: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buf, BLOCK)
            .map_err(|_| SensorError::Io("register read"))?;
        Ok(buf[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[register, value], BLOCK)
            .map_err(|_| SensorError::Io("register write"))
    }

    fn read_axis(&mut self, axis: Axis) -> Result<f32, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[axis.register()], &mut buf, BLOCK)
            .map_err(|_| SensorError::Io("axis read"))?;
        Ok(decode_axis(axis, buf, &self.scale))
    }
}

impl SampleSource for Mpu9250Source {
    fn read(&mut self) -> Result<RawSample, SensorError> {
        let mut buf = [0u8; BURST_LEN];
        self.i2c
            .write_read(self.address, &[reg::ACCEL_XOUT_H], &mut buf, BLOCK)
            .map_err(|_| SensorError::Io("burst read"))?;

        let reading = decode_burst(&buf, &self.scale);
        self.last_temp_c = reading.temp_c;
        Ok(RawSample::new(
            Vector3::from(reading.accel),
            Vector3::from(reading.gyro),
        ))
    }

    fn read_direct(&mut self) -> Result<PartialSample, SensorError> {
        let mut partial = PartialSample::default();
        for (slot, axis) in partial.axes.iter_mut().zip(Axis::ALL) {
            match self.read_axis(axis) {
                Ok(v) => *slot = Some(v),
                Err(e) => warn!("{:?}: {}", axis, e),
            }
        }

        if partial.axes.iter().all(Option::is_none) {
            return Err(SensorError::NotReady);
        }
        Ok(partial)
    }

    fn delay_ms(&mut self, ms: u32) {
        FreeRtos::delay_ms(ms);
    }
}
