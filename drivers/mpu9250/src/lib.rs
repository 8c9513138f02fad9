//! MPU-9250 Accelerometer/Gyroscope Register Driver
//!
//! Register map, configuration encoding and raw-count decoding for the
//! InvenSense MPU-9250 over I²C. No bus access lives here: the firmware
//! owns the I²C driver and calls into this crate to build register writes
//! and to turn raw bytes into physical units.
//!
//! # Features
//!
//! - Burst decode of the 14-byte ACCEL_XOUT_H..GYRO_ZOUT_L block
//! - Per-axis decode for single-register recovery reads
//! - Full-scale range encoding and sensitivity
//! - `no_std` compatible
//! - No external dependencies
//!
//! # Example
//!
//! ```ignore
//! use mpu9250::{decode_burst, init_sequence, reg, Mpu9250Config, DEFAULT_ADDRESS};
//!
//! let config = Mpu9250Config::default();
//! for (register, value) in init_sequence(&config) {
//!     i2c.write(DEFAULT_ADDRESS, &[register, value])?;
//! }
//!
//! let mut buf = [0u8; BURST_LEN];
//! i2c.write_read(DEFAULT_ADDRESS, &[reg::ACCEL_XOUT_H], &mut buf)?;
//! let reading = decode_burst(&buf, &config.scale());
//! println!("az = {} g", reading.accel[2]);
//! ```

#![cfg_attr(not(test), no_std)]

/// Default 7-bit I²C address (AD0 low)
pub const DEFAULT_ADDRESS: u8 = 0x68;
/// Alternate I²C address (AD0 high)
pub const ALT_ADDRESS: u8 = 0x69;

/// Bytes in an accel + temp + gyro burst read
pub const BURST_LEN: usize = 14;

/// Register addresses
pub mod reg {
    pub const SMPLRT_DIV: u8 = 0x19;
    pub const CONFIG: u8 = 0x1A;
    pub const GYRO_CONFIG: u8 = 0x1B;
    pub const ACCEL_CONFIG: u8 = 0x1C;
    pub const ACCEL_CONFIG2: u8 = 0x1D;
    pub const INT_PIN_CFG: u8 = 0x37;
    pub const ACCEL_XOUT_H: u8 = 0x3B;
    pub const TEMP_OUT_H: u8 = 0x41;
    pub const GYRO_XOUT_H: u8 = 0x43;
    pub const PWR_MGMT_1: u8 = 0x6B;
    pub const PWR_MGMT_2: u8 = 0x6C;
    pub const WHO_AM_I: u8 = 0x75;
}

/// WHO_AM_I values of parts that share this register map
pub const WHO_AM_I_VALUES: [u8; 3] = [
    0x71, // MPU-9250
    0x73, // MPU-9255
    0x70, // MPU-6500 die without magnetometer
];

/// PWR_MGMT_1: auto-select best clock (PLL when gyro is ready)
const CLKSEL_AUTO: u8 = 0x01;
/// PWR_MGMT_1: device reset
pub const H_RESET: u8 = 0x80;

/// Temperature sensitivity (LSB/°C) and offset (°C) from the datasheet
const TEMP_SENSITIVITY: f32 = 333.87;
const TEMP_OFFSET_C: f32 = 21.0;

/// Accelerometer full-scale range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelRange {
    G2,
    G4,
    G8,
    #[default]
    G16,
}

impl AccelRange {
    /// ACCEL_FS_SEL bits for ACCEL_CONFIG
    pub fn bits(self) -> u8 {
        let sel = match self {
            AccelRange::G2 => 0,
            AccelRange::G4 => 1,
            AccelRange::G8 => 2,
            AccelRange::G16 => 3,
        };
        sel << 3
    }

    /// Sensitivity in LSB per g
    pub fn lsb_per_g(self) -> f32 {
        match self {
            AccelRange::G2 => 16384.0,
            AccelRange::G4 => 8192.0,
            AccelRange::G8 => 4096.0,
            AccelRange::G16 => 2048.0,
        }
    }
}

/// Gyroscope full-scale range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GyroRange {
    Dps250,
    Dps500,
    Dps1000,
    #[default]
    Dps2000,
}

impl GyroRange {
    /// GYRO_FS_SEL bits for GYRO_CONFIG
    pub fn bits(self) -> u8 {
        let sel = match self {
            GyroRange::Dps250 => 0,
            GyroRange::Dps500 => 1,
            GyroRange::Dps1000 => 2,
            GyroRange::Dps2000 => 3,
        };
        sel << 3
    }

    /// Sensitivity in LSB per deg/s
    pub fn lsb_per_dps(self) -> f32 {
        match self {
            GyroRange::Dps250 => 131.0,
            GyroRange::Dps500 => 65.5,
            GyroRange::Dps1000 => 32.8,
            GyroRange::Dps2000 => 16.4,
        }
    }
}

/// Digital low-pass filter bandwidth (gyro DLPF_CFG / accel A_DLPF_CFG)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Dlpf {
    Hz184 = 1,
    Hz92 = 2,
    #[default]
    Hz41 = 3,
    Hz20 = 4,
    Hz10 = 5,
    Hz5 = 6,
}

/// Device configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mpu9250Config {
    pub accel_range: AccelRange,
    pub gyro_range: GyroRange,
    pub dlpf: Dlpf,
    /// Output rate = 1 kHz / (1 + divider)
    pub sample_rate_divider: u8,
}

impl Default for Mpu9250Config {
    /// ±16 g, ±2000 deg/s, 41 Hz DLPF, 200 Hz output
    fn default() -> Self {
        Self {
            accel_range: AccelRange::G16,
            gyro_range: GyroRange::Dps2000,
            dlpf: Dlpf::Hz41,
            sample_rate_divider: 4,
        }
    }
}

impl Mpu9250Config {
    pub fn scale(&self) -> Scale {
        Scale {
            accel_lsb_per_g: self.accel_range.lsb_per_g(),
            gyro_lsb_per_dps: self.gyro_range.lsb_per_dps(),
        }
    }

    /// Output data rate in Hz
    pub fn sample_rate_hz(&self) -> f32 {
        1000.0 / (1.0 + self.sample_rate_divider as f32)
    }
}

/// Conversion factors from raw counts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub accel_lsb_per_g: f32,
    pub gyro_lsb_per_dps: f32,
}

impl Default for Scale {
    fn default() -> Self {
        Mpu9250Config::default().scale()
    }
}

/// Register writes that bring the device from power-on to streaming
///
/// Issue a [`H_RESET`] to `PWR_MGMT_1` and wait ~100 ms before these if the
/// device may have been configured by a previous boot.
pub fn init_sequence(config: &Mpu9250Config) -> [(u8, u8); 7] {
    [
        (reg::PWR_MGMT_1, CLKSEL_AUTO),
        (reg::PWR_MGMT_2, 0x00), // all accel + gyro axes on
        (reg::CONFIG, config.dlpf as u8),
        (reg::SMPLRT_DIV, config.sample_rate_divider),
        (reg::GYRO_CONFIG, config.gyro_range.bits()),
        (reg::ACCEL_CONFIG, config.accel_range.bits()),
        (reg::ACCEL_CONFIG2, config.dlpf as u8),
    ]
}

pub fn is_supported_who_am_i(value: u8) -> bool {
    WHO_AM_I_VALUES.contains(&value)
}

/// One decoded burst
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    /// Acceleration (g)
    pub accel: [f32; 3],
    /// Angular rate (deg/s)
    pub gyro: [f32; 3],
    /// Die temperature (°C)
    pub temp_c: f32,
}

/// Individual output axis, for single-axis recovery reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    AccelX,
    AccelY,
    AccelZ,
    GyroX,
    GyroY,
    GyroZ,
}

impl Axis {
    /// Accelerometer then gyro, X to Z
    pub const ALL: [Axis; 6] = [
        Axis::AccelX,
        Axis::AccelY,
        Axis::AccelZ,
        Axis::GyroX,
        Axis::GyroY,
        Axis::GyroZ,
    ];

    /// Address of the high byte; the low byte follows
    pub fn register(self) -> u8 {
        match self {
            Axis::AccelX => reg::ACCEL_XOUT_H,
            Axis::AccelY => reg::ACCEL_XOUT_H + 2,
            Axis::AccelZ => reg::ACCEL_XOUT_H + 4,
            Axis::GyroX => reg::GYRO_XOUT_H,
            Axis::GyroY => reg::GYRO_XOUT_H + 2,
            Axis::GyroZ => reg::GYRO_XOUT_H + 4,
        }
    }

    pub fn is_accel(self) -> bool {
        matches!(self, Axis::AccelX | Axis::AccelY | Axis::AccelZ)
    }
}

fn be_i16(hi: u8, lo: u8) -> i16 {
    i16::from_be_bytes([hi, lo])
}

/// Convert one axis register pair to g or deg/s
pub fn decode_axis(axis: Axis, bytes: [u8; 2], scale: &Scale) -> f32 {
    let raw = be_i16(bytes[0], bytes[1]) as f32;
    if axis.is_accel() {
        raw / scale.accel_lsb_per_g
    } else {
        raw / scale.gyro_lsb_per_dps
    }
}

/// Decode a burst read starting at `ACCEL_XOUT_H`
pub fn decode_burst(buf: &[u8; BURST_LEN], scale: &Scale) -> Reading {
    let word = |i: usize| be_i16(buf[i], buf[i + 1]) as f32;

    Reading {
        accel: [
            word(0) / scale.accel_lsb_per_g,
            word(2) / scale.accel_lsb_per_g,
            word(4) / scale.accel_lsb_per_g,
        ],
        temp_c: word(6) / TEMP_SENSITIVITY + TEMP_OFFSET_C,
        gyro: [
            word(8) / scale.gyro_lsb_per_dps,
            word(10) / scale.gyro_lsb_per_dps,
            word(12) / scale.gyro_lsb_per_dps,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(buf: &mut [u8; BURST_LEN], i: usize, v: i16) {
        let b = v.to_be_bytes();
        buf[i] = b[0];
        buf[i + 1] = b[1];
    }

    #[test]
    fn test_decode_level_at_rest() {
        let config = Mpu9250Config::default();
        let mut buf = [0u8; BURST_LEN];
        put(&mut buf, 4, 2048); // +1 g on Z at ±16 g
        put(&mut buf, 8, -164); // -10 deg/s on X at ±2000 deg/s

        let r = decode_burst(&buf, &config.scale());
        assert_eq!(r.accel, [0.0, 0.0, 1.0]);
        assert!((r.gyro[0] + 10.0).abs() < 1e-4);
        assert!((r.temp_c - 21.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_negative_and_extreme() {
        let scale = Mpu9250Config {
            accel_range: AccelRange::G2,
            ..Default::default()
        }
        .scale();
        let mut buf = [0u8; BURST_LEN];
        put(&mut buf, 0, -16384);
        put(&mut buf, 2, i16::MAX);

        let r = decode_burst(&buf, &scale);
        assert_eq!(r.accel[0], -1.0);
        assert!((r.accel[1] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_axis_decode_matches_burst() {
        let scale = Scale::default();
        let mut buf = [0u8; BURST_LEN];
        for (i, v) in [100i16, -200, 300, 0, -400, 500, -600].iter().enumerate() {
            put(&mut buf, i * 2, *v);
        }
        let burst = decode_burst(&buf, &scale);

        for axis in Axis::ALL {
            let offset = (axis.register() - reg::ACCEL_XOUT_H) as usize;
            let v = decode_axis(axis, [buf[offset], buf[offset + 1]], &scale);
            let expected = match axis {
                Axis::AccelX => burst.accel[0],
                Axis::AccelY => burst.accel[1],
                Axis::AccelZ => burst.accel[2],
                Axis::GyroX => burst.gyro[0],
                Axis::GyroY => burst.gyro[1],
                Axis::GyroZ => burst.gyro[2],
            };
            assert_eq!(v, expected, "{:?}", axis);
        }
    }

    #[test]
    fn test_range_bits() {
        assert_eq!(AccelRange::G2.bits(), 0x00);
        assert_eq!(AccelRange::G16.bits(), 0x18);
        assert_eq!(GyroRange::Dps500.bits(), 0x08);
        assert_eq!(GyroRange::Dps2000.lsb_per_dps(), 16.4);
    }

    #[test]
    fn test_init_sequence() {
        let config = Mpu9250Config::default();
        let seq = init_sequence(&config);
        assert_eq!(seq[0], (reg::PWR_MGMT_1, 0x01));
        assert!(seq.contains(&(reg::ACCEL_CONFIG, 0x18)));
        assert!(seq.contains(&(reg::GYRO_CONFIG, 0x18)));
        assert!(seq.contains(&(reg::SMPLRT_DIV, 4)));
        assert_eq!(config.sample_rate_hz(), 200.0);
    }

    #[test]
    fn test_who_am_i() {
        assert!(is_supported_who_am_i(0x71));
        assert!(is_supported_who_am_i(0x73));
        assert!(!is_supported_who_am_i(0x68));
    }
}
