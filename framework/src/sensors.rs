//! Sample source abstraction
//!
//! The engine pulls raw accelerometer/gyroscope samples synchronously from a
//! [`SampleSource`]. Implementations: the MPU-9250 I²C source in the
//! firmware, scripted sources in tests, the simulator in `examples/`.

use log::warn;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::error::SensorError;
use crate::vector::{finite_or_zero, Vector3};

/// One accelerometer (g) + gyroscope (deg/s) reading in sensor axes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct RawSample {
    pub accel: Vector3,
    pub gyro: Vector3,
}

impl RawSample {
    pub fn new(accel: Vector3, gyro: Vector3) -> Self {
        Self { accel, gyro }
    }

    pub fn from_array(v: [f32; 6]) -> Self {
        Self {
            accel: Vector3::new(v[0], v[1], v[2]),
            gyro: Vector3::new(v[3], v[4], v[5]),
        }
    }
}

/// Per-axis result of a direct register re-read
///
/// Order is ax, ay, az, gx, gy, gz; `None` marks an axis that could not be
/// read.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PartialSample {
    pub axes: [Option<f32>; 6],
}

impl PartialSample {
    pub fn complete(sample: RawSample) -> Self {
        let a = sample.accel;
        let g = sample.gyro;
        Self {
            axes: [
                Some(a.x),
                Some(a.y),
                Some(a.z),
                Some(g.x),
                Some(g.y),
                Some(g.z),
            ],
        }
    }

    /// Number of axes that could not be read (or read non-finite)
    pub fn missing(&self) -> usize {
        self.axes
            .iter()
            .filter(|a| !matches!(a, Some(v) if v.is_finite()))
            .count()
    }

    /// Fill missing axes with zero
    pub fn into_sample(self) -> RawSample {
        let mut v = [0.0; 6];
        for (out, axis) in v.iter_mut().zip(self.axes) {
            *out = finite_or_zero(axis.unwrap_or(0.0));
        }
        RawSample::from_array(v)
    }
}

/// Supplier of raw samples
pub trait SampleSource {
    /// Read one sample (normal fast path, e.g. a single burst read)
    fn read(&mut self) -> Result<RawSample, SensorError>;

    /// Re-read each axis individually after [`read`](Self::read) failed
    ///
    /// Sources without a separate per-axis path keep the default.
    fn read_direct(&mut self) -> Result<PartialSample, SensorError> {
        Err(SensorError::Unsupported)
    }

    /// Block for roughly `ms` milliseconds between burst samples
    fn delay_ms(&mut self, ms: u32);
}

/// How a sample was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum SampleQuality {
    /// Normal read succeeded
    #[default]
    Primary,
    /// Normal read failed, direct re-read recovered every axis
    Recovered,
    /// At least one axis was replaced with zero
    Substituted,
}

/// Read one sample, falling back to a direct re-read and then to zeros
///
/// Never fails: the worst case is an all-zero sample marked
/// [`SampleQuality::Substituted`]. Non-finite values from any path are
/// zeroed as well.
pub fn acquire<S: SampleSource + ?Sized>(source: &mut S) -> (RawSample, SampleQuality) {
    let err = match source.read() {
        Ok(sample) => {
            let partial = PartialSample::complete(sample);
            return if partial.missing() == 0 {
                (sample, SampleQuality::Primary)
            } else {
                (partial.into_sample(), SampleQuality::Substituted)
            };
        }
        Err(e) => e,
    };

    warn!("Sample read failed ({}), trying direct re-read", err);

    match source.read_direct() {
        Ok(partial) => {
            let missing = partial.missing();
            if missing == 0 {
                (partial.into_sample(), SampleQuality::Recovered)
            } else {
                warn!("Direct re-read missing {} axes, substituting zero", missing);
                (partial.into_sample(), SampleQuality::Substituted)
            }
        }
        Err(e) => {
            warn!("Direct re-read failed ({}), substituting zero sample", e);
            (RawSample::default(), SampleQuality::Substituted)
        }
    }
}

/// Collect `count` samples with `delay_ms` between them
pub fn collect_burst<S: SampleSource + ?Sized>(
    source: &mut S,
    count: usize,
    delay_ms: u32,
    stats: &mut SampleStats,
) -> Vec<RawSample> {
    let mut samples = Vec::with_capacity(count);
    for i in 0..count {
        let (sample, quality) = acquire(source);
        stats.record(quality);
        samples.push(sample);
        if i + 1 < count && delay_ms > 0 {
            source.delay_ms(delay_ms);
        }
    }
    samples
}

/// Running counters of sample quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SampleStats {
    pub primary: u32,
    pub recovered: u32,
    pub substituted: u32,
}

impl SampleStats {
    pub fn record(&mut self, quality: SampleQuality) {
        match quality {
            SampleQuality::Primary => self.primary = self.primary.wrapping_add(1),
            SampleQuality::Recovered => self.recovered = self.recovered.wrapping_add(1),
            SampleQuality::Substituted => self.substituted = self.substituted.wrapping_add(1),
        }
    }

    pub fn total(&self) -> u32 {
        self.primary
            .wrapping_add(self.recovered)
            .wrapping_add(self.substituted)
    }
}
