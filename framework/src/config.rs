//! Engine tuning

/// Configuration for the level engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Display smoothing time constant (ms)
    pub smoothing_tau_ms: f32,
    /// Decay time constant of the acceleration peaks (ms)
    pub accel_peak_tau_ms: f32,
    /// Decay time constant of the angular-rate peaks (ms)
    pub rate_peak_tau_ms: f32,
    /// Per-axis deadband on gravity-compensated acceleration (g)
    pub accel_deadband_g: f32,
    /// Per-axis deadband on projected gyro rates (deg/s)
    pub rate_deadband_dps: f32,
    /// Samples averaged by a calibration
    pub calibration_samples: usize,
    /// Delay between calibration samples (ms)
    pub calibration_delay_ms: u32,
    /// Samples averaged for the bootstrap pose when uncalibrated
    pub bootstrap_samples: usize,
    /// Delay between bootstrap samples (ms)
    pub bootstrap_delay_ms: u32,
}

impl Default for EngineConfig {
    /// Values tuned for a parked / slowly towed trailer sampled every ~20 ms.
    fn default() -> Self {
        Self {
            smoothing_tau_ms: 400.0,
            accel_peak_tau_ms: 1500.0,
            rate_peak_tau_ms: 1500.0,
            accel_deadband_g: 0.02, // below road buzz on a parked trailer
            rate_deadband_dps: 0.5, // MPU-9250 zero-rate offset is a few tenths
            calibration_samples: 80,
            calibration_delay_ms: 5,
            bootstrap_samples: 30,
            bootstrap_delay_ms: 5,
        }
    }
}
