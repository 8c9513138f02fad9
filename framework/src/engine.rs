//! Level engine
//!
//! Owns the calibrated frame plus all per-tick state and runs the pipeline:
//!
//! ```text
//! sample → project(basis) → pitch/roll → zero offset ─┬→ smoother
//!                                                     └→ gravity compensation → split → accel peaks
//! gyro   → project(basis) → deadband → split → rate peaks
//! ```
//!
//! The engine is a plain value owned by the application. Commands and ticks
//! take `&mut self`, so callers sharing it across threads wrap it in one
//! mutex and get the required exclusion for free.

use log::{info, warn};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::angles::{tilt_from_gravity, CalibrationZero};
use crate::calibration::{is_usable_up, BasisCalibrator, FrameCalibration};
use crate::config::EngineConfig;
use crate::error::LevelError;
use crate::filter::AngleSmoother;
use crate::frame::{Basis, ForwardHint};
use crate::peak::PeakHoldTracker;
use crate::sensors::{acquire, collect_burst, RawSample, SampleQuality, SampleSource, SampleStats};
use crate::snapshot::LevelSnapshot;
use crate::store::{self, CalibrationStore, NOMINAL_GRAVITY};
use crate::transforms::{compensate, split_rates};
use crate::vector::{mean, Vector3};

/// Result of a recalibration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CalibrationOutcome {
    pub hint: ForwardHint,
    pub gravity_magnitude: f32,
}

/// Orientation and motion estimator for one sensor
pub struct LevelEngine {
    config: EngineConfig,
    basis: Basis,
    raw_up: Option<Vector3>,
    hint: ForwardHint,
    zero: CalibrationZero,
    gravity_magnitude: f32,
    calibrated: bool,
    smoother: AngleSmoother,
    accel_peaks: PeakHoldTracker,
    rate_peaks: PeakHoldTracker,
    snapshot: LevelSnapshot,
    stats: SampleStats,
}

impl LevelEngine {
    /// Uncalibrated engine: identity basis, hint +X, zero offsets 0,
    /// nominal gravity
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            basis: Basis::identity(),
            raw_up: None,
            hint: ForwardHint::default(),
            zero: CalibrationZero::default(),
            gravity_magnitude: NOMINAL_GRAVITY,
            calibrated: false,
            smoother: AngleSmoother::new(config.smoothing_tau_ms),
            accel_peaks: PeakHoldTracker::new(config.accel_peak_tau_ms),
            rate_peaks: PeakHoldTracker::new(config.rate_peak_tau_ms),
            snapshot: LevelSnapshot::default(),
            stats: SampleStats::default(),
        }
    }

    /// Restore from the store, or bootstrap from a short live burst
    ///
    /// Bootstrap keeps the identity basis and takes the zero offsets from
    /// the current pose so the display starts near 0°/0°. Nothing is
    /// persisted until an explicit calibration.
    pub fn load<S, C>(config: EngineConfig, store: &mut C, source: &mut S) -> Self
    where
        S: SampleSource + ?Sized,
        C: CalibrationStore + ?Sized,
    {
        let mut engine = Self::new(config);

        match store::load(store) {
            Some(cal) => {
                engine.basis = cal.basis;
                engine.raw_up = Some(cal.raw_up);
                engine.hint = cal.hint;
                engine.zero = cal.zero;
                engine.gravity_magnitude = cal.gravity_magnitude;
                engine.calibrated = true;
            }
            None => {
                let samples = collect_burst(
                    source,
                    config.bootstrap_samples.max(1),
                    config.bootstrap_delay_ms,
                    &mut engine.stats,
                );
                let accel: Vec<Vector3> = samples.iter().map(|s| s.accel).collect();
                let pose = tilt_from_gravity(&engine.basis.project(&mean(&accel)));
                engine.zero = CalibrationZero::from_pose(pose);
                info!(
                    "Uncalibrated, bootstrap zero pitch={:.2}° roll={:.2}°",
                    pose.pitch.value(),
                    pose.roll.value()
                );
            }
        }

        engine
    }

    /// Acquire one sample and run the pipeline
    pub fn tick<S: SampleSource + ?Sized>(&mut self, source: &mut S, now_ms: u32) -> LevelSnapshot {
        let (sample, quality) = acquire(source);
        self.stats.record(quality);
        self.process(sample, quality, now_ms)
    }

    /// Run the pipeline on an already-acquired sample
    pub fn process(
        &mut self,
        sample: RawSample,
        quality: SampleQuality,
        now_ms: u32,
    ) -> LevelSnapshot {
        let accel = self.basis.project(&sample.accel).finite_or_zero();
        let rates = self.basis.project(&sample.gyro).finite_or_zero();

        let raw_angles = tilt_from_gravity(&accel);
        let angles = self.zero.apply(raw_angles);

        let comp = compensate(
            &accel,
            angles,
            self.gravity_magnitude,
            self.config.accel_deadband_g,
        );
        let rate_split = split_rates(&rates, self.config.rate_deadband_dps);

        let accel_peak = self.accel_peaks.update(comp.split.to_quad(), now_ms);
        let rate_peak = self.rate_peaks.update(rate_split.to_quad(), now_ms);
        let smoothed = self.smoother.update(angles, now_ms);

        self.snapshot = LevelSnapshot {
            timestamp_ms: now_ms,
            calibrated: self.calibrated,
            hint: self.hint,
            raw_angles,
            angles,
            smoothed,
            accel: sample.accel.finite_or_zero(),
            gyro: sample.gyro.finite_or_zero(),
            gravity: comp.gravity,
            linear_accel: comp.linear,
            accel_split: comp.split,
            rate_split,
            accel_peak,
            rate_peak,
            quality,
        };
        self.snapshot
    }

    /// Re-measure gravity with the current hint and capture a new zero pose
    ///
    /// Resets both peak trackers and the smoother. A store failure is logged
    /// and the new calibration stays active in memory.
    pub fn recalibrate<S, C>(&mut self, source: &mut S, store: &mut C) -> CalibrationOutcome
    where
        S: SampleSource + ?Sized,
        C: CalibrationStore + ?Sized,
    {
        let mut calibrator = BasisCalibrator::new(self.config.calibration_samples);
        let samples = collect_burst(
            source,
            self.config.calibration_samples.max(1),
            self.config.calibration_delay_ms,
            &mut self.stats,
        );
        for s in &samples {
            calibrator.add_sample(s.accel);
        }

        let Some(cal) = calibrator.finish(self.hint) else {
            warn!(
                "Calibration rejected ({:.0}% of samples, {} substituted so far), keeping previous",
                calibrator.progress() * 100.0,
                self.stats.substituted
            );
            return self.calibration_outcome();
        };

        self.apply_calibration(&cal);
        if let Err(e) = store::save(store, &cal) {
            warn!("Calibration not persisted: {}", e);
        }

        self.calibration_outcome()
    }

    fn apply_calibration(&mut self, cal: &FrameCalibration) {
        self.basis = cal.basis;
        self.raw_up = Some(cal.raw_up);
        self.hint = cal.hint;
        self.zero = cal.zero;
        self.gravity_magnitude = cal.gravity_magnitude;
        self.calibrated = true;
        self.reset();
    }

    /// Rebuild the basis for a new forward hint
    ///
    /// Uses the persisted raw up vector (falling back to the in-memory one,
    /// then to a fresh burst). Zero offsets and gravity magnitude are kept.
    /// An invalid token, or a fresh burst with no usable gravity direction,
    /// leaves every piece of state untouched.
    ///
    /// On an engine that was never calibrated the bootstrap zero offsets and
    /// nominal gravity are persisted with the orientation, so a reboot shows
    /// the same angles.
    pub fn set_forward_hint<S, C>(
        &mut self,
        token: &str,
        source: &mut S,
        store: &mut C,
    ) -> Result<ForwardHint, LevelError>
    where
        S: SampleSource + ?Sized,
        C: CalibrationStore + ?Sized,
    {
        let hint: ForwardHint = token.parse()?;

        let raw_up = match store::load_raw_up(store).or(self.raw_up.filter(is_usable_up)) {
            Some(v) => v,
            None => {
                info!("No usable raw up vector, sampling gravity");
                let samples = collect_burst(
                    source,
                    self.config.calibration_samples.max(1),
                    self.config.calibration_delay_ms,
                    &mut self.stats,
                );
                let accel: Vec<Vector3> = samples.iter().map(|s| s.accel).collect();
                let raw_up = mean(&accel);
                if !is_usable_up(&raw_up) {
                    warn!("Hint {} rejected, no usable gravity reading", hint);
                    return Err(LevelError::InvalidOrientation(format!(
                        "no usable gravity direction, |g| = {:.4}",
                        raw_up.length()
                    )));
                }
                raw_up
            }
        };

        self.basis = Basis::from_up_and_hint(raw_up, hint);
        self.raw_up = Some(raw_up);
        self.hint = hint;
        info!("Forward hint set to {}", hint);

        let persisted = if self.calibrated {
            store::save_orientation(store, &raw_up, hint, &self.basis)
        } else {
            store::save(
                store,
                &FrameCalibration {
                    basis: self.basis,
                    raw_up,
                    hint,
                    zero: self.zero,
                    gravity_magnitude: self.gravity_magnitude,
                },
            )
        };
        if let Err(e) = persisted {
            warn!("Orientation not persisted: {}", e);
        }

        Ok(hint)
    }

    /// Clear both peak trackers and the smoother; calibration is kept
    pub fn reset(&mut self) {
        self.accel_peaks.reset();
        self.rate_peaks.reset();
        self.smoother.reset();
    }

    /// Last completed snapshot
    pub fn snapshot(&self) -> LevelSnapshot {
        self.snapshot
    }

    pub fn calibration_outcome(&self) -> CalibrationOutcome {
        CalibrationOutcome {
            hint: self.hint,
            gravity_magnitude: self.gravity_magnitude,
        }
    }

    pub fn basis(&self) -> &Basis {
        &self.basis
    }

    pub fn hint(&self) -> ForwardHint {
        self.hint
    }

    pub fn zero(&self) -> CalibrationZero {
        self.zero
    }

    pub fn gravity_magnitude(&self) -> f32 {
        self.gravity_magnitude
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn sample_stats(&self) -> SampleStats {
        self.stats
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorError;
    use crate::store::MemoryStore;

    /// Returns one fixed sample; counts reads
    struct ScriptedSource {
        sample: RawSample,
        reads: usize,
        fail: bool,
    }

    impl ScriptedSource {
        fn new(accel: Vector3) -> Self {
            Self {
                sample: RawSample::new(accel, Vector3::ZERO),
                reads: 0,
                fail: false,
            }
        }

        fn tilted(pitch_deg: f32) -> Self {
            let a = pitch_deg.to_radians();
            Self::new(Vector3::new(a.sin(), 0.0, a.cos()))
        }
    }

    impl SampleSource for ScriptedSource {
        fn read(&mut self) -> Result<RawSample, SensorError> {
            self.reads += 1;
            if self.fail {
                Err(SensorError::Io("i2c"))
            } else {
                Ok(self.sample)
            }
        }

        fn delay_ms(&mut self, _ms: u32) {}
    }

    fn calibrated_engine(store: &mut MemoryStore) -> LevelEngine {
        let mut src = ScriptedSource::new(Vector3::Z);
        let mut engine = LevelEngine::load(EngineConfig::default(), store, &mut src);
        engine.recalibrate(&mut src, store);
        engine
    }

    #[test]
    fn test_bootstrap_when_uncalibrated() {
        let mut store = MemoryStore::new();
        let mut src = ScriptedSource::tilted(5.0);
        let mut engine = LevelEngine::load(EngineConfig::default(), &mut store, &mut src);

        assert!(!engine.is_calibrated());
        assert_eq!(engine.hint(), ForwardHint::PlusX);
        assert_eq!(*engine.basis(), Basis::identity());
        assert_eq!(engine.gravity_magnitude(), 1.0);
        assert_eq!(src.reads, 30);
        assert!(store.is_empty(), "bootstrap must not persist");

        let snap = engine.tick(&mut src, 0);
        assert!(snap.angles.pitch.value().abs() < 1e-3);
        assert!((snap.raw_angles.pitch.value() + 5.0).abs() < 1e-3);
        assert!(!snap.calibrated);
    }

    #[test]
    fn test_level_scenario() {
        let mut store = MemoryStore::new();
        let mut engine = calibrated_engine(&mut store);
        let mut src = ScriptedSource::new(Vector3::Z);

        let snap = engine.tick(&mut src, 100);
        assert!(snap.calibrated);
        assert_eq!(snap.hint, ForwardHint::PlusX);
        assert!(snap.angles.pitch.value().abs() < 1e-4);
        assert!(snap.angles.roll.value().abs() < 1e-4);
        assert_eq!(snap.linear_accel, Default::default());
    }

    #[test]
    fn test_ten_degree_pitch_after_level_calibration() {
        let mut store = MemoryStore::new();
        let mut engine = calibrated_engine(&mut store);
        let mut src = ScriptedSource::tilted(10.0);

        let pitch = engine.tick(&mut src, 100).angles.pitch.value();
        assert!((pitch.abs() - 10.0).abs() < 0.1, "pitch {}", pitch);
        assert!(pitch < 0.0);
    }

    #[test]
    fn test_recalibrate_persists_and_reloads() {
        let mut store = MemoryStore::new();
        let mut src = ScriptedSource::new(Vector3::new(0.05, -0.1, 0.97));
        let mut engine = LevelEngine::load(EngineConfig::default(), &mut store, &mut src);
        let outcome = engine.recalibrate(&mut src, &mut store);

        assert_eq!(outcome.hint, ForwardHint::PlusX);
        assert!((outcome.gravity_magnitude - src.sample.accel.length()).abs() < 1e-5);
        assert_eq!(store.get_u8(store::KEY_SCHEMA), Some(store::SCHEMA_VERSION));

        let reads_before = src.reads;
        let reloaded = LevelEngine::load(EngineConfig::default(), &mut store, &mut src);
        assert_eq!(src.reads, reads_before, "calibrated load must not sample");
        assert!(reloaded.is_calibrated());
        assert_eq!(reloaded.basis(), engine.basis());
        assert_eq!(reloaded.zero(), engine.zero());
        assert_eq!(reloaded.gravity_magnitude(), engine.gravity_magnitude());
    }

    #[test]
    fn test_recalibrate_resets_peaks() {
        let mut store = MemoryStore::new();
        let mut engine = calibrated_engine(&mut store);
        // Only the part of the reading that differs from |g| survives
        // compensation, so use a hard stop
        let mut src = ScriptedSource::new(Vector3::new(-2.0, 0.0, 1.0));
        let snap = engine.tick(&mut src, 0);
        assert!(snap.accel_peak.down > 0.5, "peak {}", snap.accel_peak.down);

        src.sample.accel = Vector3::Z;
        engine.recalibrate(&mut src, &mut store);
        let snap = engine.tick(&mut src, 10);
        assert_eq!(snap.accel_peak, Default::default());
    }

    #[test]
    fn test_braking_peak_holds_and_decays() {
        let mut store = MemoryStore::new();
        let mut engine = calibrated_engine(&mut store);
        let mut src = ScriptedSource::new(Vector3::new(-2.0, 0.0, 1.0));
        engine.tick(&mut src, 0);

        src.sample.accel = Vector3::Z;
        let first = engine.tick(&mut src, 100).accel_peak.down;
        let later = engine.tick(&mut src, 1000).accel_peak.down;
        assert!(first > later && later > 0.0, "{} then {}", first, later);
    }

    #[test]
    fn test_invalid_hint_changes_nothing() {
        let mut store = MemoryStore::new();
        let mut engine = calibrated_engine(&mut store);
        let before_store = store.clone();
        let basis = *engine.basis();
        let mut src = ScriptedSource::new(Vector3::Z);

        let err = engine.set_forward_hint("+Z", &mut src, &mut store);
        assert!(matches!(err, Err(LevelError::InvalidHint(_))));
        assert_eq!(*engine.basis(), basis);
        assert_eq!(engine.hint(), ForwardHint::PlusX);
        assert_eq!(src.reads, 0);
        assert_eq!(store.get_str(store::KEY_HINT), before_store.get_str(store::KEY_HINT));
    }

    #[test]
    fn test_hint_update_uses_stored_up() {
        let mut store = MemoryStore::new();
        let mut engine = calibrated_engine(&mut store);
        let zero = engine.zero();
        let g = engine.gravity_magnitude();
        let mut src = ScriptedSource::new(Vector3::Z);

        let hint = engine.set_forward_hint("-Y", &mut src, &mut store).unwrap();
        assert_eq!(hint, ForwardHint::MinusY);
        assert_eq!(src.reads, 0, "stored raw up should be reused");
        assert!((engine.basis().forward.y + 1.0).abs() < 1e-6);
        assert_eq!(engine.zero(), zero);
        assert_eq!(engine.gravity_magnitude(), g);
        assert_eq!(store.get_str(store::KEY_HINT).as_deref(), Some("-Y"));
    }

    #[test]
    fn test_hint_update_resamples_without_raw_up() {
        let mut store = MemoryStore::new();
        let mut src = ScriptedSource::new(Vector3::Z);
        let mut engine = LevelEngine::load(EngineConfig::default(), &mut store, &mut src);
        let reads = src.reads;

        engine.set_forward_hint("+Y", &mut src, &mut store).unwrap();
        assert_eq!(src.reads, reads + 80);
        assert!(engine.basis().is_orthonormal(1e-4));
        assert!(store::load_raw_up(&store).is_some());
    }

    #[test]
    fn test_failed_burst_keeps_previous_calibration() {
        let mut store = MemoryStore::new();
        let mut src = ScriptedSource::new(Vector3::new(0.1, 0.0, 0.99));
        let mut engine = LevelEngine::load(EngineConfig::default(), &mut store, &mut src);
        let before = engine.recalibrate(&mut src, &mut store);
        let basis = *engine.basis();
        let zero = engine.zero();
        let stored_up = store::load_raw_up(&store);
        let stored_g = store.get_f32(store::KEY_GRAVITY);

        // Every read fails and every axis is substituted with zero
        src.fail = true;
        let outcome = engine.recalibrate(&mut src, &mut store);
        assert_eq!(outcome, before);
        assert_eq!(*engine.basis(), basis);
        assert_eq!(engine.zero(), zero);
        assert!(engine.is_calibrated());
        assert_eq!(store::load_raw_up(&store), stored_up);
        assert_eq!(store.get_f32(store::KEY_GRAVITY), stored_g);

        src.fail = false;
        src.sample.accel = Vector3::new(0.3, 0.0, 0.95);
        let pitch = engine.tick(&mut src, 100).angles.pitch.value();
        assert!(pitch < -5.0, "pitch {}", pitch);

        let reloaded = LevelEngine::load(EngineConfig::default(), &mut store, &mut src);
        assert!(reloaded.is_calibrated());
        assert_eq!(*reloaded.basis(), basis);
    }

    #[test]
    fn test_hint_resample_failure_changes_nothing() {
        let mut store = MemoryStore::new();
        let mut src = ScriptedSource::new(Vector3::Z);
        let mut engine = LevelEngine::load(EngineConfig::default(), &mut store, &mut src);

        src.fail = true;
        let err = engine.set_forward_hint("+Y", &mut src, &mut store);
        assert!(matches!(err, Err(LevelError::InvalidOrientation(_))));
        assert_eq!(*engine.basis(), Basis::identity());
        assert_eq!(engine.hint(), ForwardHint::PlusX);
        assert!(store.is_empty());
    }

    #[test]
    fn test_uncalibrated_hint_update_survives_reload() {
        let mut store = MemoryStore::new();
        let mut src = ScriptedSource::tilted(5.0);
        let mut engine = LevelEngine::load(EngineConfig::default(), &mut store, &mut src);

        engine.set_forward_hint("-X", &mut src, &mut store).unwrap();
        src.sample.accel = Vector3::new(0.2, 0.1, 0.97);
        let before = engine.tick(&mut src, 100).angles;

        let mut reloaded = LevelEngine::load(EngineConfig::default(), &mut store, &mut src);
        assert_eq!(reloaded.zero(), engine.zero());
        assert_eq!(reloaded.gravity_magnitude(), engine.gravity_magnitude());
        let after = reloaded.tick(&mut src, 100).angles;
        assert!((after.pitch.value() - before.pitch.value()).abs() < 1e-4);
        assert!((after.roll.value() - before.roll.value()).abs() < 1e-4);
    }

    #[test]
    fn test_reset_keeps_calibration() {
        let mut store = MemoryStore::new();
        let mut engine = calibrated_engine(&mut store);
        let basis = *engine.basis();
        let mut src = ScriptedSource::new(Vector3::new(0.5, 0.0, 1.0));
        engine.tick(&mut src, 0);

        engine.reset();
        src.sample.accel = Vector3::Z;
        let snap = engine.tick(&mut src, 10);
        assert_eq!(snap.accel_peak, Default::default());
        assert_eq!(snap.smoothed, snap.angles, "smoother should reseed");
        assert_eq!(*engine.basis(), basis);
        assert!(engine.is_calibrated());
    }

    #[test]
    fn test_store_failure_keeps_new_calibration() {
        let mut store = MemoryStore::new();
        store.set_read_only(true);
        let mut src = ScriptedSource::tilted(3.0);
        let mut engine = LevelEngine::load(EngineConfig::default(), &mut store, &mut src);

        let outcome = engine.recalibrate(&mut src, &mut store);
        assert!(engine.is_calibrated());
        assert!((outcome.gravity_magnitude - 1.0).abs() < 1e-4);
        assert!(store.is_empty());

        // Hint change falls back to the in-memory raw up
        let reads = src.reads;
        engine.set_forward_hint("-X", &mut src, &mut store).unwrap();
        assert_eq!(src.reads, reads);
    }

    #[test]
    fn test_sensor_failure_substitutes_zero() {
        let mut store = MemoryStore::new();
        let mut engine = calibrated_engine(&mut store);
        let mut src = ScriptedSource::new(Vector3::Z);
        src.fail = true;

        let snap = engine.tick(&mut src, 50);
        assert_eq!(snap.quality, SampleQuality::Substituted);
        assert_eq!(snap.accel, Vector3::ZERO);
        assert!(snap.angles.pitch.value().is_finite());
        assert!(snap.angles.roll.value().is_finite());
        assert_eq!(engine.sample_stats().substituted, 1);
        assert_eq!(engine.snapshot(), snap);
    }
}
