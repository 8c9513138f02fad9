//! Shared device state
//!
//! The tick loop and the HTTP handlers each lock one `Arc<Mutex<LevelDevice>>`
//! for the whole operation, so commands never interleave with a tick.

use std::sync::{Arc, Mutex, MutexGuard};

use level_fusion::{
    CalibrationOutcome, EngineConfig, ForwardHint, LevelEngine, LevelError, LevelSnapshot,
};

use crate::imu::Mpu9250Source;
use crate::nvs_storage::NvsCalibrationStore;

pub type SharedDevice = Arc<Mutex<LevelDevice>>;

/// Engine plus the hardware it drives
pub struct LevelDevice {
    engine: LevelEngine,
    source: Mpu9250Source,
    store: NvsCalibrationStore,
}

impl LevelDevice {
    /// Restore calibration from NVS or bootstrap from a live burst
    pub fn new(
        config: EngineConfig,
        mut source: Mpu9250Source,
        mut store: NvsCalibrationStore,
    ) -> Self {
        let engine = LevelEngine::load(config, &mut store, &mut source);
        Self {
            engine,
            source,
            store,
        }
    }

    pub fn into_shared(self) -> SharedDevice {
        Arc::new(Mutex::new(self))
    }

    pub fn tick(&mut self, now_ms: u32) -> LevelSnapshot {
        self.engine.tick(&mut self.source, now_ms)
    }

    pub fn recalibrate(&mut self) -> CalibrationOutcome {
        self.engine.recalibrate(&mut self.source, &mut self.store)
    }

    pub fn set_forward_hint(&mut self, token: &str) -> Result<ForwardHint, LevelError> {
        self.engine
            .set_forward_hint(token, &mut self.source, &mut self.store)
    }

    pub fn reset_peaks(&mut self) {
        self.engine.reset();
    }

    pub fn engine(&self) -> &LevelEngine {
        &self.engine
    }

    pub fn temperature_c(&self) -> f32 {
        self.source.temperature_c()
    }
}

/// Lock the device, recovering the guard if a handler panicked while holding it
pub fn lock(device: &SharedDevice) -> MutexGuard<'_, LevelDevice> {
    device.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Milliseconds since boot, wrapping at `u32::MAX`
pub fn now_ms() -> u32 {
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    (us / 1000) as u32
}

pub fn free_heap_bytes() -> u32 {
    unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
}
