//! Device health for the `/api/diagnostics` endpoint
//!
//! The tick loop refreshes the data with `try_lock()` so a slow HTTP reader
//! never delays a tick; a skipped refresh is picked up on the next period.

use std::sync::{Arc, Mutex};

use level_fusion::{ForwardHint, SampleStats};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticsData {
    pub uptime_seconds: u32,
    pub free_heap_bytes: u32,
    /// Measured tick rate over the last period
    pub tick_hz: f32,
    pub tick_expected_hz: f32,
    /// Primary / recovered / substituted sample counts
    pub samples: SampleStats,
    pub calibrated: bool,
    pub forward_hint: ForwardHint,
    pub gravity_magnitude: f32,
    pub temperature_c: f32,
    pub wifi_ssid: &'static str,
    pub wifi_up: bool,
}

pub struct DiagnosticsState {
    data: Mutex<DiagnosticsData>,
}

impl DiagnosticsState {
    pub fn new(wifi_ssid: &'static str, tick_expected_hz: f32) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(DiagnosticsData {
                wifi_ssid,
                tick_expected_hz,
                ..Default::default()
            }),
        })
    }

    /// Non-blocking update; skipped if a reader holds the lock
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut DiagnosticsData),
    {
        if let Ok(mut data) = self.data.try_lock() {
            f(&mut data);
        }
    }

    pub fn snapshot(&self) -> DiagnosticsData {
        self.data
            .lock()
            .map(|d| d.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

/// Counts ticks and reports a rate once per window
pub struct RateCounter {
    count: u32,
    window_start_ms: u32,
}

impl RateCounter {
    pub fn new(now_ms: u32) -> Self {
        Self {
            count: 0,
            window_start_ms: now_ms,
        }
    }

    pub fn tick(&mut self) {
        self.count += 1;
    }

    /// Rate in Hz once `window_ms` has passed, then starts a new window
    pub fn poll(&mut self, now_ms: u32, window_ms: u32) -> Option<f32> {
        let elapsed = now_ms.wrapping_sub(self.window_start_ms);
        if elapsed < window_ms || elapsed == 0 {
            return None;
        }
        let hz = self.count as f32 * 1000.0 / elapsed as f32;
        self.count = 0;
        self.window_start_ms = now_ms;
        Some(hz)
    }
}
