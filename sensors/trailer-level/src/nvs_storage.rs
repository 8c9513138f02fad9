//! Non-volatile storage for the trailer frame calibration.

use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use esp_idf_svc::sys::EspError;
use level_fusion::{CalibrationStore, StoreError};
use log::info;

const NAMESPACE: &str = "trailer";

/// Longest string value read back (forward hint tokens are 2 bytes)
const MAX_STR_LEN: usize = 16;

/// NVS-backed calibration store
pub struct NvsCalibrationStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsCalibrationStore {
    pub fn new(partition: EspNvsPartition<NvsDefault>) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)?;
        info!("NVS storage initialized (namespace '{}')", NAMESPACE);
        Ok(Self { nvs })
    }
}

fn write_error(key: &str, e: EspError) -> StoreError {
    StoreError::Write {
        key: key.to_string(),
        reason: e.to_string(),
    }
}

impl CalibrationStore for NvsCalibrationStore {
    fn get_f32(&self, key: &str) -> Option<f32> {
        let mut buf = [0u8; 4];
        let bytes = self.nvs.get_raw(key, &mut buf).ok().flatten()?;
        if bytes.len() != 4 {
            return None;
        }
        Some(f32::from_le_bytes(buf))
    }

    fn set_f32(&mut self, key: &str, val: f32) -> Result<(), StoreError> {
        self.nvs
            .set_raw(key, &val.to_le_bytes())
            .map(|_| ())
            .map_err(|e| write_error(key, e))
    }

    fn get_u8(&self, key: &str) -> Option<u8> {
        self.nvs.get_u8(key).ok().flatten()
    }

    fn set_u8(&mut self, key: &str, val: u8) -> Result<(), StoreError> {
        self.nvs.set_u8(key, val).map_err(|e| write_error(key, e))
    }

    fn get_str(&self, key: &str) -> Option<String> {
        let mut buf = [0u8; MAX_STR_LEN];
        self.nvs
            .get_str(key, &mut buf)
            .ok()
            .flatten()
            .map(str::to_string)
    }

    fn set_str(&mut self, key: &str, val: &str) -> Result<(), StoreError> {
        self.nvs.set_str(key, val).map_err(|e| write_error(key, e))
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.nvs
            .remove(key)
            .map(|_| ())
            .map_err(|e| write_error(key, e))
    }
}
