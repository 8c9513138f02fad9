//! Persisted calibration
//!
//! Calibration lives in a small key/value store (NVS on the device, a
//! `HashMap` in tests and the simulator). Keys stay within the 15-character
//! NVS limit; floats are stored individually.
//!
//! Layout history:
//! - v1: gravity magnitude in `gmag`, zero offsets in `p0`/`r0`, no
//!   `schema` key.
//! - v2: `g_mag`, `pitch0`, `roll0`, `schema = 2`.
//!
//! [`load`] migrates v1 to v2 in place the first time it sees it.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::angles::CalibrationZero;
use crate::calibration::{is_usable_up, FrameCalibration};
use crate::error::StoreError;
use crate::frame::{Basis, ForwardHint, BASIS_TOLERANCE};
use crate::units::Degrees;
use crate::vector::Vector3;

pub const SCHEMA_VERSION: u8 = 2;

pub const KEY_SCHEMA: &str = "schema";
pub const KEY_RAW_UP: [&str; 3] = ["up_x", "up_y", "up_z"];
pub const KEY_HINT: &str = "hint";
pub const KEY_BASIS_FORWARD: [&str; 3] = ["fwd_x", "fwd_y", "fwd_z"];
pub const KEY_BASIS_RIGHT: [&str; 3] = ["rgt_x", "rgt_y", "rgt_z"];
pub const KEY_BASIS_UP: [&str; 3] = ["bup_x", "bup_y", "bup_z"];
pub const KEY_PITCH_ZERO: &str = "pitch0";
pub const KEY_ROLL_ZERO: &str = "roll0";
pub const KEY_GRAVITY: &str = "g_mag";

const LEGACY_KEY_GRAVITY: &str = "gmag";
const LEGACY_KEY_PITCH_ZERO: &str = "p0";
const LEGACY_KEY_ROLL_ZERO: &str = "r0";

/// Gravity magnitude assumed until the first calibration (g)
pub const NOMINAL_GRAVITY: f32 = 1.0;

/// Shortest raw up vector accepted as a usable gravity direction
pub const MIN_RAW_UP_LENGTH: f32 = 1e-6;

/// Key/value backend for calibration data
pub trait CalibrationStore {
    fn get_f32(&self, key: &str) -> Option<f32>;
    fn set_f32(&mut self, key: &str, val: f32) -> Result<(), StoreError>;
    fn get_u8(&self, key: &str) -> Option<u8>;
    fn set_u8(&mut self, key: &str, val: u8) -> Result<(), StoreError>;
    fn get_str(&self, key: &str) -> Option<String>;
    fn set_str(&mut self, key: &str, val: &str) -> Result<(), StoreError>;
    /// Remove a key; removing an absent key is not an error
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
enum StoredValue {
    F32(f32),
    U8(u8),
    Str(String),
}

/// In-memory [`CalibrationStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, StoredValue>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every write, like flash that has gone read-only
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn put(&mut self, key: &str, val: StoredValue) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::Write {
                key: key.to_string(),
                reason: "store is read-only".to_string(),
            });
        }
        self.values.insert(key.to_string(), val);
        Ok(())
    }
}

impl CalibrationStore for MemoryStore {
    fn get_f32(&self, key: &str) -> Option<f32> {
        match self.values.get(key) {
            Some(StoredValue::F32(v)) => Some(*v),
            _ => None,
        }
    }

    fn set_f32(&mut self, key: &str, val: f32) -> Result<(), StoreError> {
        self.put(key, StoredValue::F32(val))
    }

    fn get_u8(&self, key: &str) -> Option<u8> {
        match self.values.get(key) {
            Some(StoredValue::U8(v)) => Some(*v),
            _ => None,
        }
    }

    fn set_u8(&mut self, key: &str, val: u8) -> Result<(), StoreError> {
        self.put(key, StoredValue::U8(val))
    }

    fn get_str(&self, key: &str) -> Option<String> {
        match self.values.get(key) {
            Some(StoredValue::Str(v)) => Some(v.clone()),
            _ => None,
        }
    }

    fn set_str(&mut self, key: &str, val: &str) -> Result<(), StoreError> {
        self.put(key, StoredValue::Str(val.to_string()))
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::Write {
                key: key.to_string(),
                reason: "store is read-only".to_string(),
            });
        }
        self.values.remove(key);
        Ok(())
    }
}

/// Calibration as loaded from the store, canonical form
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistedCalibration {
    pub raw_up: Vector3,
    pub hint: ForwardHint,
    /// Always orthonormal for a usable `raw_up`; rebuilt if the stored one wasn't
    pub basis: Basis,
    pub zero: CalibrationZero,
    pub gravity_magnitude: f32,
}

fn get_finite<S: CalibrationStore + ?Sized>(store: &S, key: &str) -> Option<f32> {
    store.get_f32(key).filter(|v| v.is_finite())
}

fn get_vec<S: CalibrationStore + ?Sized>(store: &S, keys: [&str; 3]) -> Option<Vector3> {
    Some(Vector3::new(
        get_finite(store, keys[0])?,
        get_finite(store, keys[1])?,
        get_finite(store, keys[2])?,
    ))
}

fn set_vec<S: CalibrationStore + ?Sized>(
    store: &mut S,
    keys: [&str; 3],
    v: &Vector3,
) -> Result<(), StoreError> {
    store.set_f32(keys[0], v.x)?;
    store.set_f32(keys[1], v.y)?;
    store.set_f32(keys[2], v.z)?;
    Ok(())
}

fn get_basis<S: CalibrationStore + ?Sized>(store: &S) -> Option<Basis> {
    Some(Basis {
        forward: get_vec(store, KEY_BASIS_FORWARD)?,
        right: get_vec(store, KEY_BASIS_RIGHT)?,
        up: get_vec(store, KEY_BASIS_UP)?,
    })
}

fn set_basis<S: CalibrationStore + ?Sized>(store: &mut S, basis: &Basis) -> Result<(), StoreError> {
    set_vec(store, KEY_BASIS_FORWARD, &basis.forward)?;
    set_vec(store, KEY_BASIS_RIGHT, &basis.right)?;
    set_vec(store, KEY_BASIS_UP, &basis.up)?;
    Ok(())
}

/// Stored schema version; a store without the key is v1
pub fn schema_version<S: CalibrationStore + ?Sized>(store: &S) -> u8 {
    store.get_u8(KEY_SCHEMA).unwrap_or(1)
}

/// Rewrite a v1 layout as v2
///
/// Canonical keys that already exist win over legacy ones. Returns
/// `Ok(true)` if a migration was performed.
pub fn migrate<S: CalibrationStore + ?Sized>(store: &mut S) -> Result<bool, StoreError> {
    let version = schema_version(store);
    if version >= SCHEMA_VERSION {
        return Ok(false);
    }

    let moves = [
        (LEGACY_KEY_GRAVITY, KEY_GRAVITY),
        (LEGACY_KEY_PITCH_ZERO, KEY_PITCH_ZERO),
        (LEGACY_KEY_ROLL_ZERO, KEY_ROLL_ZERO),
    ];
    let legacy_present = moves.iter().any(|(legacy, _)| store.get_f32(legacy).is_some());
    if !legacy_present && store.get_f32(KEY_RAW_UP[0]).is_none() {
        // Nothing stored yet
        return Ok(false);
    }

    for (legacy, canonical) in moves {
        if store.get_f32(canonical).is_none() {
            if let Some(v) = store.get_f32(legacy) {
                store.set_f32(canonical, v)?;
                debug!("Store: moved {} -> {} ({})", legacy, canonical, v);
            }
        }
    }
    for (legacy, _) in moves {
        if store.get_f32(legacy).is_some() {
            store.remove(legacy)?;
        }
    }
    store.set_u8(KEY_SCHEMA, SCHEMA_VERSION)?;

    info!("Store: migrated calibration schema v{} -> v{}", version, SCHEMA_VERSION);
    Ok(true)
}

/// Canonical value of a key, reading through to the legacy key for a v1
/// store whose migration could not be written
fn get_with_legacy<S: CalibrationStore + ?Sized>(
    store: &S,
    canonical: &str,
    legacy: &str,
) -> Option<f32> {
    get_finite(store, canonical).or_else(|| {
        if schema_version(store) < SCHEMA_VERSION {
            get_finite(store, legacy)
        } else {
            None
        }
    })
}

/// Stored raw up vector, if present and usable as a gravity direction
pub fn load_raw_up<S: CalibrationStore + ?Sized>(store: &S) -> Option<Vector3> {
    get_vec(store, KEY_RAW_UP).filter(is_usable_up)
}

/// Load calibration, migrating the layout first
///
/// Returns `None` when no usable raw up vector is stored ("uncalibrated").
/// Missing or invalid secondary values fall back to defaults: hint +X,
/// zero offsets 0, gravity [`NOMINAL_GRAVITY`]. A stored basis that is
/// missing or not orthonormal is rebuilt from the raw up vector and hint.
pub fn load<S: CalibrationStore + ?Sized>(store: &mut S) -> Option<PersistedCalibration> {
    if let Err(e) = migrate(store) {
        warn!("Store: schema migration failed: {}", e);
    }

    let Some(raw_up) = load_raw_up(store) else {
        info!("Store: no calibration found");
        return None;
    };

    let hint = match store.get_str(KEY_HINT) {
        Some(token) => token.parse::<ForwardHint>().unwrap_or_else(|e| {
            warn!("Store: {}, using {}", e, ForwardHint::default());
            ForwardHint::default()
        }),
        None => ForwardHint::default(),
    };

    let gravity_magnitude = get_with_legacy(store, KEY_GRAVITY, LEGACY_KEY_GRAVITY)
        .filter(|g| *g > 0.0)
        .unwrap_or(NOMINAL_GRAVITY);

    let zero = CalibrationZero::new(
        Degrees(get_with_legacy(store, KEY_PITCH_ZERO, LEGACY_KEY_PITCH_ZERO).unwrap_or(0.0)),
        Degrees(get_with_legacy(store, KEY_ROLL_ZERO, LEGACY_KEY_ROLL_ZERO).unwrap_or(0.0)),
    );

    let basis = match get_basis(store).filter(|b| b.is_orthonormal(BASIS_TOLERANCE)) {
        Some(b) => b,
        None => {
            warn!("Store: stored basis missing or invalid, rebuilding from raw up");
            let b = Basis::from_up_and_hint(raw_up, hint);
            if let Err(e) = set_basis(store, &b) {
                warn!("Store: could not persist rebuilt basis: {}", e);
            }
            b
        }
    };

    info!(
        "Store: loaded calibration hint={}, |g|={:.4}, zero pitch={:.2}° roll={:.2}°",
        hint,
        gravity_magnitude,
        zero.pitch.value(),
        zero.roll.value()
    );

    Some(PersistedCalibration {
        raw_up,
        hint,
        basis,
        zero,
        gravity_magnitude,
    })
}

/// Persist a full calibration in the current layout
pub fn save<S: CalibrationStore + ?Sized>(
    store: &mut S,
    cal: &FrameCalibration,
) -> Result<(), StoreError> {
    save_orientation(store, &cal.raw_up, cal.hint, &cal.basis)?;
    store.set_f32(KEY_PITCH_ZERO, cal.zero.pitch.value())?;
    store.set_f32(KEY_ROLL_ZERO, cal.zero.roll.value())?;
    store.set_f32(KEY_GRAVITY, cal.gravity_magnitude)?;
    store.set_u8(KEY_SCHEMA, SCHEMA_VERSION)?;
    debug!("Store: saved calibration");
    Ok(())
}

/// Persist the orientation part only (raw up, hint, basis)
pub fn save_orientation<S: CalibrationStore + ?Sized>(
    store: &mut S,
    raw_up: &Vector3,
    hint: ForwardHint,
    basis: &Basis,
) -> Result<(), StoreError> {
    set_vec(store, KEY_RAW_UP, raw_up)?;
    store.set_str(KEY_HINT, hint.token())?;
    set_basis(store, basis)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::calibrate_from_raw_up;

    fn v1_store() -> MemoryStore {
        let mut s = MemoryStore::new();
        set_vec(&mut s, KEY_RAW_UP, &Vector3::new(0.0, 0.0, 1.02)).unwrap();
        s.set_str(KEY_HINT, "-Y").unwrap();
        s.set_f32(LEGACY_KEY_GRAVITY, 1.02).unwrap();
        s.set_f32(LEGACY_KEY_PITCH_ZERO, 1.5).unwrap();
        s.set_f32(LEGACY_KEY_ROLL_ZERO, -0.5).unwrap();
        s
    }

    #[test]
    fn test_all_keys_fit_nvs() {
        let mut keys = vec![KEY_SCHEMA, KEY_HINT, KEY_PITCH_ZERO, KEY_ROLL_ZERO, KEY_GRAVITY];
        keys.extend(KEY_RAW_UP);
        keys.extend(KEY_BASIS_FORWARD);
        keys.extend(KEY_BASIS_RIGHT);
        keys.extend(KEY_BASIS_UP);
        for k in keys {
            assert!(k.len() <= 15, "key too long: {}", k);
        }
    }

    #[test]
    fn test_empty_store_is_uncalibrated() {
        let mut s = MemoryStore::new();
        assert!(load(&mut s).is_none());
    }

    #[test]
    fn test_degenerate_raw_up_is_uncalibrated() {
        let mut s = MemoryStore::new();
        set_vec(&mut s, KEY_RAW_UP, &Vector3::ZERO).unwrap();
        assert!(load(&mut s).is_none());
    }

    #[test]
    fn test_migrates_v1() {
        let mut s = v1_store();
        let cal = load(&mut s).unwrap();

        assert_eq!(cal.hint, ForwardHint::MinusY);
        assert!((cal.gravity_magnitude - 1.02).abs() < 1e-6);
        assert_eq!(cal.zero.pitch, Degrees(1.5));
        assert_eq!(cal.zero.roll, Degrees(-0.5));

        assert_eq!(s.get_u8(KEY_SCHEMA), Some(SCHEMA_VERSION));
        assert_eq!(s.get_f32(KEY_GRAVITY), Some(1.02));
        assert_eq!(s.get_f32(KEY_PITCH_ZERO), Some(1.5));
        assert!(!s.contains(LEGACY_KEY_GRAVITY));
        assert!(!s.contains(LEGACY_KEY_PITCH_ZERO));
        assert!(!s.contains(LEGACY_KEY_ROLL_ZERO));

        // Second load is a no-op migration with the same result
        assert_eq!(migrate(&mut s), Ok(false));
        assert_eq!(load(&mut s), Some(cal));
    }

    #[test]
    fn test_canonical_key_wins_over_legacy() {
        let mut s = v1_store();
        s.set_f32(KEY_GRAVITY, 0.99).unwrap();
        let cal = load(&mut s).unwrap();
        assert_eq!(cal.gravity_magnitude, 0.99);
    }

    #[test]
    fn test_read_only_v1_still_loads() {
        let mut s = v1_store();
        s.set_read_only(true);
        let cal = load(&mut s).unwrap();
        assert!((cal.gravity_magnitude - 1.02).abs() < 1e-6);
        assert_eq!(cal.zero.pitch, Degrees(1.5));
        assert_eq!(schema_version(&s), 1);
    }

    #[test]
    fn test_missing_basis_rebuilt_and_persisted() {
        let mut s = v1_store();
        let cal = load(&mut s).unwrap();
        assert!(cal.basis.is_orthonormal(1e-4));
        assert_eq!(get_basis(&s), Some(cal.basis));
    }

    #[test]
    fn test_invalid_basis_rebuilt() {
        let mut s = v1_store();
        let bad = Basis {
            forward: Vector3::new(1.0, 0.0, 0.0),
            right: Vector3::new(1.0, 0.0, 0.0),
            up: Vector3::new(0.0, 0.0, 1.0),
        };
        set_basis(&mut s, &bad).unwrap();
        let cal = load(&mut s).unwrap();
        assert!(cal.basis.is_orthonormal(1e-4));
        assert_eq!(
            cal.basis,
            Basis::from_up_and_hint(Vector3::new(0.0, 0.0, 1.02), ForwardHint::MinusY)
        );
    }

    #[test]
    fn test_bad_hint_and_gravity_default() {
        let mut s = MemoryStore::new();
        set_vec(&mut s, KEY_RAW_UP, &Vector3::new(0.0, 0.0, 1.0)).unwrap();
        s.set_str(KEY_HINT, "sideways").unwrap();
        s.set_f32(KEY_GRAVITY, f32::NAN).unwrap();
        s.set_u8(KEY_SCHEMA, SCHEMA_VERSION).unwrap();
        let cal = load(&mut s).unwrap();
        assert_eq!(cal.hint, ForwardHint::PlusX);
        assert_eq!(cal.gravity_magnitude, NOMINAL_GRAVITY);
        assert_eq!(cal.zero, CalibrationZero::default());
    }

    #[test]
    fn test_save_then_load() {
        let mut s = MemoryStore::new();
        let cal = calibrate_from_raw_up(Vector3::new(0.1, 0.05, 0.98), ForwardHint::PlusY);
        save(&mut s, &cal).unwrap();

        let loaded = load(&mut s).unwrap();
        assert_eq!(loaded.raw_up, cal.raw_up);
        assert_eq!(loaded.hint, cal.hint);
        assert_eq!(loaded.basis, cal.basis);
        assert_eq!(loaded.zero, cal.zero);
        assert_eq!(loaded.gravity_magnitude, cal.gravity_magnitude);
    }

    #[test]
    fn test_read_only_save_fails() {
        let mut s = MemoryStore::new();
        s.set_read_only(true);
        let cal = calibrate_from_raw_up(Vector3::Z, ForwardHint::PlusX);
        assert!(matches!(save(&mut s, &cal), Err(StoreError::Write { .. })));
        assert!(s.is_empty());
    }
}
