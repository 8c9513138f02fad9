//! Error types shared across the engine

use thiserror::Error;

/// Errors surfaced by the sample source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("sensor I/O failed: {0}")]
    Io(&'static str),
    #[error("sensor not ready")]
    NotReady,
    #[error("operation not supported by this sensor")]
    Unsupported,
}

/// Errors surfaced by a calibration store backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store write failed for key {key}: {reason}")]
    Write { key: String, reason: String },
}

/// Errors returned by engine commands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("invalid forward hint {0:?}, expected one of +X, -X, +Y, -Y")]
    InvalidHint(String),
    #[error("invalid orientation: {0}")]
    InvalidOrientation(String),
}
