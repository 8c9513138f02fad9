//! Trailer Level Fusion
//!
//! Tilt, motion and angular-rate estimation for a towed-vehicle leveling aid,
//! expressed in a user-calibrated trailer frame instead of the sensor's
//! native axes. Hardware-independent: the firmware plugs in an I²C sample
//! source and an NVS store, tests plug in scripted ones.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ SampleSource │ → │ project(basis)│ → │ pitch / roll │ → │ zero offset  │
//! └──────────────┘   └───────────────┘   └──────────────┘   └──────┬───────┘
//!                                                     ┌────────────┴────────────┐
//!                                                     ▼                         ▼
//!                                             gravity removal              smoother
//!                                                     │
//!                                                     ▼
//!                                            six-way split → peak hold
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use level_fusion::{EngineConfig, LevelEngine, MemoryStore, SampleSource};
//!
//! fn run(source: &mut dyn SampleSource) {
//!     let mut store = MemoryStore::new();
//!     let mut engine = LevelEngine::load(EngineConfig::default(), &mut store, source);
//!
//!     engine.recalibrate(source, &mut store);
//!     let snap = engine.tick(source, 20);
//!     println!("pitch {:.1}°", snap.smoothed.pitch.value());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`engine`] - Owns calibration and per-tick state
//! - [`frame`] - Forward hint, basis construction, projection
//! - [`calibration`] - Averaging gravity into a basis + zero pose
//! - [`angles`] - Pitch/roll from projected gravity
//! - [`transforms`] - Gravity compensation and directional splitting
//! - [`filter`] - Display smoothing
//! - [`peak`] - Decaying peak-hold
//! - [`store`] - Persisted calibration and schema migration
//! - [`sensors`] - Sample source trait and read-failure recovery

pub mod angles;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod frame;
pub mod peak;
pub mod sensors;
pub mod snapshot;
pub mod store;
pub mod transforms;
pub mod units;
pub mod vector;

// Re-export commonly used types
pub use angles::{CalibrationZero, TiltAngles};
pub use config::EngineConfig;
pub use engine::{CalibrationOutcome, LevelEngine};
pub use error::{LevelError, SensorError, StoreError};
pub use frame::{Basis, ForwardHint, FrameVector};
pub use peak::{DirectionalQuad, PeakHoldTracker};
pub use sensors::{PartialSample, RawSample, SampleQuality, SampleSource, SampleStats};
pub use snapshot::LevelSnapshot;
pub use store::{CalibrationStore, MemoryStore};
pub use transforms::{AccelSplit, RateSplit};
pub use units::{Degrees, Radians};
pub use vector::Vector3;
