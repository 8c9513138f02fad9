//! Flat JSON record for the dashboard page (`GET /sensor`)

use level_fusion::{DirectionalQuad, ForwardHint, LevelSnapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub timestamp_ms: u32,
    pub calibrated: bool,
    pub forward_hint: ForwardHint,

    pub pos_pitch_raw: f32,
    pub pos_roll_raw: f32,
    pub pos_pitch_calibrated: f32,
    pub pos_roll_calibrated: f32,
    pub pos_pitch_avg: f32,
    pub pos_roll_avg: f32,

    // Sensor axes, g and deg/s
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,

    // Gravity-compensated, trailer frame
    pub accel_forward: f32,
    pub accel_right: f32,
    pub accel_up: f32,
    pub gravity_forward: f32,
    pub gravity_right: f32,
    pub gravity_up: f32,
    pub accel_peak: DirectionalQuad,

    pub gyro_pitchup: f32,
    pub gyro_pitchdown: f32,
    pub gyro_rollright: f32,
    pub gyro_rollleft: f32,
    pub gyro_turnright: f32,
    pub gyro_turnleft: f32,
    pub roll_peak: DirectionalQuad,
}

impl From<&LevelSnapshot> for DashboardReport {
    fn from(s: &LevelSnapshot) -> Self {
        Self {
            timestamp_ms: s.timestamp_ms,
            calibrated: s.calibrated,
            forward_hint: s.hint,
            pos_pitch_raw: s.raw_angles.pitch.value(),
            pos_roll_raw: s.raw_angles.roll.value(),
            pos_pitch_calibrated: s.angles.pitch.value(),
            pos_roll_calibrated: s.angles.roll.value(),
            pos_pitch_avg: s.smoothed.pitch.value(),
            pos_roll_avg: s.smoothed.roll.value(),
            ax: s.accel.x,
            ay: s.accel.y,
            az: s.accel.z,
            gx: s.gyro.x,
            gy: s.gyro.y,
            gz: s.gyro.z,
            accel_forward: s.linear_accel.forward,
            accel_right: s.linear_accel.right,
            accel_up: s.linear_accel.up,
            gravity_forward: s.gravity.forward,
            gravity_right: s.gravity.right,
            gravity_up: s.gravity.up,
            accel_peak: s.accel_peak,
            gyro_pitchup: s.rate_split.pitch_up,
            gyro_pitchdown: s.rate_split.pitch_down,
            gyro_rollright: s.rate_split.roll_right,
            gyro_rollleft: s.rate_split.roll_left,
            gyro_turnright: s.rate_split.turn_right,
            gyro_turnleft: s.rate_split.turn_left,
            roll_peak: s.rate_peak,
        }
    }
}

/// Body of `POST /orientation`
#[derive(Debug, Deserialize)]
pub struct OrientationRequest {
    pub forward_hint: String,
}

/// Reply to `GET|POST /orientation` and `POST /calibrate`
#[derive(Debug, Serialize)]
pub struct OrientationReply {
    pub ok: bool,
    pub forward_hint: ForwardHint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gravity_magnitude: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
