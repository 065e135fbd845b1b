/// PD attitude controller and X-quad motor mixer.
///
/// Works entirely in squared rotor speed (ω², (rad/s)²): thrust and torques
/// are linear in ω², so the mixer is a fixed sign matrix and the clamp is a
/// plain per-motor bound.
///
/// Motor layout, viewed from above, nose up the page:
///
///   M0 (front-left)   M1 (front-right)
///   M3 (rear-left)    M2 (rear-right)
///
/// M1 and M3 spin so that speeding them up yaws the airframe positive.
use libm::cosf;

use crate::config::{ControllerParams, FlightConfig};
use crate::drivers::dcm::AttitudeEstimator;
use crate::state::Vec3;

/// Tilt beyond which thrust compensation stops growing (cos ≈ 0.1, ~84°).
const MIN_TILT_COSINE: f32 = 0.1;

/// (roll, pitch, yaw) sign per motor
const MIX: [[f32; 3]; 4] = [
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, 1.0],
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, 1.0],
];

// ── Controller state ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerState {
    /// Vertical thrust demand, kilograms-equivalent
    pub desired_thrust: f32,
    /// roll, pitch, yaw (rad); each within the decoder's attitude limit
    pub desired_attitude: Vec3,
    /// Last commanded ω² per motor
    pub omega_sq: [f32; 4],
    /// Measured pack voltage, V
    pub battery_voltage: f32,
}

impl ControllerState {
    /// Level attitude, hover thrust, motors at the spin floor.
    pub fn new(config: &FlightConfig) -> Self {
        Self {
            desired_thrust: config.setpoint.hover_thrust,
            desired_attitude: [0.0; 3],
            omega_sq: [config.controller.min_omega_sq; 4],
            battery_voltage: config.esc.calibration_voltage,
        }
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new(&FlightConfig::default())
    }
}

// ── Control law ──────────────────────────────────────────────────────────────

/// Summed ω² over all four rotors that holds `desired_thrust` of vertical
/// lift at the given tilt.
pub fn total_thrust(params: &ControllerParams, desired_thrust: f32, roll: f32, pitch: f32) -> f32 {
    let tilt = (cosf(roll) * cosf(pitch)).max(MIN_TILT_COSINE);
    desired_thrust * params.gravity / (params.thrust_constant * tilt)
}

/// Kp·(desired − estimated) + Kd·(0 − rate), per axis. A non-finite axis
/// term contributes nothing.
pub fn pd_errors(params: &ControllerParams, desired: &Vec3, estimated: &Vec3, rates: &Vec3) -> Vec3 {
    let mut e = [0.0f32; 3];
    for i in 0..3 {
        let v = params.kp * (desired[i] - estimated[i]) + params.kd * (0.0 - rates[i]);
        e[i] = if v.is_finite() { v } else { 0.0 };
    }
    e
}

/// Axis errors → torque-equivalents in ω² units.
pub fn torques(params: &ControllerParams, errors: &Vec3) -> Vec3 {
    let lever = params.thrust_constant * params.arm_length;
    [
        params.inertia[0] * errors[0] / lever,
        params.inertia[1] * errors[1] / lever,
        params.inertia[2] * errors[2] / params.drag_constant,
    ]
}

/// Bound to `[min, max]`; NaN goes to the floor.
///
/// Bounds are expected to satisfy `ControllerParams::validate`. With bounds
/// that do not, the result is still defined (floor first, then ceiling) and
/// never panics.
pub fn clamp_omega_sq(params: &ControllerParams, v: f32) -> f32 {
    if v.is_nan() {
        params.min_omega_sq
    } else {
        v.max(params.min_omega_sq).min(params.max_omega_sq)
    }
}

/// Allocate total thrust and torques across the four rotors, then clamp.
pub fn mix(params: &ControllerParams, thrust: f32, torque: &Vec3) -> [f32; 4] {
    let mut out = [0.0f32; 4];
    for (m, signs) in MIX.iter().enumerate() {
        let raw = (thrust + signs[0] * torque[0] + signs[1] * torque[1] + signs[2] * torque[2]) / 4.0;
        out[m] = clamp_omega_sq(params, raw);
    }
    out
}

/// One evaluation of the control law from the current estimate. Stores and
/// returns the clamped per-motor ω².
pub fn compute_motor_commands(
    params: &ControllerParams,
    controller: &mut ControllerState,
    attitude: &AttitudeEstimator,
) -> [f32; 4] {
    let eulers = attitude.eulers();
    let thrust = total_thrust(params, controller.desired_thrust, eulers[0], eulers[1]);
    let errors = pd_errors(params, &controller.desired_attitude, &eulers, &attitude.gyro());
    let cmds = mix(params, thrust, &torques(params, &errors));
    controller.omega_sq = cmds;
    cmds
}
