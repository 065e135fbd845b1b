//! Tuning, physical constants and limits.
//!
//! Values are compile-time defaults; the structs exist so a build can swap a
//! set of them at once and so each set is validated before use.

use core::f32::consts::PI;

use crate::error::ConfigError;

// ── Timing ────────────────────────────────────────────────────────────────────

/// Sensor data-ready / control rate
pub const CONTROL_RATE_HZ: u32 = 250;
/// Stationary samples averaged for the gyroscope bias at power-on
pub const GYRO_BIAS_SAMPLES: usize = 2000;
/// Only every Nth cycle is pushed to the status display
pub const PRINT_SKIP_COUNT: u32 = 10;

// ── Link / actuators ──────────────────────────────────────────────────────────

/// Bytes per radio command packet
pub const PACKET_LENGTH: usize = 14;
pub const RADIO_BAUD: u32 = 9600;
/// ESC PWM carrier
pub const ESC_PWM_HZ: u32 = 490;
pub const MOTOR_COUNT: usize = 4;

// ── Airframe ──────────────────────────────────────────────────────────────────

pub const GRAVITY: f32 = 9.81;
pub const MAX_MOTOR_RPM: f32 = 6360.0;
/// Spin floor kept in flight so no rotor ever stops
pub const MIN_MOTOR_RPM: f32 = 1200.0;
const MAX_MOTOR_OMEGA: f32 = 2.0 * PI * MAX_MOTOR_RPM / 60.0;
const MIN_MOTOR_OMEGA: f32 = 2.0 * PI * MIN_MOTOR_RPM / 60.0;
pub const MAX_OMEGA_SQ: f32 = MAX_MOTOR_OMEGA * MAX_MOTOR_OMEGA;
pub const MIN_OMEGA_SQ: f32 = MIN_MOTOR_OMEGA * MIN_MOTOR_OMEGA;
/// One motor lifts 0.62 kg at full speed: N per (rad/s)^2
pub const THRUST_CONSTANT: f32 = 0.62 * GRAVITY / MAX_OMEGA_SQ;
/// Rotor drag torque constant, N·m per (rad/s)^2
pub const DRAG_CONSTANT: f32 = 5.0e-6;
pub const ARM_LENGTH: f32 = 0.25;
pub const INERTIA: [f32; 3] = [0.00884, 0.00884, 0.0165];

pub const KP: f32 = 4.0;
pub const KD: f32 = 3.0;

// ── Estimator ─────────────────────────────────────────────────────────────────

const WEIGHT_SUM_TOLERANCE: f32 = 1.0e-4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DcmConfig {
    /// Seconds between `update` calls
    pub sample_period: f32,
    pub weight_accel: f32,
    pub weight_gyro: f32,
    pub weight_mag: f32,
}

impl Default for DcmConfig {
    fn default() -> Self {
        Self {
            sample_period: 1.0 / CONTROL_RATE_HZ as f32,
            weight_accel: 0.02,
            weight_gyro: 0.96,
            weight_mag: 0.02,
        }
    }
}

impl DcmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sample_period.is_finite() || self.sample_period <= 0.0 {
            return Err(ConfigError::NonPositiveSamplePeriod);
        }
        let weights = [self.weight_accel, self.weight_gyro, self.weight_mag];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::WeightsDoNotSumToOne);
        }
        let sum: f32 = weights.iter().sum();
        if libm::fabsf(sum - 1.0) > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightsDoNotSumToOne);
        }
        Ok(())
    }
}

// ── Control law ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControllerParams {
    pub gravity: f32,
    pub thrust_constant: f32,
    pub drag_constant: f32,
    pub arm_length: f32,
    /// Ixx, Iyy, Izz in kg·m^2
    pub inertia: [f32; 3],
    pub kp: f32,
    pub kd: f32,
    pub min_omega_sq: f32,
    pub max_omega_sq: f32,
}

impl Default for ControllerParams {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            thrust_constant: THRUST_CONSTANT,
            drag_constant: DRAG_CONSTANT,
            arm_length: ARM_LENGTH,
            inertia: INERTIA,
            kp: KP,
            kd: KD,
            min_omega_sq: MIN_OMEGA_SQ,
            max_omega_sq: MAX_OMEGA_SQ,
        }
    }
}

impl ControllerParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            self.gravity,
            self.thrust_constant,
            self.drag_constant,
            self.arm_length,
            self.inertia[0],
            self.inertia[1],
            self.inertia[2],
        ];
        if positive.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(ConfigError::InvalidLimits);
        }
        if !self.kp.is_finite() || !self.kd.is_finite() {
            return Err(ConfigError::InvalidLimits);
        }
        if !self.min_omega_sq.is_finite()
            || !self.max_omega_sq.is_finite()
            || self.min_omega_sq <= 0.0
            || self.min_omega_sq >= self.max_omega_sq
        {
            return Err(ConfigError::InvalidLimits);
        }
        Ok(())
    }
}

// ── Setpoint decoding ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SetpointConfig {
    pub thrust_offset: usize,
    pub yaw_offset: usize,
    pub pitch_offset: usize,
    pub roll_offset: usize,
    /// Bytes strictly below this nudge the channel down
    pub low_threshold: u8,
    /// Bytes strictly above this nudge the channel up
    pub high_threshold: u8,
    pub thrust_step: f32,
    pub thrust_min: f32,
    pub thrust_max: f32,
    /// Thrust at power-on, kg-equivalent
    pub hover_thrust: f32,
    pub attitude_step: f32,
    /// Symmetric bound on each desired angle, rad
    pub attitude_limit: f32,
}

impl Default for SetpointConfig {
    fn default() -> Self {
        Self {
            thrust_offset: 3,
            yaw_offset: 4,
            pitch_offset: 5,
            roll_offset: 6,
            low_threshold: 10,
            high_threshold: 240,
            thrust_step: 0.005,
            thrust_min: 0.08,
            thrust_max: 1.2,
            hover_thrust: 0.3,
            attitude_step: 0.005,
            attitude_limit: 0.15,
        }
    }
}

impl SetpointConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let offsets = [
            self.thrust_offset,
            self.yaw_offset,
            self.pitch_offset,
            self.roll_offset,
        ];
        if offsets.iter().any(|&o| o >= PACKET_LENGTH) {
            return Err(ConfigError::InvalidBounds);
        }
        if self.low_threshold >= self.high_threshold {
            return Err(ConfigError::InvalidBounds);
        }
        let finite = [
            self.thrust_step,
            self.thrust_min,
            self.thrust_max,
            self.hover_thrust,
            self.attitude_step,
            self.attitude_limit,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidBounds);
        }
        if self.thrust_step <= 0.0 || self.attitude_step <= 0.0 || self.attitude_limit <= 0.0 {
            return Err(ConfigError::InvalidBounds);
        }
        if self.thrust_min <= 0.0
            || self.thrust_min >= self.thrust_max
            || self.hover_thrust < self.thrust_min
            || self.hover_thrust > self.thrust_max
        {
            return Err(ConfigError::InvalidBounds);
        }
        Ok(())
    }
}

// ── ESC calibration curve ─────────────────────────────────────────────────────

/// Duty = a·rpm² + b·rpm + c, fitted on the bench at `calibration_voltage`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EscCurve {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub calibration_voltage: f32,
}

impl Default for EscCurve {
    fn default() -> Self {
        Self {
            a: 6.0e-9,
            b: 3.7e-5,
            c: 0.5,
            calibration_voltage: 11.1,
        }
    }
}

// ── Aggregate ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlightConfig {
    pub dcm: DcmConfig,
    pub controller: ControllerParams,
    pub setpoint: SetpointConfig,
    pub esc: EscCurve,
}

impl FlightConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dcm.validate()?;
        self.controller.validate()?;
        self.setpoint.validate()?;
        let esc = [self.esc.a, self.esc.b, self.esc.c, self.esc.calibration_voltage];
        if esc.iter().any(|v| !v.is_finite()) || self.esc.calibration_voltage <= 0.0 {
            return Err(ConfigError::InvalidLimits);
        }
        Ok(())
    }
}
