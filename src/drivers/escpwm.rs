/// ω² → ESC duty cycle, and the actuator seam.
///
/// The ESC curve is a bench-fitted quadratic in RPM at one pack voltage. The
/// timer output is inverted relative to the ESC input, so what the PWM
/// peripheral receives is `1 − duty`.
use core::f32::consts::PI;

use libm::sqrtf;

use crate::config::{EscCurve, MOTOR_COUNT};
use crate::state::MotorOutputs;

// ── ESC power-on calibration ─────────────────────────────────────────────────

/// Physical duty held at power-on so the ESC learns full throttle
pub const CALIBRATION_HIGH_DUTY: f32 = 0.99;
/// Physical duty held afterwards to mark the throttle floor
pub const CALIBRATION_LOW_DUTY: f32 = 0.5;
pub const CALIBRATION_HOLD_MS: u64 = 3000;

/// Something that can drive four ESC signal lines.
///
/// `value` is the timer compare fraction in `[0, 1]`, already inverted.
pub trait MotorOutput {
    fn set_motor_duty_cycle(&mut self, index: usize, value: f32);
}

/// Duty for a requested ω². `battery_voltage` is carried for a future
/// compensation term and currently ignored: the curve is only valid at
/// `curve.calibration_voltage`.
pub fn map_to_duty_cycle(curve: &EscCurve, omega_sq: f32, battery_voltage: f32) -> f32 {
    let _ = battery_voltage;

    let rpm = if omega_sq.is_nan() || omega_sq <= 0.0 {
        0.0
    } else {
        sqrtf(omega_sq) * 60.0 / (2.0 * PI)
    };
    let duty = curve.a * rpm * rpm + curve.b * rpm + curve.c;
    if duty.is_nan() {
        return curve.c.clamp(0.0, 1.0);
    }
    duty.clamp(0.0, 1.0)
}

/// Compare fraction for a physical duty.
pub fn pulse_for(duty: f32) -> f32 {
    1.0 - duty.clamp(0.0, 1.0)
}

/// Duty the curve gives for a stopped rotor.
pub fn idle_duty(curve: &EscCurve) -> f32 {
    map_to_duty_cycle(curve, 0.0, curve.calibration_voltage)
}

pub fn motor_outputs(curve: &EscCurve, omega_sq: &[f32; MOTOR_COUNT], battery_voltage: f32) -> MotorOutputs {
    let mut out = MotorOutputs {
        omega_sq: *omega_sq,
        ..MotorOutputs::default()
    };
    for m in 0..MOTOR_COUNT {
        out.duty[m] = map_to_duty_cycle(curve, omega_sq[m], battery_voltage);
        out.pulse[m] = pulse_for(out.duty[m]);
    }
    out
}

/// Outputs that hold every ESC at its idle duty.
pub fn idle_outputs(curve: &EscCurve) -> MotorOutputs {
    let duty = idle_duty(curve);
    MotorOutputs {
        omega_sq: [0.0; MOTOR_COUNT],
        duty: [duty; MOTOR_COUNT],
        pulse: [pulse_for(duty); MOTOR_COUNT],
    }
}

pub fn apply<M: MotorOutput>(motors: &mut M, outputs: &MotorOutputs) {
    for (m, &pulse) in outputs.pulse.iter().enumerate() {
        motors.set_motor_duty_cycle(m, pulse);
    }
}

/// Drive every ESC at one physical duty (calibration, failsafe).
pub fn set_all<M: MotorOutput>(motors: &mut M, duty: f32) {
    let pulse = pulse_for(duty);
    for m in 0..MOTOR_COUNT {
        motors.set_motor_duty_cycle(m, pulse);
    }
}
