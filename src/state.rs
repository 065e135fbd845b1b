/// Shared state types crossing task boundaries via Embassy channels.
///
/// All types are `Copy` to minimise overhead when sent through channels.

pub type Vec3 = [f32; 3];

/// One data-ready event worth of sensor readings, in SI units
/// (m/s², rad/s, tesla).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SensorSample {
    pub accel: Vec3,
    pub gyro: Vec3,
    pub mag: Vec3,
}

/// Per-cycle output of the control law, ready for the PWM driver.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotorOutputs {
    /// Commanded squared rotor speed, (rad/s)^2
    pub omega_sq: [f32; 4],
    /// Physical ESC duty in [0, 1]
    pub duty: [f32; 4],
    /// Value for the timer compare register: `1 - duty`
    pub pulse: [f32; 4],
}

/// Snapshot for the status display (written only by the control loop).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AttitudeReport {
    pub sample: SensorSample,
    /// roll, pitch, yaw in radians
    pub eulers: Vec3,
    /// w, x, y, z
    pub quaternion: [f32; 4],
    pub desired_thrust: f32,
    pub desired_attitude: Vec3,
    pub duty: [f32; 4],
    pub divergence_resets: u32,
    pub rejected_samples: u32,
}
