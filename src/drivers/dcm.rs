/// Complementary-filter attitude estimator on a Direction Cosine Matrix.
///
/// The matrix maps body-frame vectors into the reference frame. It is seeded
/// once from gravity (`start`) and then integrated from the gyroscope at a
/// fixed sample period with a closed-form exponential map:
///
///   R(k+1) = R(k) · (I + c1·dt·B + c2·dt²·B²)
///   c1 = sin σ / σ,  c2 = (1 − cos σ) / σ²,  σ = |ω|·dt
///
/// where B is the skew-symmetric matrix of the body rate ω. Accelerometer and
/// magnetometer readings and the fusion weights are stored but do not correct
/// the integration: the estimate is a pure gyro integrator.
///
/// No allocation, flat `[[f32; 3]; 3]` arrays. All trig and roots go through
/// `libm` so host tests run the same arithmetic as the target.
use libm::{asinf, atan2f, cosf, sinf, sqrtf};

use crate::config::DcmConfig;
use crate::error::{ConfigError, DcmError};
use crate::state::Vec3;

pub type Mat3 = [[f32; 3]; 3];

pub const IDENTITY: Mat3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Below this step angle the Rodrigues coefficients come from their Taylor
/// series; `1 - cos σ` is all rounding error in f32 down here.
const SMALL_ANGLE: f32 = 1.0e-3;

// ── Quaternion ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

impl Quaternion {
    /// Rotation matrix → unit quaternion.
    ///
    /// Computes `1 ± R00 ± R11 ± R22` for all four components, takes the square
    /// root of the largest only, and derives the other three from the
    /// off-diagonal sums/differences over `4·q_max`, so the divisor never
    /// approaches zero.
    pub fn from_matrix(r: &Mat3) -> Self {
        let qs = 1.0 + r[0][0] + r[1][1] + r[2][2];
        let qx = 1.0 + r[0][0] - r[1][1] - r[2][2];
        let qy = 1.0 - r[0][0] + r[1][1] - r[2][2];
        let qz = 1.0 - r[0][0] - r[1][1] + r[2][2];

        if qs > qx && qs > qy && qs > qz {
            let w = sqrtf(qs) / 2.0;
            Self {
                w,
                x: (r[2][1] - r[1][2]) / (4.0 * w),
                y: (r[0][2] - r[2][0]) / (4.0 * w),
                z: (r[1][0] - r[0][1]) / (4.0 * w),
            }
        } else if qx > qy && qx > qz {
            let x = sqrtf(qx) / 2.0;
            Self {
                w: (r[2][1] - r[1][2]) / (4.0 * x),
                x,
                y: (r[1][0] + r[0][1]) / (4.0 * x),
                z: (r[0][2] + r[2][0]) / (4.0 * x),
            }
        } else if qy > qz {
            let y = sqrtf(qy) / 2.0;
            Self {
                w: (r[0][2] - r[2][0]) / (4.0 * y),
                x: (r[1][0] + r[0][1]) / (4.0 * y),
                y,
                z: (r[2][1] + r[1][2]) / (4.0 * y),
            }
        } else {
            let z = sqrtf(qz) / 2.0;
            Self {
                w: (r[1][0] - r[0][1]) / (4.0 * z),
                x: (r[0][2] + r[2][0]) / (4.0 * z),
                y: (r[2][1] + r[1][2]) / (4.0 * z),
                z,
            }
        }
    }

    /// Unit quaternion → rotation matrix (body → reference).
    pub fn to_matrix(&self) -> Mat3 {
        let (w, x, y, z) = (self.w, self.x, self.y, self.z);
        [
            [
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y - w * z),
                2.0 * (x * z + w * y),
            ],
            [
                2.0 * (x * y + w * z),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z - w * x),
            ],
            [
                2.0 * (x * z - w * y),
                2.0 * (y * z + w * x),
                1.0 - 2.0 * (x * x + y * y),
            ],
        ]
    }

    pub fn norm(&self) -> f32 {
        sqrtf(self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z)
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.w, self.x, self.y, self.z]
    }
}

// ── Matrix helpers ───────────────────────────────────────────────────────────

/// R = Rz(yaw) · Ry(pitch) · Rx(roll)
pub fn rotation_from_eulers(roll: f32, pitch: f32, yaw: f32) -> Mat3 {
    let (sr, cr) = (sinf(roll), cosf(roll));
    let (sp, cp) = (sinf(pitch), cosf(pitch));
    let (sy, cy) = (sinf(yaw), cosf(yaw));
    [
        [cy * cp, cy * sp * sr - sy * cr, cy * sp * cr + sy * sr],
        [sy * cp, sy * sp * sr + cy * cr, sy * sp * cr - cy * sr],
        [-sp, cp * sr, cp * cr],
    ]
}

fn mat_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut c = [[0.0f32; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            c[i][j] = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    c
}

fn is_finite_mat(m: &Mat3) -> bool {
    m.iter().flatten().all(|v| v.is_finite())
}

fn is_finite_vec(x: f32, y: f32, z: f32) -> bool {
    x.is_finite() && y.is_finite() && z.is_finite()
}

/// (sin σ / σ, (1 − cos σ) / σ²)
///
/// The second term is evaluated as `2·sin²(σ/2) / σ²`; `1 − cos σ` loses most
/// of its bits to cancellation for the step angles seen at 250 Hz.
fn rodrigues_coefficients(sigma: f32) -> (f32, f32) {
    if sigma < SMALL_ANGLE {
        let s2 = sigma * sigma;
        (1.0 - s2 / 6.0, 0.5 - s2 / 24.0)
    } else {
        let h = sinf(0.5 * sigma);
        (sinf(sigma) / sigma, 2.0 * h * h / (sigma * sigma))
    }
}

/// Incremental rotation over one sample period for body rate `w`.
fn increment(w: &Vec3, dt: f32) -> Mat3 {
    let sigma = sqrtf(w[0] * w[0] + w[1] * w[1] + w[2] * w[2]) * dt;
    let (c1, c2) = rodrigues_coefficients(sigma);

    let b = [
        [0.0, -w[2], w[1]],
        [w[2], 0.0, -w[0]],
        [-w[1], w[0], 0.0],
    ];
    let b_sq = [
        [-w[1] * w[1] - w[2] * w[2], w[0] * w[1], w[0] * w[2]],
        [w[0] * w[1], -w[0] * w[0] - w[2] * w[2], w[1] * w[2]],
        [w[0] * w[2], w[1] * w[2], -w[0] * w[0] - w[1] * w[1]],
    ];

    let k1 = dt * c1;
    let k2 = dt * dt * c2;
    let mut inc = IDENTITY;
    for i in 0..3 {
        for j in 0..3 {
            inc[i][j] += k1 * b[i][j] + k2 * b_sq[i][j];
        }
    }
    inc
}

/// Re-orthonormalise rows 0 and 1 against each other, rebuild row 2 as their
/// cross product, then rescale each row with a first-order norm correction.
fn renormalize(r: &mut Mat3) {
    let dot = |a: &[f32; 3], b: &[f32; 3]| a[0] * b[0] + a[1] * b[1] + a[2] * b[2];

    let err = dot(&r[0], &r[1]);
    let x = r[0];
    let y = r[1];
    let mut x_o = [0.0f32; 3];
    let mut y_o = [0.0f32; 3];
    for i in 0..3 {
        x_o[i] = x[i] - 0.5 * err * y[i];
        y_o[i] = y[i] - 0.5 * err * x[i];
    }
    let z_o = [
        x_o[1] * y_o[2] - x_o[2] * y_o[1],
        x_o[2] * y_o[0] - x_o[0] * y_o[2],
        x_o[0] * y_o[1] - x_o[1] * y_o[0],
    ];

    for (row, v) in [x_o, y_o, z_o].iter().enumerate() {
        let scale = 0.5 * (3.0 - dot(v, v));
        for i in 0..3 {
            r[row][i] = v[i] * scale;
        }
    }
}

// ── Estimator ────────────────────────────────────────────────────────────────

pub struct AttitudeEstimator {
    /// Body → reference rotation
    dcm: Mat3,
    accel: Vec3,
    /// Bias-corrected body rate, rad/s
    gyro: Vec3,
    mag: Vec3,
    gyro_bias: Vec3,
    /// roll, pitch, yaw (rad)
    eulers: Vec3,
    dt: f32,
    /// accelerometer, gyroscope, magnetometer
    weights: Vec3,
    has_accel: bool,
    started: bool,
    divergence_resets: u32,
}

impl AttitudeEstimator {
    /// Identity attitude, zero bias, validated period and weights.
    pub fn new(config: &DcmConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            dcm: IDENTITY,
            accel: [0.0; 3],
            gyro: [0.0; 3],
            mag: [0.0; 3],
            gyro_bias: [0.0; 3],
            eulers: [0.0; 3],
            dt: config.sample_period,
            weights: [config.weight_accel, config.weight_gyro, config.weight_mag],
            has_accel: false,
            started: false,
            divergence_resets: 0,
        })
    }

    pub fn init(
        dt: f32,
        weight_accel: f32,
        weight_gyro: f32,
        weight_mag: f32,
    ) -> Result<Self, ConfigError> {
        Self::new(&DcmConfig {
            sample_period: dt,
            weight_accel,
            weight_gyro,
            weight_mag,
        })
    }

    /// Install the calibration-pass bias. Applies to gyro readings stored
    /// after this call.
    pub fn set_gyro_bias(&mut self, bias: Vec3) -> Result<(), DcmError> {
        if !is_finite_vec(bias[0], bias[1], bias[2]) {
            return Err(DcmError::InvalidInput);
        }
        self.gyro_bias = bias;
        Ok(())
    }

    pub fn update_accel(&mut self, x: f32, y: f32, z: f32) -> Result<(), DcmError> {
        if !is_finite_vec(x, y, z) {
            warn!("dcm: rejected non-finite accel sample");
            return Err(DcmError::InvalidInput);
        }
        self.accel = [x, y, z];
        self.has_accel = true;
        Ok(())
    }

    pub fn update_gyro(&mut self, x: f32, y: f32, z: f32) -> Result<(), DcmError> {
        if !is_finite_vec(x, y, z) {
            warn!("dcm: rejected non-finite gyro sample");
            return Err(DcmError::InvalidInput);
        }
        self.gyro = [
            x - self.gyro_bias[0],
            y - self.gyro_bias[1],
            z - self.gyro_bias[2],
        ];
        Ok(())
    }

    pub fn update_magneto(&mut self, x: f32, y: f32, z: f32) -> Result<(), DcmError> {
        if !is_finite_vec(x, y, z) {
            warn!("dcm: rejected non-finite mag sample");
            return Err(DcmError::InvalidInput);
        }
        self.mag = [x, y, z];
        Ok(())
    }

    /// Seed the matrix from the stored accelerometer reading.
    ///
    /// With the normalised reading `a/|a|`, pitch β comes from
    /// `atan2(a_x, sqrt(1 − a_x²))` and roll γ from `atan2(a_y, a_z)`; yaw is
    /// unobservable from gravity and starts at zero.
    pub fn start(&mut self) -> Result<(), DcmError> {
        if self.started {
            return Err(DcmError::AlreadyStarted);
        }
        if !self.has_accel {
            return Err(DcmError::NoAccelSample);
        }

        let [ax, ay, az] = self.accel;
        let g = sqrtf(ax * ax + ay * ay + az * az);
        if !(g > 0.0) {
            return Err(DcmError::ZeroGravity);
        }

        let r31 = -ax / g;
        let r32 = ay / g;
        let r33 = az / g;
        let r11 = sqrtf((1.0 - r31 * r31).max(0.0));

        let beta = atan2f(-r31, r11);
        // cos β = r11 ≥ 0, so dividing both atan2 arguments by it is a no-op
        let gamma = atan2f(r32, r33);

        let (sb, cb) = (sinf(beta), cosf(beta));
        let (sg, cg) = (sinf(gamma), cosf(gamma));
        self.dcm = [
            [cb, sb * sg, sb * cg],
            [0.0, cg, -sg],
            [-sb, cb * sg, cb * cg],
        ];
        self.eulers = self.compute_eulers();
        self.started = true;

        info!(
            "dcm: started, roll={} pitch={} g={}",
            self.eulers[0],
            self.eulers[1],
            g
        );
        Ok(())
    }

    /// Advance the rotation by one sample period from the stored gyro rate.
    pub fn update(&mut self) -> Result<(), DcmError> {
        if !self.started {
            return Err(DcmError::NotStarted);
        }

        if !is_finite_mat(&self.dcm) {
            self.dcm = IDENTITY;
            self.divergence_resets = self.divergence_resets.wrapping_add(1);
            warn!("dcm: non-finite matrix, reset to identity (#{})", self.divergence_resets);
        }

        let w = self.gyro;
        if w[0] != 0.0 || w[1] != 0.0 || w[2] != 0.0 {
            let inc = increment(&w, self.dt);
            self.dcm = mat_mul(&self.dcm, &inc);
            renormalize(&mut self.dcm);
        }

        self.eulers = self.compute_eulers();
        Ok(())
    }

    pub fn roll(&self) -> f32 {
        atan2f(self.dcm[2][1], self.dcm[2][2])
    }

    pub fn pitch(&self) -> f32 {
        // rounding can push |R20| a hair past one
        -asinf(self.dcm[2][0].clamp(-1.0, 1.0))
    }

    pub fn yaw(&self) -> f32 {
        atan2f(self.dcm[1][0], self.dcm[0][0])
    }

    /// Z-Y-X Euler angles (roll, pitch, yaw) of the current matrix.
    pub fn compute_eulers(&self) -> Vec3 {
        [self.roll(), self.pitch(), self.yaw()]
    }

    pub fn compute_quaternion(&self) -> Quaternion {
        Quaternion::from_matrix(&self.dcm)
    }

    pub fn matrix(&self) -> Mat3 {
        self.dcm
    }

    /// Euler angles as of the last `start`/`update`.
    pub fn eulers(&self) -> Vec3 {
        self.eulers
    }

    pub fn accel(&self) -> Vec3 {
        self.accel
    }

    pub fn gyro(&self) -> Vec3 {
        self.gyro
    }

    pub fn mag(&self) -> Vec3 {
        self.mag
    }

    pub fn gyro_bias(&self) -> Vec3 {
        self.gyro_bias
    }

    pub fn sample_period(&self) -> f32 {
        self.dt
    }

    pub fn weights(&self) -> Vec3 {
        self.weights
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Times the matrix went non-finite and was reset.
    pub fn divergence_resets(&self) -> u32 {
        self.divergence_resets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn started_level() -> AttitudeEstimator {
        let mut dcm = AttitudeEstimator::new(&DcmConfig::default()).unwrap();
        dcm.update_accel(0.0, 0.0, 9.81).unwrap();
        dcm.start().unwrap();
        dcm
    }

    fn assert_mat_eq(a: &Mat3, b: &Mat3, eps: f32) {
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(a[i][j], b[i][j], epsilon = eps);
            }
        }
    }

    fn orthonormality_error(r: &Mat3) -> f32 {
        let mut worst = 0.0f32;
        for i in 0..3 {
            for j in 0..3 {
                let d: f32 = (0..3).map(|k| r[i][k] * r[j][k]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                worst = worst.max((d - expected).abs());
            }
        }
        worst
    }

    // orientations hitting all four branches of the quaternion extraction
    const ORIENTATIONS: [(f32, f32, f32); 9] = [
        (0.0, 0.0, 0.0),
        (0.3, -0.2, 1.0),
        (3.0, 0.1, 0.2),
        (0.1, 0.2, 3.1),
        (3.1, 0.0, 3.1),
        (-2.5, 0.7, -1.2),
        (1.2, -1.3, 2.9),
        (-3.1, -0.4, 0.05),
        (0.0, 1.5, 0.0),
    ];

    #[test]
    fn init_rejects_bad_weights() {
        assert!(matches!(
            AttitudeEstimator::init(0.004, 0.3, 0.3, 0.3),
            Err(ConfigError::WeightsDoNotSumToOne)
        ));
        assert!(AttitudeEstimator::init(0.004, 0.0, 1.0, 0.0).is_ok());
    }

    #[test]
    fn new_estimator_is_identity() {
        let dcm = AttitudeEstimator::new(&DcmConfig::default()).unwrap();
        assert_eq!(dcm.matrix(), IDENTITY);
        assert_eq!(dcm.gyro_bias(), [0.0; 3]);
        assert!(!dcm.is_started());
    }

    #[test]
    fn quaternion_round_trip() {
        for &(r, p, y) in ORIENTATIONS.iter() {
            let m = rotation_from_eulers(r, p, y);
            let q = Quaternion::from_matrix(&m);
            assert_abs_diff_eq!(q.norm(), 1.0, epsilon = 1e-5);
            assert_mat_eq(&q.to_matrix(), &m, 1e-4);
        }
    }

    #[test]
    fn identity_quaternion() {
        let q = Quaternion::from_matrix(&IDENTITY);
        assert_eq!(q, Quaternion::default());
    }

    #[test]
    fn eulers_recovered_from_composed_matrix() {
        let cases = [
            (0.0, 0.0, 0.0),
            (0.3, -0.2, 1.0),
            (-1.0, 0.5, -2.0),
            (2.5, 1.2, 3.0),
            (-3.0, -1.4, 0.1),
        ];
        for &(r, p, y) in cases.iter() {
            let mut dcm = AttitudeEstimator::new(&DcmConfig::default()).unwrap();
            dcm.dcm = rotation_from_eulers(r, p, y);
            let e = dcm.compute_eulers();
            assert_abs_diff_eq!(e[0], r, epsilon = 1e-4);
            assert_abs_diff_eq!(e[1], p, epsilon = 1e-4);
            assert_abs_diff_eq!(e[2], y, epsilon = 1e-4);
        }
    }

    #[test]
    fn partial_extraction_matches_full() {
        let mut dcm = AttitudeEstimator::new(&DcmConfig::default()).unwrap();
        dcm.dcm = rotation_from_eulers(0.4, -0.3, 0.9);
        let e = dcm.compute_eulers();
        assert_eq!(dcm.roll(), e[0]);
        assert_eq!(dcm.pitch(), e[1]);
        assert_eq!(dcm.yaw(), e[2]);
    }

    #[test]
    fn start_requires_accel_sample() {
        let mut dcm = AttitudeEstimator::new(&DcmConfig::default()).unwrap();
        assert_eq!(dcm.start(), Err(DcmError::NoAccelSample));
        dcm.update_accel(0.0, 0.0, 0.0).unwrap();
        assert_eq!(dcm.start(), Err(DcmError::ZeroGravity));
    }

    #[test]
    fn start_only_once_and_before_update() {
        let mut dcm = AttitudeEstimator::new(&DcmConfig::default()).unwrap();
        assert_eq!(dcm.update(), Err(DcmError::NotStarted));
        dcm.update_accel(0.0, 0.0, 9.81).unwrap();
        dcm.start().unwrap();
        assert_eq!(dcm.start(), Err(DcmError::AlreadyStarted));
    }

    #[test]
    fn start_level_gives_identity() {
        let dcm = started_level();
        assert_mat_eq(&dcm.matrix(), &IDENTITY, 1e-6);
        assert_eq!(dcm.eulers(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn start_seeds_tilt_from_gravity() {
        let (roll, pitch) = (0.3f32, -0.2f32);
        // the sensor x axis reads +g when the nose is pitched up
        let m = rotation_from_eulers(roll, pitch, 0.0);
        let g = 9.81;
        let mut dcm = AttitudeEstimator::new(&DcmConfig::default()).unwrap();
        dcm.update_accel(-m[2][0] * g, m[2][1] * g, m[2][2] * g)
            .unwrap();
        dcm.start().unwrap();

        assert_mat_eq(&dcm.matrix(), &m, 1e-5);
        assert_abs_diff_eq!(dcm.eulers()[0], roll, epsilon = 1e-5);
        assert_abs_diff_eq!(dcm.eulers()[1], pitch, epsilon = 1e-5);
        assert_abs_diff_eq!(dcm.eulers()[2], 0.0, epsilon = 1e-6);
        assert!(orthonormality_error(&dcm.matrix()) < 1e-5);
    }

    #[test]
    fn zero_rate_leaves_matrix_unchanged() {
        let mut dcm = AttitudeEstimator::new(&DcmConfig::default()).unwrap();
        dcm.update_accel(1.0, -2.0, 9.0).unwrap();
        dcm.start().unwrap();
        let before = dcm.matrix();
        dcm.update_gyro(0.0, 0.0, 0.0).unwrap();
        for _ in 0..100 {
            dcm.update().unwrap();
        }
        assert_mat_eq(&dcm.matrix(), &before, f32::EPSILON);
    }

    #[test]
    fn tiny_rate_uses_series_coefficients() {
        let (c1, c2) = rodrigues_coefficients(0.0);
        assert_eq!((c1, c2), (1.0, 0.5));
        let (c1, c2) = rodrigues_coefficients(SMALL_ANGLE * 0.5);
        assert!(c1.is_finite() && c2.is_finite());
        assert_abs_diff_eq!(c1, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c2, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn rodrigues_coefficients_match_f64_reference() {
        // closed-form branch, from the series hand-off up to 12.5 rad/s at 250 Hz
        for i in 0..=98 {
            let sigma = SMALL_ANGLE + 5.0e-4 * i as f32;
            let (c1, c2) = rodrigues_coefficients(sigma);
            let s = sigma as f64;
            let ref_c1 = s.sin() / s;
            let ref_c2 = (1.0 - s.cos()) / (s * s);
            assert_relative_eq!(c1 as f64, ref_c1, max_relative = 1e-6);
            assert_relative_eq!(c2 as f64, ref_c2, max_relative = 1e-5);
        }
        // no jump across the branch boundary
        let below = rodrigues_coefficients(SMALL_ANGLE * 0.999);
        let above = rodrigues_coefficients(SMALL_ANGLE);
        assert_abs_diff_eq!(below.0, above.0, epsilon = 1e-6);
        assert_abs_diff_eq!(below.1, above.1, epsilon = 1e-6);
    }

    #[test]
    fn constant_yaw_rate_integrates_exactly() {
        let mut dcm = started_level();
        dcm.update_gyro(0.0, 0.0, 0.5).unwrap();
        // 250 steps of 4 ms = 1 s
        for _ in 0..250 {
            dcm.update().unwrap();
        }
        let e = dcm.eulers();
        assert_abs_diff_eq!(e[0], 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(e[1], 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(e[2], 0.5, epsilon = 1e-4);
    }

    #[test]
    fn large_step_matches_axis_angle_rotation() {
        // σ well outside the series branch
        let mut dcm = AttitudeEstimator::init(0.1, 0.0, 1.0, 0.0).unwrap();
        dcm.update_accel(0.0, 0.0, 9.81).unwrap();
        dcm.start().unwrap();
        dcm.update_gyro(4.0, 0.0, 0.0).unwrap();
        dcm.update().unwrap();
        assert_abs_diff_eq!(dcm.roll(), 0.4, epsilon = 1e-5);
    }

    #[test]
    fn gyro_bias_is_subtracted() {
        let mut dcm = started_level();
        dcm.set_gyro_bias([0.01, -0.02, 0.03]).unwrap();
        dcm.update_gyro(0.01, -0.02, 0.03).unwrap();
        assert_eq!(dcm.gyro(), [0.0, 0.0, 0.0]);
        dcm.update_gyro(0.11, 0.0, 0.0).unwrap();
        assert_abs_diff_eq!(dcm.gyro()[0], 0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(dcm.gyro()[1], 0.02, epsilon = 1e-6);
    }

    #[test]
    fn stays_orthonormal_under_long_rotation() {
        let mut dcm = started_level();
        dcm.update_gyro(0.3, -0.2, 0.1).unwrap();
        for _ in 0..10_000 {
            dcm.update().unwrap();
        }
        assert!(orthonormality_error(&dcm.matrix()) < 1e-5);
    }

    #[test]
    fn non_finite_matrix_heals_to_identity() {
        let mut dcm = started_level();
        dcm.dcm[1][2] = f32::NAN;
        dcm.update_gyro(0.0, 0.0, 0.0).unwrap();
        dcm.update().unwrap();
        assert_eq!(dcm.matrix(), IDENTITY);
        assert_eq!(dcm.divergence_resets(), 1);

        dcm.dcm[0][0] = f32::INFINITY;
        dcm.update().unwrap();
        assert_eq!(dcm.matrix(), IDENTITY);
        assert_eq!(dcm.divergence_resets(), 2);
    }

    #[test]
    fn non_finite_samples_rejected_and_previous_kept() {
        let mut dcm = started_level();
        dcm.update_gyro(0.1, 0.2, 0.3).unwrap();
        assert_eq!(dcm.update_gyro(f32::NAN, 0.0, 0.0), Err(DcmError::InvalidInput));
        assert_eq!(dcm.gyro(), [0.1, 0.2, 0.3]);

        assert_eq!(
            dcm.update_accel(0.0, f32::INFINITY, 0.0),
            Err(DcmError::InvalidInput)
        );
        assert_eq!(dcm.accel(), [0.0, 0.0, 9.81]);

        dcm.update_magneto(20e-6, 0.0, -40e-6).unwrap();
        assert_eq!(
            dcm.update_magneto(0.0, 0.0, f32::NEG_INFINITY),
            Err(DcmError::InvalidInput)
        );
        assert_eq!(dcm.mag(), [20e-6, 0.0, -40e-6]);

        assert_eq!(dcm.set_gyro_bias([f32::NAN; 3]), Err(DcmError::InvalidInput));
    }
}
