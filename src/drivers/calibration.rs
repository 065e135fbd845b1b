/// Gyroscope bias from a stationary averaging pass at power-on.
use crate::state::Vec3;

#[derive(Clone, Copy, Debug)]
pub struct GyroBiasCalibration {
    sum: Vec3,
    count: usize,
    required: usize,
    rejected: u32,
}

impl GyroBiasCalibration {
    pub fn new(required: usize) -> Self {
        Self {
            sum: [0.0; 3],
            count: 0,
            required: required.max(1),
            rejected: 0,
        }
    }

    /// Accumulate one reading in rad/s. Returns `true` once enough samples
    /// have been collected; further samples are ignored.
    pub fn add_sample(&mut self, gyro: Vec3) -> bool {
        if self.is_ready() {
            return true;
        }
        if !gyro.iter().all(|v| v.is_finite()) {
            self.rejected += 1;
            return false;
        }
        for i in 0..3 {
            self.sum[i] += gyro[i];
        }
        self.count += 1;
        self.is_ready()
    }

    pub fn is_ready(&self) -> bool {
        self.count >= self.required
    }

    pub fn sample_count(&self) -> usize {
        self.count
    }

    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    /// 0.0 ..= 1.0
    pub fn progress(&self) -> f32 {
        self.count as f32 / self.required as f32
    }

    /// Mean of the collected samples, once the pass is complete.
    pub fn bias(&self) -> Option<Vec3> {
        if !self.is_ready() {
            return None;
        }
        let n = self.count as f32;
        Some([self.sum[0] / n, self.sum[1] / n, self.sum[2] / n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn averages_stationary_samples() {
        let mut cal = GyroBiasCalibration::new(4);
        assert!(!cal.add_sample([0.01, -0.02, 0.0]));
        assert!(!cal.add_sample([0.03, -0.02, 0.0]));
        assert!(!cal.add_sample([0.01, -0.04, 0.0]));
        assert_eq!(cal.bias(), None);
        assert!(cal.add_sample([0.03, -0.04, 0.004]));

        let bias = cal.bias().unwrap();
        assert_abs_diff_eq!(bias[0], 0.02, epsilon = 1e-6);
        assert_abs_diff_eq!(bias[1], -0.03, epsilon = 1e-6);
        assert_abs_diff_eq!(bias[2], 0.001, epsilon = 1e-6);
    }

    #[test]
    fn full_pass_of_constant_offset() {
        let mut cal = GyroBiasCalibration::new(crate::config::GYRO_BIAS_SAMPLES);
        while !cal.add_sample([0.005, 0.0, -0.003]) {}
        assert_eq!(cal.sample_count(), 2000);
        assert_eq!(cal.progress(), 1.0);
        let bias = cal.bias().unwrap();
        assert_abs_diff_eq!(bias[0], 0.005, epsilon = 1e-5);
        assert_abs_diff_eq!(bias[2], -0.003, epsilon = 1e-5);
    }

    #[test]
    fn non_finite_samples_are_skipped() {
        let mut cal = GyroBiasCalibration::new(2);
        cal.add_sample([f32::NAN, 0.0, 0.0]);
        cal.add_sample([0.0, f32::INFINITY, 0.0]);
        assert_eq!(cal.sample_count(), 0);
        assert_eq!(cal.rejected(), 2);
        cal.add_sample([0.1, 0.1, 0.1]);
        assert!(cal.add_sample([0.3, 0.3, 0.3]));
        assert_abs_diff_eq!(cal.bias().unwrap()[0], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn extra_samples_do_not_shift_result() {
        let mut cal = GyroBiasCalibration::new(1);
        assert!(cal.add_sample([0.5, 0.5, 0.5]));
        assert!(cal.add_sample([9.0, 9.0, 9.0]));
        assert_eq!(cal.bias(), Some([0.5, 0.5, 0.5]));
    }
}
