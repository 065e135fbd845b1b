pub mod calibration;
pub mod controller;
pub mod dcm;
pub mod escpwm;
pub mod setpoint;

#[cfg(feature = "firmware")]
pub mod hmc5883;
#[cfg(feature = "firmware")]
pub mod icm42688;
#[cfg(feature = "firmware")]
pub mod pwm;
