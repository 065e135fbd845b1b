#![cfg_attr(not(test), no_std)]

//! Flight-control core of a quadrotor attitude stabilizer.
//!
//! Sensor samples feed a gyro-integrating DCM estimator, the latest radio
//! setpoint is decoded into a bounded desired attitude/thrust, a PD law mixes
//! the error into four squared rotor speeds, and an ESC curve turns those into
//! PWM duty cycles. Everything here is allocation-free and host-testable; the
//! STM32 firmware built on top lives behind the `firmware` feature.

// must come first so the macros are visible to every module below
#[macro_use]
mod fmt;

pub mod config;
pub mod drivers;
pub mod error;
pub mod flight;
pub mod state;
pub mod telemetry;

pub use config::FlightConfig;
pub use error::{ConfigError, DcmError, FlightError};
pub use flight::FlightCore;
