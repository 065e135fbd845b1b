use core::fmt;

/// Rejected configuration. Nothing is constructed from a config that fails
/// these checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Accelerometer/gyroscope/magnetometer weights must sum to one.
    WeightsDoNotSumToOne,
    /// Sample period must be finite and strictly positive.
    NonPositiveSamplePeriod,
    /// A lower bound is not below its upper bound, or a step is not positive.
    InvalidBounds,
    /// Motor speed limits or physical constants are out of range.
    InvalidLimits,
}

/// Contract violations of the attitude estimator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DcmError {
    /// A sensor reading had a NaN or infinite component; the previous
    /// reading was kept.
    InvalidInput,
    /// `start` was called before any accelerometer reading was stored.
    NoAccelSample,
    /// The seeding accelerometer reading has zero magnitude.
    ZeroGravity,
    AlreadyStarted,
    NotStarted,
}

/// What a control cycle reports to the orchestration loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlightError {
    /// The sensor bus transaction failed. Not recoverable without a reset.
    SensorBus,
    Estimator(DcmError),
}

impl From<DcmError> for FlightError {
    fn from(e: DcmError) -> Self {
        FlightError::Estimator(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::WeightsDoNotSumToOne => f.write_str("fusion weights do not sum to one"),
            ConfigError::NonPositiveSamplePeriod => f.write_str("sample period must be positive"),
            ConfigError::InvalidBounds => f.write_str("setpoint bounds or steps are inconsistent"),
            ConfigError::InvalidLimits => f.write_str("motor limits or constants are out of range"),
        }
    }
}

impl fmt::Display for DcmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DcmError::InvalidInput => f.write_str("non-finite sensor reading rejected"),
            DcmError::NoAccelSample => f.write_str("no accelerometer reading to seed from"),
            DcmError::ZeroGravity => f.write_str("accelerometer reading has zero magnitude"),
            DcmError::AlreadyStarted => f.write_str("estimator already started"),
            DcmError::NotStarted => f.write_str("estimator not started"),
        }
    }
}

impl fmt::Display for FlightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightError::SensorBus => f.write_str("sensor bus fault"),
            FlightError::Estimator(e) => write!(f, "estimator: {}", e),
        }
    }
}
