//! One control cycle, end to end.
//!
//! sensor sample → estimator update → setpoint snapshot + decode → control
//! law → duty mapping. `FlightCore` owns the estimator and controller state;
//! the only thing it shares is the setpoint buffer, which it reads by
//! snapshot.

use crate::config::FlightConfig;
use crate::drivers::controller::{compute_motor_commands, ControllerState};
use crate::drivers::dcm::AttitudeEstimator;
use crate::drivers::escpwm::{idle_outputs, motor_outputs};
use crate::drivers::setpoint::{decode, SetpointBuffer};
use crate::error::{ConfigError, DcmError, FlightError};
use crate::state::{AttitudeReport, MotorOutputs, SensorSample, Vec3};

pub struct FlightCore {
    config: FlightConfig,
    dcm: AttitudeEstimator,
    controller: ControllerState,
    last_sample: SensorSample,
    last_outputs: MotorOutputs,
    rejected_samples: u32,
}

impl FlightCore {
    pub fn new(config: &FlightConfig) -> Result<Self, ConfigError> {
        if let Err(e) = config.validate() {
            error!("flight: configuration rejected: {}", e);
            return Err(e);
        }
        Ok(Self {
            config: *config,
            dcm: AttitudeEstimator::new(&config.dcm)?,
            controller: ControllerState::new(config),
            last_sample: SensorSample::default(),
            last_outputs: idle_outputs(&config.esc),
            rejected_samples: 0,
        })
    }

    /// Install the power-on gyroscope bias.
    pub fn set_gyro_bias(&mut self, bias: Vec3) -> Result<(), DcmError> {
        self.dcm.set_gyro_bias(bias)?;
        info!("flight: gyro bias {} {} {}", bias[0], bias[1], bias[2]);
        Ok(())
    }

    pub fn set_battery_voltage(&mut self, volts: f32) {
        if volts.is_finite() && volts > 0.0 {
            self.controller.battery_voltage = volts;
        }
    }

    /// Run one cycle for a fresh sample.
    ///
    /// The first cycle seeds the estimator from gravity instead of
    /// integrating. Non-finite sensor components are dropped per sensor and
    /// counted; the estimator keeps that sensor's previous reading.
    pub fn cycle(
        &mut self,
        sample: &SensorSample,
        setpoint: &SetpointBuffer,
    ) -> Result<MotorOutputs, FlightError> {
        self.feed(sample);

        if self.dcm.is_started() {
            self.dcm.update()?;
        } else {
            self.dcm.start()?;
        }

        let packet = setpoint.snapshot();
        decode(&packet, &self.config.setpoint, &mut self.controller);

        let omega_sq = compute_motor_commands(&self.config.controller, &mut self.controller, &self.dcm);
        let outputs = motor_outputs(&self.config.esc, &omega_sq, self.controller.battery_voltage);
        self.last_outputs = outputs;
        Ok(outputs)
    }

    fn feed(&mut self, sample: &SensorSample) {
        let [ax, ay, az] = sample.accel;
        let [gx, gy, gz] = sample.gyro;
        let [mx, my, mz] = sample.mag;
        let results = [
            self.dcm.update_accel(ax, ay, az),
            self.dcm.update_gyro(gx, gy, gz),
            self.dcm.update_magneto(mx, my, mz),
        ];
        for r in results.iter() {
            if r.is_err() {
                self.rejected_samples = self.rejected_samples.wrapping_add(1);
            }
        }
        self.last_sample = SensorSample {
            accel: self.dcm.accel(),
            gyro: self.dcm.gyro(),
            mag: self.dcm.mag(),
        };
    }

    /// Sensor bus gone: log it and hand back the outputs that idle every ESC.
    pub fn sensor_fault(&mut self) -> MotorOutputs {
        error!("flight: sensor bus fault, idling motors");
        self.last_outputs = idle_outputs(&self.config.esc);
        self.last_outputs
    }

    pub fn idle_outputs(&self) -> MotorOutputs {
        idle_outputs(&self.config.esc)
    }

    pub fn report(&self) -> AttitudeReport {
        AttitudeReport {
            sample: self.last_sample,
            eulers: self.dcm.eulers(),
            quaternion: self.dcm.compute_quaternion().as_array(),
            desired_thrust: self.controller.desired_thrust,
            desired_attitude: self.controller.desired_attitude,
            duty: self.last_outputs.duty,
            divergence_resets: self.dcm.divergence_resets(),
            rejected_samples: self.rejected_samples,
        }
    }

    pub fn estimator(&self) -> &AttitudeEstimator {
        &self.dcm
    }

    pub fn controller(&self) -> &ControllerState {
        &self.controller
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }
}
