use embassy_executor::task;
use embassy_stm32::i2c::I2c;
use embassy_stm32::peripherals::{DMA1_CH0, DMA1_CH7, I2C1, SPI1};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Ticker};

use quad_dcm_fc::config::{CONTROL_RATE_HZ, PRINT_SKIP_COUNT};
use quad_dcm_fc::drivers::escpwm::apply;
use quad_dcm_fc::drivers::hmc5883::Hmc5883;
use quad_dcm_fc::drivers::icm42688::Icm42688;
use quad_dcm_fc::drivers::pwm::Escs;
use quad_dcm_fc::state::{AttitudeReport, SensorSample};
use quad_dcm_fc::{FlightCore, FlightError};

use crate::{FAULT, SETPOINT};

pub type MagBus = I2c<'static, I2C1, DMA1_CH7, DMA1_CH0>;

/// Control loop: one estimator update and one control-law evaluation per
/// sample tick, nothing else blocks.
///
/// A failed sensor transaction idles the ESCs, raises `FAULT` and ends the
/// task; the outputs keep the idle pulse until reset.
#[task]
pub async fn fast_loop_task(
    mut imu: Icm42688<'static, SPI1>,
    mut i2c: MagBus,
    mut mag: Hmc5883,
    mut escs: Escs<'static>,
    mut flight: FlightCore,
    report_tx: Sender<'static, CriticalSectionRawMutex, AttitudeReport, 1>,
) {
    let mut ticker = Ticker::every(Duration::from_hz(CONTROL_RATE_HZ as u64));
    let mut tick: u32 = 0;

    loop {
        ticker.next().await;
        tick = tick.wrapping_add(1);

        // ── A. Sensors ────────────────────────────────────────────────────────
        let (accel, gyro) = match imu.read_si().await {
            Ok(v) => v,
            Err(e) => {
                defmt::error!("imu read failed: {:?}", defmt::Debug2Format(&e));
                break;
            }
        };
        let field = match mag.read_field(&mut i2c).await {
            Ok(v) => v,
            Err(e) => {
                defmt::error!("mag read failed: {:?}", defmt::Debug2Format(&e));
                break;
            }
        };
        let sample = SensorSample { accel, gyro, mag: field };

        // ── B. Estimate + control ─────────────────────────────────────────────
        match flight.cycle(&sample, &SETPOINT) {
            Ok(outputs) => apply(&mut escs, &outputs),
            Err(e) => {
                defmt::warn!("cycle skipped: {}", e);
                apply(&mut escs, &flight.idle_outputs());
            }
        }

        // ── C. Status display feed ────────────────────────────────────────────
        if tick % PRINT_SKIP_COUNT == 0 {
            let _ = report_tx.try_send(flight.report());
        }
    }

    let idle = flight.sensor_fault();
    apply(&mut escs, &idle);
    FAULT.signal(FlightError::SensorBus);
}
