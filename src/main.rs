#![no_std]
#![no_main]

mod board;
mod tasks;
mod usb;

use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_stm32::gpio::{AnyPin, Level, Output, Pin, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::usart::{Config as UsartConfig, UartRx};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker, Timer};
use {defmt_rtt as _, panic_probe as _};

use quad_dcm_fc::config::{CONTROL_RATE_HZ, GYRO_BIAS_SAMPLES, RADIO_BAUD};
use quad_dcm_fc::drivers::calibration::GyroBiasCalibration;
use quad_dcm_fc::drivers::escpwm::{
    apply, idle_outputs, pulse_for, set_all, CALIBRATION_HIGH_DUTY, CALIBRATION_HOLD_MS,
    CALIBRATION_LOW_DUTY,
};
use quad_dcm_fc::drivers::hmc5883::Hmc5883;
use quad_dcm_fc::drivers::icm42688::Icm42688;
use quad_dcm_fc::drivers::pwm::Escs;
use quad_dcm_fc::drivers::setpoint::SetpointBuffer;
use quad_dcm_fc::state::AttitudeReport;
use quad_dcm_fc::{FlightConfig, FlightCore, FlightError};

use crate::board::Board;
use crate::tasks::fast_loop::fast_loop_task;

// ── Shared state ──────────────────────────────────────────────────────────────

/// Radio bytes in, control-loop snapshots out
pub static SETPOINT: SetpointBuffer = SetpointBuffer::new();

/// Raised once by the control loop on an unrecoverable sensor fault
pub static FAULT: Signal<CriticalSectionRawMutex, FlightError> = Signal::new();

// Cap=1: the status display only wants the latest report.
static REPORT_CHAN: Channel<CriticalSectionRawMutex, AttitudeReport, 1> = Channel::new();

// ── Interrupt bindings ────────────────────────────────────────────────────────
bind_interrupts!(struct Irqs {
    I2C1_EV => embassy_stm32::i2c::EventInterruptHandler<peripherals::I2C1>;
    I2C1_ER => embassy_stm32::i2c::ErrorInterruptHandler<peripherals::I2C1>;
    UART4   => embassy_stm32::usart::InterruptHandler<peripherals::UART4>;
});

/// Fail-stop: motors already idled by the caller, blink at 10 Hz until reset.
async fn fault_blink(led: &mut Output<'static, AnyPin>) -> ! {
    loop {
        led.toggle();
        Timer::after(Duration::from_millis(50)).await;
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL)
    let board = Board::init();
    let p = board.p;

    let mut led = Output::new(p.PC13.degrade(), Level::High, Speed::Low);
    let config = FlightConfig::default();

    // 2. ESC throttle calibration: full-throttle pulse, then floor
    let mut escs = Escs::new(
        p.TIM3,
        p.TIM2,
        p.PB0,
        p.PB1,
        p.PA2,
        p.PA3,
        pulse_for(CALIBRATION_HIGH_DUTY),
    );
    defmt::info!("esc: calibrating");
    Timer::after(Duration::from_millis(CALIBRATION_HOLD_MS)).await;
    set_all(&mut escs, CALIBRATION_LOW_DUTY);
    Timer::after(Duration::from_millis(CALIBRATION_HOLD_MS)).await;
    defmt::info!("esc: calibrated");

    // 3. USB (CDC-ACM status display)
    let (usb_dev, usb_serial) = usb::init(p.USB_OTG_FS, p.PA12, p.PA11);
    spawner.spawn(usb::usb_task(usb_dev)).unwrap();

    // 4. I2C1 @ 400 kHz: HMC5883 (SCL=PB8, SDA=PB9)
    let mut i2c = I2c::new(
        p.I2C1,
        p.PB8,
        p.PB9,
        Irqs,
        p.DMA1_CH7,
        p.DMA1_CH0,
        TimeHertz(400_000),
        Default::default(),
    );

    // 5. SPI1 @ 10 MHz: ICM-42688 (SCK=PA5, MOSI=PA7, MISO=PA6, CS=PB12)
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = TimeHertz(10_000_000);

    use embassy_stm32::dma::NoDma;
    let spi = Spi::new(p.SPI1, p.PA5, p.PA7, p.PA6, NoDma, NoDma, spi_config);
    let cs_gyro = Output::new(p.PB12.degrade(), Level::High, Speed::VeryHigh);
    let mut imu = Icm42688::new(spi, cs_gyro);
    let mut mag = Hmc5883::new();

    Timer::after(Duration::from_millis(100)).await;
    if let Err(e) = imu.init().await {
        defmt::error!("imu init failed: {:?}", defmt::Debug2Format(&e));
        apply(&mut escs, &idle_outputs(&config.esc));
        fault_blink(&mut led).await;
    }
    if let Err(e) = mag.init(&mut i2c).await {
        defmt::error!("mag init failed: {:?}", defmt::Debug2Format(&e));
        apply(&mut escs, &idle_outputs(&config.esc));
        fault_blink(&mut led).await;
    }

    // 6. Flight core
    let mut flight = match FlightCore::new(&config) {
        Ok(f) => f,
        Err(_) => {
            apply(&mut escs, &idle_outputs(&config.esc));
            fault_blink(&mut led).await
        }
    };

    // 7. Gyro bias: GYRO_BIAS_SAMPLES stationary samples at the control rate
    let mut calib = GyroBiasCalibration::new(GYRO_BIAS_SAMPLES);
    let mut ticker = Ticker::every(Duration::from_hz(CONTROL_RATE_HZ as u64));
    while !calib.is_ready() {
        ticker.next().await;
        match imu.read_si().await {
            Ok((_, gyro)) => {
                calib.add_sample(gyro);
            }
            Err(e) => {
                defmt::error!("imu read failed during calibration: {:?}", defmt::Debug2Format(&e));
                apply(&mut escs, &idle_outputs(&config.esc));
                fault_blink(&mut led).await;
            }
        }
        if calib.sample_count() % 100 == 0 {
            led.toggle();
        }
    }
    if let Some(bias) = calib.bias() {
        if flight.set_gyro_bias(bias).is_err() {
            defmt::warn!("gyro bias rejected, flying uncorrected");
        }
    }
    led.set_high();

    // 8. Radio on UART4 RX (PA1), DMA1_CH2
    let mut radio_config = UsartConfig::default();
    radio_config.baudrate = RADIO_BAUD;
    let radio_rx = match UartRx::new(p.UART4, Irqs, p.PA1, p.DMA1_CH2, radio_config) {
        Ok(rx) => rx,
        Err(_) => {
            defmt::error!("radio uart config rejected");
            apply(&mut escs, &idle_outputs(&config.esc));
            fault_blink(&mut led).await
        }
    };

    // 9. Spawn tasks
    spawner.spawn(tasks::radio_task::radio_task(radio_rx)).unwrap();
    spawner.spawn(tasks::telemetry_task::telemetry_task(
        usb_serial,
        REPORT_CHAN.receiver(),
    )).unwrap();
    spawner.spawn(fast_loop_task(
        imu,
        i2c,
        mag,
        escs,
        flight,
        REPORT_CHAN.sender(),
    )).unwrap();

    // 10. Heartbeat @ 1 Hz; 10 Hz once the control loop reports a fault
    loop {
        match select(FAULT.wait(), Timer::after(Duration::from_millis(500))).await {
            Either::First(e) => {
                defmt::error!("flight stopped: {}", e);
                fault_blink(&mut led).await;
            }
            Either::Second(()) => led.toggle(),
        }
    }
}
