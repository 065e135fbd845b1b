use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::spi::{Error, Instance, Spi};
use embassy_time::{Duration, Timer};

use crate::state::Vec3;

const REG_DEVICE_CONFIG: u8 = 0x11;
const REG_ACCEL_DATA_X1: u8 = 0x1F;
const REG_PWR_MGMT0: u8 = 0x4E;
const REG_GYRO_CONFIG0: u8 = 0x4F;
const REG_ACCEL_CONFIG0: u8 = 0x50;
const REG_WHO_AM_I: u8 = 0x75;

const WHO_AM_I: u8 = 0x47;

/// ±2000 dps, 1 kHz ODR
const GYRO_CONFIG: u8 = 0x06;
/// ±16 g, 1 kHz ODR
const ACCEL_CONFIG: u8 = 0x06;

const GYRO_LSB_PER_DPS: f32 = 16.4;
const ACCEL_LSB_PER_G: f32 = 2048.0;
const STANDARD_GRAVITY: f32 = 9.80665;

#[derive(Debug)]
pub enum ImuError {
    Spi(Error),
    WrongId(u8),
}

impl From<Error> for ImuError {
    fn from(e: Error) -> Self {
        ImuError::Spi(e)
    }
}

pub struct Icm42688<'d, T: Instance> {
    spi: Spi<'d, T, NoDma, NoDma>,
    cs: Output<'d, AnyPin>,
}

impl<'d, T: Instance> Icm42688<'d, T> {
    pub fn new(spi: Spi<'d, T, NoDma, NoDma>, cs: Output<'d, AnyPin>) -> Self {
        Self { spi, cs }
    }

    async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Error> {
        let buf = [reg & 0x7F, value];
        self.cs.set_low();
        let res = self.spi.blocking_write(&buf);
        self.cs.set_high();
        res
    }

    async fn read_reg(&mut self, reg: u8) -> Result<u8, Error> {
        let tx = [reg | 0x80, 0x00];
        let mut rx = [0u8; 2];

        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &tx);
        self.cs.set_high();

        res?;
        Ok(rx[1])
    }

    pub async fn init(&mut self) -> Result<(), ImuError> {
        self.write_reg(REG_DEVICE_CONFIG, 0x01).await?;
        Timer::after(Duration::from_millis(10)).await;

        let id = self.read_reg(REG_WHO_AM_I).await?;
        if id != WHO_AM_I {
            return Err(ImuError::WrongId(id));
        }

        self.write_reg(REG_GYRO_CONFIG0, GYRO_CONFIG).await?;
        self.write_reg(REG_ACCEL_CONFIG0, ACCEL_CONFIG).await?;

        // gyro + accel in low-noise mode
        self.write_reg(REG_PWR_MGMT0, 0x0F).await?;
        Timer::after(Duration::from_millis(50)).await;

        defmt::info!("icm42688: ready");
        Ok(())
    }

    /// Raw big-endian counts: (accel, gyro)
    pub async fn read_raw(&mut self) -> Result<([i16; 3], [i16; 3]), Error> {
        let mut tx = [0u8; 13];
        tx[0] = REG_ACCEL_DATA_X1 | 0x80;
        let mut rx = [0u8; 13];

        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &tx);
        self.cs.set_high();
        res?;

        let word = |i: usize| i16::from_be_bytes([rx[i], rx[i + 1]]);
        Ok(([word(1), word(3), word(5)], [word(7), word(9), word(11)]))
    }

    /// (accel m/s², gyro rad/s)
    pub async fn read_si(&mut self) -> Result<(Vec3, Vec3), Error> {
        let (a, g) = self.read_raw().await?;
        let accel = a.map(|v| v as f32 / ACCEL_LSB_PER_G * STANDARD_GRAVITY);
        let gyro = g.map(|v| (v as f32 / GYRO_LSB_PER_DPS).to_radians());
        Ok((accel, gyro))
    }
}
