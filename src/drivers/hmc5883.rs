use embassy_stm32::i2c::{Error, I2c, Instance, RxDma, TxDma};
use embassy_time::Timer;

use crate::state::Vec3;

pub const HMC5883L_ADDR: u8 = 0x1E;

/// Gain 1.3 Ga: counts per gauss
const LSB_PER_GAUSS: f32 = 1090.0;
const TESLA_PER_GAUSS: f32 = 1.0e-4;
/// Reported on an axis when the ADC over/underflows
const OVERFLOW: i16 = -4096;

pub struct Hmc5883 {
    last: Vec3,
}

impl Hmc5883 {
    pub fn new() -> Self {
        Self { last: [0.0; 3] }
    }

    pub async fn init<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        &mut self,
        i2c: &mut I2c<'_, T, Tx, Rx>,
    ) -> Result<(), Error> {
        // CRA: 8-sample average, 75 Hz output
        i2c.blocking_write(HMC5883L_ADDR, &[0x00, 0x78])?;
        // CRB: ±1.3 Ga
        i2c.blocking_write(HMC5883L_ADDR, &[0x01, 0x20])?;
        // continuous measurement
        i2c.blocking_write(HMC5883L_ADDR, &[0x02, 0x00])?;

        Timer::after_millis(10).await;
        Ok(())
    }

    /// Field in tesla. An overflowing axis keeps its previous value.
    pub async fn read_field<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        &mut self,
        i2c: &mut I2c<'_, T, Tx, Rx>,
    ) -> Result<Vec3, Error> {
        let mut data = [0u8; 6];
        i2c.blocking_write_read(HMC5883L_ADDR, &[0x03], &mut data)?;

        // register order is X, Z, Y
        let raw = [
            i16::from_be_bytes([data[0], data[1]]),
            i16::from_be_bytes([data[4], data[5]]),
            i16::from_be_bytes([data[2], data[3]]),
        ];
        for (axis, &count) in raw.iter().enumerate() {
            if count != OVERFLOW {
                self.last[axis] = count as f32 / LSB_PER_GAUSS * TESLA_PER_GAUSS;
            }
        }
        Ok(self.last)
    }
}
