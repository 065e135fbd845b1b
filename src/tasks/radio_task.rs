use embassy_executor::task;
use embassy_stm32::peripherals::{DMA1_CH2, UART4};
use embassy_stm32::usart::UartRx;

use quad_dcm_fc::config::PACKET_LENGTH;

use crate::SETPOINT;

/// Radio receiver: every idle-line-terminated burst goes into the setpoint
/// ring as one writer pass.
#[task]
pub async fn radio_task(mut rx: UartRx<'static, UART4, DMA1_CH2>) {
    let mut buf = [0u8; PACKET_LENGTH];

    loop {
        match rx.read_until_idle(&mut buf).await {
            Ok(0) => {}
            Ok(n) => SETPOINT.push_bytes(&buf[..n]),
            Err(e) => defmt::warn!("radio rx: {:?}", defmt::Debug2Format(&e)),
        }
    }
}
