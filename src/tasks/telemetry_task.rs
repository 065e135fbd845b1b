use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;

use quad_dcm_fc::state::AttitudeReport;
use quad_dcm_fc::telemetry::{format_row, ROW_COUNT};

use crate::usb::UsbSerial;

const USB_DEBUG_ENABLED: bool = true;

/// Status display over USB CDC-ACM, one table per report from the control
/// loop (every PRINT_SKIP_COUNT-th cycle).
#[task]
pub async fn telemetry_task(
    mut usb_serial: UsbSerial,
    report_rx: Receiver<'static, CriticalSectionRawMutex, AttitudeReport, 1>,
) {
    loop {
        let report = report_rx.receive().await;

        if !USB_DEBUG_ENABLED || !usb_serial.dtr() {
            continue;
        }
        for row in 0..ROW_COUNT {
            let line = match format_row(&report, row) {
                Ok(line) => line,
                Err(_) => {
                    defmt::warn!("telemetry: row {} overflowed", row);
                    continue;
                }
            };
            if usb_serial.write_packet(line.as_bytes()).await.is_err() {
                break;
            }
        }
    }
}
