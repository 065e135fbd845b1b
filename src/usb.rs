use embassy_stm32::usb_otg::{self, Driver};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_usb::class::cdc_acm::{CdcAcmClass, State};
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::StaticCell;

bind_interrupts!(pub struct Irqs {
    OTG_FS => usb_otg::InterruptHandler<peripherals::USB_OTG_FS>;
});

pub type UsbDriver = Driver<'static, peripherals::USB_OTG_FS>;
pub type UsbSerial = CdcAcmClass<'static, UsbDriver>;

/// Full-speed bulk packet; every status line fits in one.
pub const MAX_PACKET_SIZE: u16 = 64;

struct Buffers {
    ep_out: [u8; 256],
    config_desc: [u8; 256],
    bos_desc: [u8; 256],
    control: [u8; 64],
}

static BUFFERS: StaticCell<Buffers> = StaticCell::new();
static CDC_STATE: StaticCell<State<'static>> = StaticCell::new();

#[embassy_executor::task]
pub async fn usb_task(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    device.run().await
}

/// CDC-ACM debug port on the OTG_FS pins (D+ PA12, D- PA11). Call once.
pub fn init(
    usb_periph: peripherals::USB_OTG_FS,
    pa12: peripherals::PA12,
    pa11: peripherals::PA11,
) -> (UsbDevice<'static, UsbDriver>, UsbSerial) {
    let Buffers {
        ep_out,
        config_desc,
        bos_desc,
        control,
    } = BUFFERS.init(Buffers {
        ep_out: [0; 256],
        config_desc: [0; 256],
        bos_desc: [0; 256],
        control: [0; 64],
    });

    let mut otg_config = usb_otg::Config::default();
    otg_config.vbus_detection = false;
    let driver = Driver::new_fs(usb_periph, Irqs, pa12, pa11, ep_out, otg_config);

    let mut config = Config::new(0xc0de, 0xcafe);
    config.manufacturer = Some("quad-dcm-fc");
    config.product = Some("Quadrotor attitude controller");
    config.serial_number = Some("00000001");
    config.max_packet_size_0 = 64;

    let mut builder = Builder::new(driver, config, config_desc, bos_desc, &mut [], control);
    let class = CdcAcmClass::new(&mut builder, CDC_STATE.init(State::new()), MAX_PACKET_SIZE);

    (builder.build(), class)
}
