use super::{CONSOLE_RX_QUEUE, CONSOLE_TX_QUEUE, USB_STORAGE};
use crate::console::{ConsoleFrame, FRAME_LEN};
use crate::status;
use crate::usb::{self, UsbDeviceStrings};
use embassy_futures::join::join;
use embassy_futures::select::{Either3, select3};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_usb::driver::EndpointError;

embassy_stm32::bind_interrupts!(struct UsbIrqs {
    USB_UCPD1_2 => embassy_stm32::usb::InterruptHandler<hal::peripherals::USB>;
});

#[embassy_executor::task]
pub async fn run(
    usb: Peri<'static, hal::peripherals::USB>,
    dp: Peri<'static, hal::peripherals::PA12>,
    dm: Peri<'static, hal::peripherals::PA11>,
) -> ! {
    let storage = USB_STORAGE.init(usb::UsbDeviceStorage::new());
    let driver = embassy_stm32::usb::Driver::new(usb, UsbIrqs, dp, dm);

    let mut console = usb::UsbConsole::new(driver, storage, UsbDeviceStrings::default());
    let port = console.take_port();
    let mut device = console.device;

    match port {
        Some(usb::CdcAcmHandle {
            sender,
            receiver,
            control,
        }) => {
            join(device.run(), run_console_interface(sender, receiver, control)).await;
        }
        None => {
            defmt::error!("usb: console interface unavailable");
            device.run().await;
        }
    }

    loop {
        core::future::pending::<()>().await;
    }
}

async fn run_console_interface<D>(
    mut sender: embassy_usb::class::cdc_acm::Sender<'static, D>,
    mut receiver: embassy_usb::class::cdc_acm::Receiver<'static, D>,
    control: embassy_usb::class::cdc_acm::ControlChanged<'static>,
) -> !
where
    D: embassy_usb::driver::Driver<'static>,
{
    let rx_queue = CONSOLE_RX_QUEUE.sender();
    let tx_queue = CONSOLE_TX_QUEUE.receiver();
    let mut ingress = [0u8; FRAME_LEN];
    let mut pending_tx: Option<ConsoleFrame> = None;

    loop {
        join(receiver.wait_connection(), sender.wait_connection()).await;
        wait_for_dtr(&control, &mut sender).await;
        pending_tx.take();
        CONSOLE_TX_QUEUE.clear();
        status::set_console_attached(true);

        defmt::info!("usb: console connected");

        loop {
            match select3(
                receiver.read_packet(&mut ingress),
                async {
                    if pending_tx.is_none() {
                        pending_tx = Some(tx_queue.receive().await);
                    }

                    let Some(frame) = pending_tx.as_ref() else {
                        return Ok(0);
                    };

                    match sender.write_packet(frame).await {
                        Ok(()) => {
                            let len = frame.len();
                            pending_tx.take();
                            Ok(len)
                        }
                        Err(err) => Err(err),
                    }
                },
                control.control_changed(),
            )
            .await
            {
                Either3::First(Ok(count)) => {
                    if count == 0 {
                        continue;
                    }

                    let mut frame = ConsoleFrame::new();
                    if frame.extend_from_slice(&ingress[..count]).is_err() {
                        defmt::warn!("usb: dropping console frame len={} (overflow)", count);
                        continue;
                    }

                    rx_queue.send(frame).await;
                }
                Either3::First(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: console interface disabled");
                    break;
                }
                Either3::First(Err(_)) => {
                    defmt::warn!("usb: console read error");
                }
                Either3::Second(Ok(_)) => {}
                Either3::Second(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: console write disabled");
                    break;
                }
                Either3::Second(Err(_)) => {
                    defmt::warn!("usb: console write error");
                }
                Either3::Third(()) => {
                    if !sender.dtr() {
                        defmt::warn!("usb: console host dropped DTR");
                        break;
                    }
                }
            }
        }

        status::set_console_attached(false);
    }
}

async fn wait_for_dtr<D>(
    control: &embassy_usb::class::cdc_acm::ControlChanged<'static>,
    sender: &mut embassy_usb::class::cdc_acm::Sender<'static, D>,
) where
    D: embassy_usb::driver::Driver<'static>,
{
    while !sender.dtr() {
        control.control_changed().await;
    }
}
