//! Target runtime: the control loop owns thread mode and never yields; the USB
//! stack and the console run on an interrupt executor that preempts it.

use core::cell::RefCell;

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use dimmer_core::{Dimmer, TimingConfig};
use embassy_executor::InterruptExecutor;
use embassy_stm32 as hal;
use embassy_stm32::gpio::Flex;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_sync::blocking_mutex::Mutex;
use static_cell::StaticCell;

use crate::console::ConsoleQueue;
use crate::hw::{self, ConsolePins, LoopPins, PinBank, SharedBank, TickCounter};
use crate::usb;

mod console_task;
mod usb_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

// The cycle counter is the embassy tick truncated to 32 bits.
const _: () = assert!(embassy_time::TICK_HZ <= 0xFFFF_FFFF);

#[allow(clippy::cast_possible_truncation)]
const TIMING: TimingConfig = TimingConfig::DEFAULT.with_counter_hz(embassy_time::TICK_HZ as u32);

pub(super) type FirmwarePad = Flex<'static>;
pub(super) type FirmwarePins = ConsolePins<'static, FirmwarePad>;

pub(super) static CONSOLE_RX_QUEUE: ConsoleQueue = ConsoleQueue::new();
pub(super) static CONSOLE_TX_QUEUE: ConsoleQueue = ConsoleQueue::new();
pub(super) static USB_STORAGE: StaticCell<usb::UsbDeviceStorage> = StaticCell::new();

static DIMMER: StaticCell<Dimmer> = StaticCell::new();
static PIN_BANK: StaticCell<SharedBank<FirmwarePad>> = StaticCell::new();
static CONSOLE_EXECUTOR: InterruptExecutor = InterruptExecutor::new();

#[hal::interrupt]
unsafe fn SPI2_3() {
    unsafe { CONSOLE_EXECUTOR.on_interrupt() }
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA2,
        PA3,
        PA4,
        PA5,
        PA6,
        PA7,
        PA8,
        PB0,
        PB1,
        PB3,
        USB,
        PA11,
        PA12,
        ..
    } = hal::init(config);

    let bank: &'static SharedBank<FirmwarePad> = PIN_BANK.init(Mutex::new(RefCell::new(
        PinBank::new([
            Flex::new(PA0),
            Flex::new(PA1),
            Flex::new(PA2),
            Flex::new(PA3),
            Flex::new(PA4),
            Flex::new(PA5),
            Flex::new(PA6),
            Flex::new(PA7),
            Flex::new(PA8),
            Flex::new(PB0),
            Flex::new(PB1),
            Flex::new(PB3),
        ]),
    )));

    let dimmer = DIMMER.init(Dimmer::new(TIMING));
    let (mut handle, mut control) = dimmer.split();

    let mut console_pins = ConsolePins::new(bank);
    match handle.setup(&mut console_pins, hw::DEFAULT_SENSE_PIN) {
        Ok(()) => defmt::info!(
            "dimmer: sense input pin={} ready",
            hw::DEFAULT_SENSE_PIN.as_u8()
        ),
        Err(err) => defmt::error!("dimmer: boot setup failed: {}", defmt::Display2Format(&err)),
    }

    hal::interrupt::SPI2_3.set_priority(Priority::P2);
    let spawner = CONSOLE_EXECUTOR.start(hal::interrupt::SPI2_3);

    spawner
        .spawn(usb_task::run(USB, PA12, PA11))
        .expect("failed to spawn USB task");
    spawner
        .spawn(console_task::run(handle, console_pins))
        .expect("failed to spawn console task");

    let mut io = LoopPins::new(bank, TickCounter);
    control.run(&mut io)
}
