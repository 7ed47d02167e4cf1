//! Pin bank shared by the control loop and the operator console.
//!
//! Every dimmable pin is a flexible GPIO pad addressed by its index in
//! [`PIN_LABELS`]. The console reconfigures pads only while the control loop
//! is parked by the quiesce handshake; the loop drives and samples them the
//! rest of the time. Both sides reach the bank through a blocking mutex so the
//! borrow is never aliased even though the handshake already serialises them.

use core::cell::RefCell;
use core::fmt;

use dimmer_core::{Level, LoopIo, OutputPins, PinConfigurator, PinId, Pull};
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// Physical pads behind each [`PinId`], in index order.
pub const PIN_LABELS: [&str; PIN_COUNT] = [
    "PA0", "PA1", "PA2", "PA3", "PA4", "PA5", "PA6", "PA7", "PA8", "PB0", "PB1", "PB3",
];

/// Number of addressable pins.
pub const PIN_COUNT: usize = 12;

/// `PIN_COUNT` as accepted by the console's pin range check.
#[allow(clippy::cast_possible_truncation)]
pub const PIN_LIMIT: u8 = PIN_COUNT as u8;

/// Sense input configured at boot, wired to the zero-crossing optocoupler.
pub const DEFAULT_SENSE_PIN: PinId = PinId::new(0);

#[cfg(target_os = "none")]
type BankMutex = CriticalSectionRawMutex;
#[cfg(not(target_os = "none"))]
type BankMutex = NoopRawMutex;

/// Pin bank guarded for use from both execution contexts.
pub type SharedBank<P> = Mutex<BankMutex, RefCell<PinBank<P>>>;

/// Minimal GPIO pad operations the bank needs.
pub trait Pad {
    fn make_input(&mut self, pull: Pull);
    fn make_output(&mut self);
    fn write(&mut self, level: Level);
    fn read(&self) -> Level;
}

/// Rejections reported back through the console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankError {
    /// No pad is mapped to the pin.
    Unmapped(PinId),
    /// The pin was configured as an input (the sense line) and stays one.
    Input(PinId),
}

impl fmt::Display for BankError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BankError::Unmapped(pin) => write!(f, "pin {pin} has no pad"),
            BankError::Input(pin) => write!(f, "pin {pin} is an input"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Unused,
    Input,
    Output,
}

/// Fixed set of pads plus the role each one was configured for.
pub struct PinBank<P> {
    pads: [P; PIN_COUNT],
    roles: [Role; PIN_COUNT],
}

impl<P: Pad> PinBank<P> {
    pub const fn new(pads: [P; PIN_COUNT]) -> Self {
        Self {
            pads,
            roles: [Role::Unused; PIN_COUNT],
        }
    }

    fn slot(&mut self, pin: PinId) -> Result<(&mut P, &mut Role), BankError> {
        let index = pin.as_index();
        match (self.pads.get_mut(index), self.roles.get_mut(index)) {
            (Some(pad), Some(role)) => Ok((pad, role)),
            _ => Err(BankError::Unmapped(pin)),
        }
    }

    pub fn configure_output(&mut self, pin: PinId) -> Result<(), BankError> {
        let (pad, role) = self.slot(pin)?;
        if *role == Role::Input {
            return Err(BankError::Input(pin));
        }
        pad.write(Level::Low);
        pad.make_output();
        *role = Role::Output;
        Ok(())
    }

    pub fn configure_input(&mut self, pin: PinId, pull: Pull) -> Result<(), BankError> {
        let (pad, role) = self.slot(pin)?;
        pad.make_input(pull);
        *role = Role::Input;
        Ok(())
    }

    /// Drives an output pad. Pads not configured as outputs are left alone.
    pub fn drive(&mut self, pin: PinId, level: Level) {
        if let Ok((pad, Role::Output)) = self.slot(pin) {
            pad.write(level);
        }
    }

    /// Samples a pad. Unmapped pins read low.
    pub fn sample(&self, pin: PinId) -> Level {
        self.pads
            .get(pin.as_index())
            .map_or(Level::Low, Pad::read)
    }
}

/// Pad name of a pin, e.g. `PA3`.
pub fn label(pin: PinId) -> Option<&'static str> {
    PIN_LABELS.get(pin.as_index()).copied()
}

/// Source of the free-running cycle counter sampled by the control loop.
pub trait CycleCounter {
    fn now(&mut self) -> u32;
}

/// Console-side view: configures pads.
pub struct ConsolePins<'a, P: 'static> {
    bank: &'a SharedBank<P>,
}

impl<'a, P: Pad> ConsolePins<'a, P> {
    pub const fn new(bank: &'a SharedBank<P>) -> Self {
        Self { bank }
    }
}

impl<P: Pad> OutputPins for ConsolePins<'_, P> {
    fn drive(&mut self, pin: PinId, level: Level) {
        self.bank.lock(|bank| bank.borrow_mut().drive(pin, level));
    }
}

impl<P: Pad> PinConfigurator for ConsolePins<'_, P> {
    type Error = BankError;

    fn configure_output(&mut self, pin: PinId) -> Result<(), Self::Error> {
        self.bank
            .lock(|bank| bank.borrow_mut().configure_output(pin))
    }

    fn configure_input(&mut self, pin: PinId, pull: Pull) -> Result<(), Self::Error> {
        self.bank
            .lock(|bank| bank.borrow_mut().configure_input(pin, pull))
    }
}

/// Loop-side view: drives outputs, samples the sense input, reads the counter.
pub struct LoopPins<'a, P: 'static, C> {
    bank: &'a SharedBank<P>,
    counter: C,
}

impl<'a, P: Pad, C: CycleCounter> LoopPins<'a, P, C> {
    pub const fn new(bank: &'a SharedBank<P>, counter: C) -> Self {
        Self { bank, counter }
    }
}

impl<P: Pad, C> OutputPins for LoopPins<'_, P, C> {
    fn drive(&mut self, pin: PinId, level: Level) {
        self.bank.lock(|bank| bank.borrow_mut().drive(pin, level));
    }
}

impl<P: Pad, C: CycleCounter> LoopIo for LoopPins<'_, P, C> {
    fn read(&mut self, pin: PinId) -> Level {
        self.bank.lock(|bank| bank.borrow().sample(pin))
    }

    fn cycle_count(&mut self) -> u32 {
        self.counter.now()
    }
}

#[cfg(target_os = "none")]
mod stm32 {
    use dimmer_core::{Level, Pull};
    use embassy_stm32::gpio::{self, Flex, Speed};

    use super::{CycleCounter, Pad};

    impl Pad for Flex<'static> {
        fn make_input(&mut self, pull: Pull) {
            self.set_as_input(match pull {
                Pull::None => gpio::Pull::None,
                Pull::Up => gpio::Pull::Up,
                Pull::Down => gpio::Pull::Down,
            });
        }

        fn make_output(&mut self) {
            self.set_as_output(Speed::Low);
        }

        fn write(&mut self, level: Level) {
            match level {
                Level::High => self.set_high(),
                Level::Low => self.set_low(),
            }
        }

        fn read(&self) -> Level {
            if self.is_high() { Level::High } else { Level::Low }
        }
    }

    /// The embassy time driver tick, truncated to 32 bits.
    pub struct TickCounter;

    impl CycleCounter for TickCounter {
        #[allow(clippy::cast_possible_truncation)]
        fn now(&mut self) -> u32 {
            // Wraps every 2^32 ticks; the detector works on wrapping differences.
            embassy_time::Instant::now().as_ticks() as u32
        }
    }
}

#[cfg(target_os = "none")]
pub use stm32::TickCounter;
