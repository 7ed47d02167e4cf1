//! Hardware capabilities consumed by the dimmer.
//!
//! The core never touches registers. The firmware and the emulator implement
//! these traits over their own pin banks and counters.

use core::fmt;

/// Identifier of a digital line (GPIO number on the target).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PinId(u8);

impl PinId {
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn as_index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Electrical level of a digital line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

/// Bias resistor applied to an input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
    Down,
}

/// Drives output lines. Shared by the configuration path and the control loop.
pub trait OutputPins {
    fn drive(&mut self, pin: PinId, level: Level);
}

/// Pin-direction configuration, used from the configuration path only.
pub trait PinConfigurator: OutputPins {
    /// Platform error returned when the hardware rejects a configuration.
    type Error;

    fn configure_output(&mut self, pin: PinId) -> Result<(), Self::Error>;

    fn configure_input(&mut self, pin: PinId, pull: Pull) -> Result<(), Self::Error>;
}

/// Everything the control loop touches on each iteration.
pub trait LoopIo: OutputPins {
    /// Samples an input line.
    fn read(&mut self, pin: PinId) -> Level;

    /// Free-running counter; wraps at `u32::MAX`.
    fn cycle_count(&mut self) -> u32;
}
