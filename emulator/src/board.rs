//! Simulated board: a synthetic mains sense signal, a microsecond cycle
//! counter and a bank of pins that remember their level and transitions.
//!
//! All state is atomic so the control-loop thread and the console thread share
//! one [`Board`] without locks.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::time::Instant;

use dimmer_core::{Level, LoopIo, OutputPins, PinConfigurator, PinId, Pull};

/// Number of simulated pins.
pub const PIN_COUNT: usize = 16;

/// `PIN_COUNT` as accepted by the console's pin range check.
pub const PIN_LIMIT: u8 = 16;

/// Pin the zero-crossing detector is wired to.
pub const MAINS_PIN: PinId = PinId::new(0);

/// Width of the detector pulse centred on each zero crossing.
pub const PULSE_NS: u64 = 400_000;

const MODE_UNUSED: u8 = 0;
const MODE_INPUT_FLOATING: u8 = 1;
const MODE_INPUT_PULL_UP: u8 = 2;
const MODE_INPUT_PULL_DOWN: u8 = 3;
const MODE_OUTPUT: u8 = 4;

/// Level of the sense signal `elapsed_ns` after the epoch, for mains at `hz`
/// (`0` = no mains).
#[must_use]
pub fn mains_level_at(hz: u32, elapsed_ns: u64) -> Level {
    if hz == 0 {
        return Level::Low;
    }
    let half_period_ns = 500_000_000 / u64::from(hz);
    if elapsed_ns % half_period_ns < PULSE_NS {
        Level::High
    } else {
        Level::Low
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoardError {
    Unmapped(PinId),
    /// The pin carries the detector signal and cannot be driven.
    Wired(PinId),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::Unmapped(pin) => write!(f, "pin {pin} does not exist"),
            BoardError::Wired(pin) => write!(f, "pin {pin} is wired to the mains detector"),
        }
    }
}

/// Snapshot of one configured pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinState {
    pub pin: PinId,
    pub mode: &'static str,
    pub level: Level,
    pub transitions: u32,
}

impl fmt::Display for PinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = if self.level.is_high() { "high" } else { "low" };
        write!(
            f,
            "pin={} mode={} level={} transitions={}",
            self.pin, self.mode, level, self.transitions
        )
    }
}

pub struct Board {
    epoch: Instant,
    mains_hz: AtomicU32,
    modes: [AtomicU8; PIN_COUNT],
    levels: [AtomicBool; PIN_COUNT],
    transitions: [AtomicU32; PIN_COUNT],
}

impl Board {
    #[must_use]
    pub fn new(mains_hz: u32) -> Self {
        Self {
            epoch: Instant::now(),
            mains_hz: AtomicU32::new(mains_hz),
            modes: std::array::from_fn(|_| AtomicU8::new(MODE_UNUSED)),
            levels: std::array::from_fn(|_| AtomicBool::new(false)),
            transitions: std::array::from_fn(|_| AtomicU32::new(0)),
        }
    }

    pub fn set_mains(&self, hz: u32) {
        self.mains_hz.store(hz, Ordering::Relaxed);
    }

    #[must_use]
    pub fn mains_hz(&self) -> u32 {
        self.mains_hz.load(Ordering::Relaxed)
    }

    fn elapsed_ns(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Microseconds since the epoch, wrapping like a hardware counter.
    #[must_use]
    pub fn cycle_count(&self) -> u32 {
        let micros = self.elapsed_ns() / 1_000;
        u32::try_from(micros & u64::from(u32::MAX)).unwrap_or(0)
    }

    fn index(pin: PinId) -> Result<usize, BoardError> {
        let index = pin.as_index();
        if index < PIN_COUNT {
            Ok(index)
        } else {
            Err(BoardError::Unmapped(pin))
        }
    }

    fn mode(&self, index: usize) -> u8 {
        self.modes[index].load(Ordering::Relaxed)
    }

    pub fn configure_output(&self, pin: PinId) -> Result<(), BoardError> {
        let index = Self::index(pin)?;
        if pin == MAINS_PIN {
            return Err(BoardError::Wired(pin));
        }
        self.levels[index].store(false, Ordering::Relaxed);
        self.modes[index].store(MODE_OUTPUT, Ordering::Relaxed);
        Ok(())
    }

    pub fn configure_input(&self, pin: PinId, pull: Pull) -> Result<(), BoardError> {
        let index = Self::index(pin)?;
        let mode = match pull {
            Pull::None => MODE_INPUT_FLOATING,
            Pull::Up => MODE_INPUT_PULL_UP,
            Pull::Down => MODE_INPUT_PULL_DOWN,
        };
        self.modes[index].store(mode, Ordering::Relaxed);
        Ok(())
    }

    /// Sets an output's level, counting real changes. Inputs are ignored.
    pub fn drive(&self, pin: PinId, level: Level) {
        let Ok(index) = Self::index(pin) else {
            return;
        };
        if self.mode(index) != MODE_OUTPUT {
            return;
        }
        let previous = self.levels[index].swap(level.is_high(), Ordering::Relaxed);
        if previous != level.is_high() {
            self.transitions[index].fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn read(&self, pin: PinId) -> Level {
        let Ok(index) = Self::index(pin) else {
            return Level::Low;
        };
        match self.mode(index) {
            MODE_OUTPUT => level_from(self.levels[index].load(Ordering::Relaxed)),
            MODE_INPUT_PULL_UP | MODE_INPUT_FLOATING | MODE_INPUT_PULL_DOWN
                if pin == MAINS_PIN =>
            {
                mains_level_at(self.mains_hz(), self.elapsed_ns())
            }
            MODE_INPUT_PULL_UP => Level::High,
            _ => Level::Low,
        }
    }

    /// Every pin that has been configured, in pin order.
    #[must_use]
    pub fn pin_states(&self) -> Vec<PinState> {
        (0..PIN_LIMIT)
            .map(PinId::new)
            .filter_map(|pin| {
                let index = pin.as_index();
                let mode = match self.mode(index) {
                    MODE_UNUSED => return None,
                    MODE_INPUT_FLOATING => "input",
                    MODE_INPUT_PULL_UP => "input-pull-up",
                    MODE_INPUT_PULL_DOWN => "input-pull-down",
                    _ => "output",
                };
                Some(PinState {
                    pin,
                    mode,
                    level: self.read(pin),
                    transitions: self.transitions[index].load(Ordering::Relaxed),
                })
            })
            .collect()
    }
}

fn level_from(high: bool) -> Level {
    if high { Level::High } else { Level::Low }
}

/// Capability view of a shared [`Board`], used by both the console and the
/// control-loop thread.
#[derive(Clone)]
pub struct SimPins {
    board: Arc<Board>,
}

impl SimPins {
    #[must_use]
    pub fn new(board: Arc<Board>) -> Self {
        Self { board }
    }
}

impl OutputPins for SimPins {
    fn drive(&mut self, pin: PinId, level: Level) {
        self.board.drive(pin, level);
    }
}

impl PinConfigurator for SimPins {
    type Error = BoardError;

    fn configure_output(&mut self, pin: PinId) -> Result<(), Self::Error> {
        self.board.configure_output(pin)
    }

    fn configure_input(&mut self, pin: PinId, pull: Pull) -> Result<(), Self::Error> {
        self.board.configure_input(pin, pull)
    }
}

impl LoopIo for SimPins {
    fn read(&mut self, pin: PinId) -> Level {
        self.board.read(pin)
    }

    fn cycle_count(&mut self) -> u32 {
        self.board.cycle_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sense_pulses_at_each_zero_crossing() {
        assert_eq!(mains_level_at(50, 0), Level::High);
        assert_eq!(mains_level_at(50, PULSE_NS - 1), Level::High);
        assert_eq!(mains_level_at(50, PULSE_NS), Level::Low);
        assert_eq!(mains_level_at(50, 9_999_999), Level::Low);
        assert_eq!(mains_level_at(50, 10_000_000), Level::High);
        assert_eq!(mains_level_at(60, 8_333_333), Level::High);
        assert_eq!(mains_level_at(0, 0), Level::Low);
    }

    #[test]
    fn mains_pin_cannot_be_driven() {
        let board = Board::new(50);
        assert_eq!(
            board.configure_output(MAINS_PIN),
            Err(BoardError::Wired(MAINS_PIN))
        );
        assert_eq!(
            board.configure_output(PinId::new(40)),
            Err(BoardError::Unmapped(PinId::new(40)))
        );
    }

    #[test]
    fn outputs_count_real_transitions() {
        let board = Board::new(50);
        let pin = PinId::new(5);
        board.drive(pin, Level::High);
        board.configure_output(pin).unwrap();
        board.drive(pin, Level::High);
        board.drive(pin, Level::High);
        board.drive(pin, Level::Low);

        let states = board.pin_states();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].transitions, 2);
        assert_eq!(
            states[0].to_string(),
            "pin=5 mode=output level=low transitions=2"
        );
    }

    #[test]
    fn inputs_follow_their_pull() {
        let board = Board::new(0);
        board.configure_input(PinId::new(3), Pull::Up).unwrap();
        board.configure_input(PinId::new(4), Pull::Down).unwrap();
        board.configure_input(MAINS_PIN, Pull::Up).unwrap();

        assert_eq!(board.read(PinId::new(3)), Level::High);
        assert_eq!(board.read(PinId::new(4)), Level::Low);
        assert_eq!(board.read(MAINS_PIN), Level::Low, "mains is off");
    }
}
