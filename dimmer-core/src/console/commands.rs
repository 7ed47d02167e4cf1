//! Console command executor.
//!
//! Applies parsed [`Command`]s to a [`DimmerHandle`]. Structural commands run
//! against a [`Paused`] view; callers that cannot busy-wait obtain that view
//! themselves and use [`CommandExecutor::execute_quiesced`].

use core::fmt;

use crate::channel::EdgeMode;
use crate::dimmer::{AddOutcome, Diagnostics, DimmerError, DimmerHandle, Paused};
use crate::pins::{PinConfigurator, PinId, Pull};
use crate::scheduler;

use super::catalog::{self, CommandSpec};
use super::grammar::{self, Command, ParseError};

/// Successful command results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome<'l, const N: usize> {
    Setup {
        sense_pin: PinId,
    },
    Added {
        pin: PinId,
        mode: EdgeMode,
        outcome: AddOutcome,
    },
    Removed {
        pin: PinId,
    },
    Level {
        pin: PinId,
        command: u16,
        delay: u32,
    },
    Listing(Diagnostics<N>),
    Frequency(u32),
    Help(HelpTopic<'l>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HelpTopic<'l> {
    All,
    Command(&'static CommandSpec),
    Unknown(&'l str),
}

/// Errors surfaced while executing a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandError<'l, E> {
    Parse(ParseError<'l>),
    InvalidArgument(&'static str),
    Dimmer(DimmerError<E>),
}

impl<'l, E> From<ParseError<'l>> for CommandError<'l, E> {
    fn from(error: ParseError<'l>) -> Self {
        Self::Parse(error)
    }
}

impl<E> From<DimmerError<E>> for CommandError<'_, E> {
    fn from(error: DimmerError<E>) -> Self {
        Self::Dimmer(error)
    }
}

impl<E> From<crate::dimmer::NotFound> for CommandError<'_, E> {
    fn from(error: crate::dimmer::NotFound) -> Self {
        Self::Dimmer(error.into())
    }
}

impl<E: fmt::Display> fmt::Display for CommandError<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(err) => write!(f, "syntax {err}"),
            CommandError::InvalidArgument(reason) => write!(f, "invalid {reason}"),
            CommandError::Dimmer(err) => err.fmt(f),
        }
    }
}

const PIN_OUT_OF_RANGE: &str = "pin out of range";

pub type CommandResult<'l, E, const N: usize> = Result<CommandOutcome<'l, N>, CommandError<'l, E>>;

/// Executes console commands with a platform pin configurator.
pub struct CommandExecutor<P> {
    pins: P,
    pin_limit: u8,
}

impl<P> CommandExecutor<P> {
    /// `pin_limit` is the number of addressable pins; pins `>= pin_limit` are
    /// rejected as invalid arguments.
    pub const fn new(pins: P, pin_limit: u8) -> Self {
        Self { pins, pin_limit }
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    pub fn into_inner(self) -> P {
        self.pins
    }

    fn accepts(&self, pin: PinId) -> bool {
        pin.as_u8() < self.pin_limit
    }
}

impl<P> CommandExecutor<P>
where
    P: PinConfigurator,
{
    /// Parses and executes a line, busy-waiting for the loop when needed.
    pub fn execute<'l, const N: usize>(
        &mut self,
        handle: &mut DimmerHandle<'_, N>,
        line: &'l str,
    ) -> CommandResult<'l, P::Error, N> {
        let command = grammar::parse(line)?;
        if command.requires_quiesce() {
            let mut paused = handle.quiesce();
            self.execute_quiesced(&mut paused, command)
        } else {
            self.execute_unquiesced(handle, command)
        }
    }

    /// Executes a structural command against an already paused loop.
    pub fn execute_quiesced<'l, const N: usize>(
        &mut self,
        paused: &mut Paused<'_, '_, N>,
        command: Command<'l>,
    ) -> CommandResult<'l, P::Error, N> {
        match command {
            Command::Setup { sense_pin } => {
                if !self.accepts(sense_pin) {
                    return Err(CommandError::InvalidArgument(PIN_OUT_OF_RANGE));
                }
                self.pins
                    .configure_input(sense_pin, Pull::Up)
                    .map_err(DimmerError::HardwareConfiguration)?;
                paused.restart_detection(sense_pin);
                Ok(CommandOutcome::Setup { sense_pin })
            }
            Command::Add { pin, mode } => {
                if !self.accepts(pin) {
                    return Err(CommandError::InvalidArgument(PIN_OUT_OF_RANGE));
                }
                let outcome = paused.add(&mut self.pins, pin, mode)?;
                Ok(CommandOutcome::Added { pin, mode, outcome })
            }
            Command::Remove { pin } => {
                paused.remove(&mut self.pins, pin)?;
                Ok(CommandOutcome::Removed { pin })
            }
            Command::List => Ok(CommandOutcome::Listing(Diagnostics {
                channels: paused.snapshot(),
                timing: paused.timing(),
            })),
            other => self.execute_unquiesced(paused.handle(), other),
        }
    }

    /// Executes a command that never touches the registry's shape.
    pub fn execute_unquiesced<'l, const N: usize>(
        &mut self,
        handle: &DimmerHandle<'_, N>,
        command: Command<'l>,
    ) -> CommandResult<'l, P::Error, N> {
        match command {
            Command::Level { pin, command } => {
                let delay = handle.set_level(pin, command)?;
                Ok(CommandOutcome::Level {
                    pin,
                    command: scheduler::clamp_command(command),
                    delay,
                })
            }
            Command::Freq => Ok(CommandOutcome::Frequency(handle.mains_frequency())),
            Command::Help(None) => Ok(CommandOutcome::Help(HelpTopic::All)),
            Command::Help(Some(topic)) => Ok(CommandOutcome::Help(
                catalog::find(topic).map_or(HelpTopic::Unknown(topic), HelpTopic::Command),
            )),
            Command::Setup { .. } | Command::Add { .. } | Command::Remove { .. } | Command::List => {
                Err(CommandError::InvalidArgument("command requires a paused loop"))
            }
        }
    }
}
