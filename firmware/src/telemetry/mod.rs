//! Configuration event logging.
//!
//! Console commands that change the dimmer are mirrored to defmt on the
//! target and to stdout on the host. The control loop never logs.

use dimmer_core::console::commands::CommandOutcome;
use dimmer_core::{AddOutcome, EdgeMode, PinId};

use crate::hw;

/// A configuration change worth recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigEvent {
    SenseConfigured { pin: PinId },
    ChannelAdded { pin: PinId, mode: EdgeMode },
    ChannelRemoved { pin: PinId },
    LevelChanged { pin: PinId, command: u16, delay: u32 },
}

impl ConfigEvent {
    /// The event implied by a successful command, if it changed anything.
    pub fn from_outcome<const N: usize>(outcome: &CommandOutcome<'_, N>) -> Option<Self> {
        match *outcome {
            CommandOutcome::Setup { sense_pin } => Some(Self::SenseConfigured { pin: sense_pin }),
            CommandOutcome::Added {
                pin,
                mode,
                outcome: AddOutcome::Added,
            } => Some(Self::ChannelAdded { pin, mode }),
            CommandOutcome::Removed { pin } => Some(Self::ChannelRemoved { pin }),
            CommandOutcome::Level {
                pin,
                command,
                delay,
            } => Some(Self::LevelChanged {
                pin,
                command,
                delay,
            }),
            CommandOutcome::Added { .. }
            | CommandOutcome::Listing(_)
            | CommandOutcome::Frequency(_)
            | CommandOutcome::Help(_) => None,
        }
    }
}

/// Logs a configuration change.
pub fn record(event: ConfigEvent) {
    match event {
        ConfigEvent::SenseConfigured { pin } => log_sense(pin.as_u8(), pad(pin)),
        ConfigEvent::ChannelAdded { pin, mode } => log_added(pin.as_u8(), pad(pin), mode.label()),
        ConfigEvent::ChannelRemoved { pin } => log_removed(pin.as_u8()),
        ConfigEvent::LevelChanged {
            pin,
            command,
            delay,
        } => log_level(pin.as_u8(), command, delay),
    }
}

fn pad(pin: PinId) -> &'static str {
    hw::label(pin).unwrap_or("?")
}

#[cfg(target_os = "none")]
fn log_sense(pin: u8, pad: &'static str) {
    defmt::info!("dimmer: sense input pin={} ({}), detection restarted", pin, pad);
}

#[cfg(not(target_os = "none"))]
fn log_sense(pin: u8, pad: &'static str) {
    println!("dimmer: sense input pin={pin} ({pad}), detection restarted");
}

#[cfg(target_os = "none")]
fn log_added(pin: u8, pad: &'static str, mode: &'static str) {
    defmt::info!("dimmer: channel added pin={} ({}) mode={}", pin, pad, mode);
}

#[cfg(not(target_os = "none"))]
fn log_added(pin: u8, pad: &'static str, mode: &'static str) {
    println!("dimmer: channel added pin={pin} ({pad}) mode={mode}");
}

#[cfg(target_os = "none")]
fn log_removed(pin: u8) {
    defmt::info!("dimmer: channel removed pin={}", pin);
}

#[cfg(not(target_os = "none"))]
fn log_removed(pin: u8) {
    println!("dimmer: channel removed pin={pin}");
}

#[cfg(target_os = "none")]
fn log_level(pin: u8, command: u16, delay: u32) {
    defmt::info!("dimmer: level pin={} command={} delay={}", pin, command, delay);
}

#[cfg(not(target_os = "none"))]
fn log_level(pin: u8, command: u16, delay: u32) {
    println!("dimmer: level pin={pin} command={command} delay={delay}");
}

/// Logs a command the console rejected.
#[cfg(target_os = "none")]
pub fn log_rejected<E: core::fmt::Display>(error: &E) {
    defmt::warn!("console: {}", defmt::Display2Format(error));
}

#[cfg(not(target_os = "none"))]
pub fn log_rejected<E: core::fmt::Display>(error: &E) {
    println!("console: {error}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dimmer_core::console::commands::HelpTopic;

    #[test]
    fn structural_and_level_changes_are_events() {
        let pin = PinId::new(3);
        let added: CommandOutcome<'_, 4> = CommandOutcome::Added {
            pin,
            mode: EdgeMode::LeadingEdge,
            outcome: AddOutcome::Added,
        };
        assert_eq!(
            ConfigEvent::from_outcome(&added),
            Some(ConfigEvent::ChannelAdded {
                pin,
                mode: EdgeMode::LeadingEdge
            })
        );

        let level: CommandOutcome<'_, 4> = CommandOutcome::Level {
            pin,
            command: 250,
            delay: 7_500,
        };
        assert_eq!(
            ConfigEvent::from_outcome(&level),
            Some(ConfigEvent::LevelChanged {
                pin,
                command: 250,
                delay: 7_500
            })
        );
    }

    #[test]
    fn queries_and_no_ops_are_not_events() {
        let duplicate: CommandOutcome<'_, 4> = CommandOutcome::Added {
            pin: PinId::new(3),
            mode: EdgeMode::TrailingEdge,
            outcome: AddOutcome::AlreadyPresent,
        };
        let freq: CommandOutcome<'_, 4> = CommandOutcome::Frequency(50);
        let help: CommandOutcome<'_, 4> = CommandOutcome::Help(HelpTopic::All);

        assert_eq!(ConfigEvent::from_outcome(&duplicate), None);
        assert_eq!(ConfigEvent::from_outcome(&freq), None);
        assert_eq!(ConfigEvent::from_outcome(&help), None);
    }
}
