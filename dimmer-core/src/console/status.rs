//! Text rendering for console responses.
//!
//! Firmware and emulator both print through [`write_outcome`] and
//! [`write_error`], so transcripts from either front-end read the same.
//! Lines are separated by `\n`; transports translate line endings.

use core::fmt;

use crate::channel::ChannelSnapshot;
use crate::dimmer::{AddOutcome, Diagnostics};
use crate::timing::TimingSnapshot;

use super::catalog::{COMMANDS, CommandSpec};
use super::commands::{CommandError, CommandOutcome, HelpTopic};

/// Renders a [`Diagnostics`] snapshot.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a, const N: usize> {
    diagnostics: &'a Diagnostics<N>,
}

impl<'a, const N: usize> StatusFormatter<'a, N> {
    #[must_use]
    pub const fn new(diagnostics: &'a Diagnostics<N>) -> Self {
        Self { diagnostics }
    }

    /// e.g. `mains hz=50 half-period=10000 crossings=12 last-crossing=120000 poll-target=9000 max-target=12222`
    pub fn write_timing_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write_timing(writer, &self.diagnostics.timing)
    }

    /// e.g. `channels 2/8`
    pub fn write_summary_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "channels {}/{}", self.diagnostics.channels.len(), N)
    }

    /// e.g. `pin=5 mode=trailing command=500 delay=5000 switched=no`
    pub fn write_channel_line<W: fmt::Write>(
        &self,
        writer: &mut W,
        channel: &ChannelSnapshot,
    ) -> fmt::Result {
        write!(
            writer,
            "pin={} mode={} command={} delay=",
            channel.pin, channel.mode, channel.command
        )?;
        if channel.switch_delay == u32::MAX {
            writer.write_str("never")?;
        } else {
            write!(writer, "{}", channel.switch_delay)?;
        }
        writer.write_str(" switched=")?;
        writer.write_str(yes_no(channel.switched))
    }

    /// Writes every line of the listing.
    pub fn write_all<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        self.write_timing_line(writer)?;
        writer.write_char('\n')?;
        self.write_summary_line(writer)?;
        for channel in &self.diagnostics.channels {
            writer.write_char('\n')?;
            self.write_channel_line(writer, channel)?;
        }
        Ok(())
    }
}

fn write_timing<W: fmt::Write>(writer: &mut W, timing: &TimingSnapshot) -> fmt::Result {
    write!(writer, "mains hz={} half-period=", timing.mains_hz)?;
    match timing.half_period {
        0 => writer.write_str("none")?,
        ticks => write!(writer, "{ticks}")?,
    }
    write!(
        writer,
        " crossings={} last-crossing={} poll-target={} max-target={}",
        timing.crossings, timing.last_crossing, timing.poll_target, timing.max_target
    )
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Writes the response for a successful command.
pub fn write_outcome<W: fmt::Write, const N: usize>(
    writer: &mut W,
    outcome: &CommandOutcome<'_, N>,
) -> fmt::Result {
    match outcome {
        CommandOutcome::Setup { sense_pin } => write!(writer, "OK setup sense-pin={sense_pin}"),
        CommandOutcome::Added {
            pin,
            mode,
            outcome: AddOutcome::Added,
        } => write!(writer, "OK add pin={pin} mode={mode}"),
        CommandOutcome::Added {
            pin,
            outcome: AddOutcome::AlreadyPresent,
            ..
        } => write!(writer, "OK add pin={pin} already-dimmed"),
        CommandOutcome::Removed { pin } => write!(writer, "OK remove pin={pin}"),
        CommandOutcome::Level {
            pin,
            command,
            delay,
        } => write!(writer, "OK level pin={pin} command={command} delay={delay}"),
        CommandOutcome::Listing(diagnostics) => StatusFormatter::new(diagnostics).write_all(writer),
        CommandOutcome::Frequency(hz) => write!(writer, "mains hz={hz}"),
        CommandOutcome::Help(topic) => write_help(writer, *topic),
    }
}

/// Writes the response for a failed command.
pub fn write_error<W: fmt::Write, E: fmt::Display>(
    writer: &mut W,
    error: &CommandError<'_, E>,
) -> fmt::Result {
    write!(writer, "ERR {error}")
}

fn write_help<W: fmt::Write>(writer: &mut W, topic: HelpTopic<'_>) -> fmt::Result {
    match topic {
        HelpTopic::All => {
            writer.write_str("Available commands:")?;
            for spec in COMMANDS {
                writer.write_str("\n  ")?;
                write_usage(writer, spec)?;
            }
            writer.write_str("\nType `help <command>` for a specific command.")
        }
        HelpTopic::Command(spec) => write_usage(writer, spec),
        HelpTopic::Unknown(topic) => {
            write!(writer, "No help available for `{topic}`.\nAvailable topics:")?;
            for spec in COMMANDS {
                write!(writer, " {}", spec.name)?;
            }
            Ok(())
        }
    }
}

fn write_usage<W: fmt::Write>(writer: &mut W, spec: &CommandSpec) -> fmt::Result {
    write!(writer, "{:<30} - {}", spec.usage, spec.summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::EdgeMode;
    use crate::dimmer::DimmerError;
    use crate::pins::PinId;
    use heapless::{String, Vec};

    fn timing(half_period: u32, mains_hz: u32) -> TimingSnapshot {
        TimingSnapshot {
            half_period,
            crossings: 12,
            last_crossing: 120_000,
            poll_target: 9_000,
            max_target: 12_222,
            mains_present: half_period != 0,
            mains_hz,
        }
    }

    #[test]
    fn listing_renders_timing_and_channels() {
        let mut channels: Vec<ChannelSnapshot, 4> = Vec::new();
        channels
            .push(ChannelSnapshot {
                pin: PinId::new(5),
                mode: EdgeMode::TrailingEdge,
                command: 500,
                switch_delay: 5_000,
                switched: false,
            })
            .unwrap();
        channels
            .push(ChannelSnapshot {
                pin: PinId::new(6),
                mode: EdgeMode::LeadingEdge,
                command: 0,
                switch_delay: u32::MAX,
                switched: false,
            })
            .unwrap();
        let diagnostics = Diagnostics {
            channels,
            timing: timing(10_000, 50),
        };

        let mut out: String<512> = String::new();
        StatusFormatter::new(&diagnostics).write_all(&mut out).unwrap();

        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some(
                "mains hz=50 half-period=10000 crossings=12 last-crossing=120000 poll-target=9000 max-target=12222"
            )
        );
        assert_eq!(lines.next(), Some("channels 2/4"));
        assert_eq!(
            lines.next(),
            Some("pin=5 mode=trailing command=500 delay=5000 switched=no")
        );
        assert_eq!(
            lines.next(),
            Some("pin=6 mode=leading command=0 delay=never switched=no")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn absent_mains_reports_no_period() {
        let diagnostics: Diagnostics<2> = Diagnostics {
            channels: Vec::new(),
            timing: timing(0, 0),
        };
        let mut out: String<256> = String::new();
        StatusFormatter::new(&diagnostics)
            .write_timing_line(&mut out)
            .unwrap();
        assert!(out.starts_with("mains hz=0 half-period=none "));
    }

    #[test]
    fn errors_are_prefixed() {
        let error: CommandError<'_, &str> =
            CommandError::Dimmer(DimmerError::NotFound(PinId::new(9)));
        let mut out: String<64> = String::new();
        write_error(&mut out, &error).unwrap();
        assert_eq!(out.as_str(), "ERR pin 9 is not dimmed");
    }

    #[test]
    fn help_lists_every_command() {
        let outcome: CommandOutcome<'_, 1> = CommandOutcome::Help(HelpTopic::All);
        let mut out: String<1024> = String::new();
        write_outcome(&mut out, &outcome).unwrap();
        for spec in COMMANDS {
            assert!(out.contains(spec.usage), "missing {}", spec.name);
        }
    }
}
