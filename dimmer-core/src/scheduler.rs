//! Phase-cut scheduling: command-to-delay mapping and the per-iteration
//! decision of when each output flips.

use crate::channel::{COMMAND_MAX, ChannelTable, EdgeMode};
use crate::pins::OutputPins;

/// Clamps a raw brightness command into `0..=1000`.
#[must_use]
pub fn clamp_command(command: i32) -> u16 {
    let clamped = command.clamp(0, i32::from(COMMAND_MAX));
    u16::try_from(clamped).unwrap_or(COMMAND_MAX)
}

/// Maps a clamped command to a switch delay for half-period `half_period`.
///
/// Leading-edge commands are complemented first so a higher command always
/// delivers more power. A saturated command returns twice the half-period,
/// which no half-cycle reaches.
#[must_use]
pub fn switch_delay(mode: EdgeMode, command: u16, half_period: u32) -> u32 {
    let command = command.min(COMMAND_MAX);
    let effective = match mode {
        EdgeMode::LeadingEdge => COMMAND_MAX - command,
        EdgeMode::TrailingEdge => command,
    };

    match effective {
        0 => 0,
        COMMAND_MAX.. => half_period.saturating_mul(2),
        fraction => {
            let scaled = (u64::from(fraction) * u64::from(half_period)
                + u64::from(COMMAND_MAX / 2))
                / u64::from(COMMAND_MAX);
            u32::try_from(scaled).unwrap_or(half_period)
        }
    }
}

/// Starts a new half-cycle on every channel.
pub fn reset_phase<const N: usize, P: OutputPins>(table: &ChannelTable<N>, pins: &mut P) {
    for channel in table.iter() {
        let mode = channel.mode();
        if channel.switch_delay() == 0 {
            pins.drive(channel.pin(), mode.switch_level());
            channel.mark_switched(true);
        } else {
            pins.drive(channel.pin(), mode.crossing_level());
            channel.mark_switched(false);
        }
    }
}

/// Flips every channel whose delay has passed and has not flipped yet.
pub fn advance<const N: usize, P: OutputPins>(table: &ChannelTable<N>, elapsed: u32, pins: &mut P) {
    for channel in table.iter() {
        if !channel.is_switched() && elapsed > channel.switch_delay() {
            pins.drive(channel.pin(), channel.mode().switch_level());
            channel.mark_switched(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: u32 = 10_000;

    #[test]
    fn clamps_out_of_range_commands() {
        assert_eq!(clamp_command(-5), 0);
        assert_eq!(clamp_command(1_500), 1_000);
        assert_eq!(clamp_command(420), 420);
    }

    #[test]
    fn trailing_edge_saturates() {
        assert_eq!(switch_delay(EdgeMode::TrailingEdge, 1_000, P), 2 * P);
        assert_eq!(switch_delay(EdgeMode::TrailingEdge, 0, P), 0);
    }

    #[test]
    fn leading_edge_saturates_the_other_way() {
        assert_eq!(switch_delay(EdgeMode::LeadingEdge, 0, P), 2 * P);
        assert_eq!(switch_delay(EdgeMode::LeadingEdge, 1_000, P), 0);
    }

    #[test]
    fn midpoint_is_half_the_period_in_both_modes() {
        assert_eq!(switch_delay(EdgeMode::TrailingEdge, 500, P), 5_000);
        assert_eq!(switch_delay(EdgeMode::LeadingEdge, 500, P), 5_000);
    }

    #[test]
    fn trailing_mapping_is_monotone_and_rounded() {
        let half_period = 8_333;
        let mut previous = 0;
        for command in 1..=999u16 {
            let delay = switch_delay(EdgeMode::TrailingEdge, command, half_period);
            assert!(delay >= previous, "command {command} went backwards");
            let exact = f64::from(command) / 1_000.0 * f64::from(half_period);
            assert!((f64::from(delay) - exact).abs() <= 0.5);
            previous = delay;
        }
    }

    #[test]
    fn leading_mapping_is_monotone_decreasing() {
        let mut previous = u32::MAX;
        for command in 0..=1_000u16 {
            let delay = switch_delay(EdgeMode::LeadingEdge, command, P);
            assert!(delay <= previous);
            previous = delay;
        }
    }

    #[test]
    fn saturation_survives_huge_periods() {
        assert_eq!(
            switch_delay(EdgeMode::TrailingEdge, 1_000, u32::MAX),
            u32::MAX
        );
    }
}
