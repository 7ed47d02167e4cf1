mod support;

use dimmer_core::timing::Observation;
use dimmer_core::{ControlLoop, Dimmer, EdgeMode, Level, PinId};

use support::{MockIo, SENSE};

const P: u32 = 10_000;
const LOAD: PinId = PinId::new(5);

fn sample<const N: usize>(
    control: &mut ControlLoop<'_, N>,
    io: &mut MockIo,
    at: u32,
    sense: Level,
) -> Observation {
    io.now = at;
    io.sense = Some(sense);
    control.step(io)
}

/// Crossings at 10_000 and 20_000 so the estimator settles on `P`.
fn lock_mains<const N: usize>(control: &mut ControlLoop<'_, N>, io: &mut MockIo) {
    assert_eq!(sample(control, io, P, Level::High), Observation::Crossing);
    assert_eq!(sample(control, io, 2 * P, Level::High), Observation::Crossing);
}

#[test]
fn trailing_edge_half_cycle() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, mut control) = dimmer.split();
    let mut io = MockIo::new();

    handle.setup(&mut io, SENSE).unwrap();
    handle.add(&mut io, LOAD, EdgeMode::TrailingEdge).unwrap();
    lock_mains(&mut control, &mut io);
    assert_eq!(handle.mains_frequency(), 50);

    assert_eq!(handle.set_level(LOAD, 500), Ok(5_000));
    io.clear_history();

    // Crossing at t=30_000: the half-cycle starts at the crossing level.
    sample(&mut control, &mut io, 3 * P, Level::High);
    assert_eq!(io.level(LOAD), Some(EdgeMode::TrailingEdge.crossing_level()));

    sample(&mut control, &mut io, 3 * P + 4_000, Level::Low);
    sample(&mut control, &mut io, 3 * P + 5_000, Level::Low);
    assert_eq!(io.history(LOAD).len(), 1, "delay not yet exceeded");

    sample(&mut control, &mut io, 3 * P + 5_001, Level::Low);
    sample(&mut control, &mut io, 3 * P + 7_000, Level::Low);
    assert_eq!(
        io.history(LOAD),
        vec![
            (3 * P, Level::High),
            (3 * P + 5_001, Level::Low),
        ]
    );

    // Next crossing restarts the cycle.
    sample(&mut control, &mut io, 4 * P, Level::High);
    assert_eq!(io.level(LOAD), Some(Level::High));
    assert!(!handle.channel(LOAD).unwrap().switched);
}

#[test]
fn leading_edge_half_cycle_has_inverted_polarity() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, mut control) = dimmer.split();
    let mut io = MockIo::new();

    handle.setup(&mut io, SENSE).unwrap();
    handle.add(&mut io, LOAD, EdgeMode::LeadingEdge).unwrap();
    lock_mains(&mut control, &mut io);

    assert_eq!(handle.set_level(LOAD, 500), Ok(5_000));
    io.clear_history();

    sample(&mut control, &mut io, 3 * P, Level::High);
    sample(&mut control, &mut io, 3 * P + 6_000, Level::Low);
    assert_eq!(
        io.history(LOAD),
        vec![(3 * P, Level::Low), (3 * P + 6_000, Level::High)]
    );
}

#[test]
fn zero_delay_switches_at_the_crossing() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, mut control) = dimmer.split();
    let mut io = MockIo::new();

    handle.setup(&mut io, SENSE).unwrap();
    handle.add(&mut io, LOAD, EdgeMode::LeadingEdge).unwrap();
    lock_mains(&mut control, &mut io);

    // Full command on a leading-edge channel: on for the whole half-cycle.
    assert_eq!(handle.set_level(LOAD, 1_000), Ok(0));
    io.clear_history();

    sample(&mut control, &mut io, 3 * P, Level::High);
    assert!(handle.channel(LOAD).unwrap().switched);
    sample(&mut control, &mut io, 3 * P + 5_000, Level::Low);
    assert_eq!(io.history(LOAD), vec![(3 * P, Level::High)]);
}

#[test]
fn new_channels_deliver_no_power() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, mut control) = dimmer.split();
    let mut io = MockIo::new();
    let leading = PinId::new(6);

    handle.setup(&mut io, SENSE).unwrap();
    handle.add(&mut io, LOAD, EdgeMode::TrailingEdge).unwrap();
    handle.add(&mut io, leading, EdgeMode::LeadingEdge).unwrap();
    assert_eq!(io.level(LOAD), Some(Level::Low));
    assert_eq!(io.level(leading), Some(Level::Low));

    lock_mains(&mut control, &mut io);
    for offset in [1_000, 5_000, 9_500] {
        sample(&mut control, &mut io, 2 * P + offset, Level::Low);
    }
    sample(&mut control, &mut io, 3 * P, Level::High);

    assert_eq!(io.level(LOAD), Some(Level::Low));
    assert_eq!(io.level(leading), Some(Level::Low));
    assert!(
        io.transitions.iter().all(|(_, _, level)| *level == Level::Low),
        "an idle channel was driven high: {:?}",
        io.transitions
    );
}

#[test]
fn mains_loss_freezes_schedule_until_next_crossing() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, mut control) = dimmer.split();
    let mut io = MockIo::new();
    let never = PinId::new(6);

    handle.setup(&mut io, SENSE).unwrap();
    handle.add(&mut io, LOAD, EdgeMode::TrailingEdge).unwrap();
    handle.add(&mut io, never, EdgeMode::LeadingEdge).unwrap();
    lock_mains(&mut control, &mut io);
    handle.set_level(LOAD, 500).unwrap();
    assert_eq!(handle.set_level(never, 0), Ok(2 * P));

    sample(&mut control, &mut io, 3 * P, Level::High);
    sample(&mut control, &mut io, 3 * P + 6_000, Level::Low);
    io.clear_history();

    let max_target = handle.config().max_target();
    assert_eq!(
        sample(&mut control, &mut io, 3 * P + max_target + 1, Level::Low),
        Observation::Absent
    );
    assert_eq!(handle.mains_frequency(), 0);
    assert_eq!(handle.timing().half_period, 0);

    // Even past the "never" delay, and after the counter wraps, nothing fires.
    for at in [3 * P + 2 * P + 1, 3 * P + 40_000, (3 * P).wrapping_add(u32::MAX)] {
        assert_eq!(sample(&mut control, &mut io, at, Level::Low), Observation::Absent);
    }
    assert!(io.transitions.is_empty(), "{:?}", io.transitions);

    // Mains returns: the next real crossing resets phase.
    sample(&mut control, &mut io, 9 * P, Level::High);
    assert_eq!(io.level(LOAD), Some(Level::High));
    assert_eq!(io.level(never), Some(Level::Low));
    assert_eq!(handle.mains_frequency(), 0, "no period until a second crossing");

    sample(&mut control, &mut io, 10 * P, Level::High);
    assert_eq!(handle.mains_frequency(), 50);
}

#[test]
fn stored_delays_are_not_rescaled_when_the_period_drifts() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, mut control) = dimmer.split();
    let mut io = MockIo::new();

    handle.setup(&mut io, SENSE).unwrap();
    handle.add(&mut io, LOAD, EdgeMode::TrailingEdge).unwrap();
    lock_mains(&mut control, &mut io);
    handle.set_level(LOAD, 500).unwrap();

    // Mains speeds up to 60 Hz. The first short half-cycle is only seen once
    // the calibrated poll target (9_000) has passed; the estimate then tracks.
    let first = 2 * P + 9_001;
    assert_eq!(sample(&mut control, &mut io, first, Level::High), Observation::Crossing);
    assert_eq!(handle.mains_frequency(), 56);
    assert_eq!(
        sample(&mut control, &mut io, first + 8_333, Level::High),
        Observation::Crossing
    );
    assert_eq!(handle.mains_frequency(), 60);
    assert_eq!(handle.channel(LOAD).unwrap().switch_delay, 5_000);

    assert_eq!(handle.set_level(LOAD, 500), Ok(4_167));
}

#[test]
fn setup_again_restarts_detection() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, mut control) = dimmer.split();
    let mut io = MockIo::new();

    handle.setup(&mut io, SENSE).unwrap();
    lock_mains(&mut control, &mut io);
    assert_eq!(handle.timing().crossings, 2);

    handle.setup(&mut io, SENSE).unwrap();
    let timing = handle.timing();
    assert_eq!(timing.crossings, 0);
    assert_eq!(timing.half_period, 0);
    assert!(!timing.mains_present);
    assert_eq!(io.inputs.len(), 2);
}

#[test]
fn loop_idles_until_setup() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, mut control) = dimmer.split();
    let mut io = MockIo::new();

    handle.add(&mut io, LOAD, EdgeMode::TrailingEdge).unwrap();
    io.clear_history();
    assert_eq!(sample(&mut control, &mut io, P, Level::High), Observation::Absent);
    assert!(io.transitions.is_empty());
    assert_eq!(handle.timing().crossings, 0);
}
