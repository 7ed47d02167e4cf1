mod support;

use dimmer_core::dimmer::NotFound;
use dimmer_core::{AddOutcome, Dimmer, DimmerError, EdgeMode, Level, PinId};

use support::{MockIo, SENSE};

#[test]
fn duplicate_add_is_a_no_op() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, _control) = dimmer.split();
    let mut io = MockIo::new();
    let pin = PinId::new(5);

    assert_eq!(
        handle.add(&mut io, pin, EdgeMode::TrailingEdge),
        Ok(AddOutcome::Added)
    );
    handle.set_level(pin, 700).unwrap();
    let before = handle.channel(pin).unwrap();

    assert_eq!(
        handle.add(&mut io, pin, EdgeMode::LeadingEdge),
        Ok(AddOutcome::AlreadyPresent)
    );
    assert_eq!(handle.channel(pin), Some(before));
    assert_eq!(handle.list().channels.len(), 1);
    assert_eq!(io.outputs, vec![pin], "duplicate add must not reconfigure");
}

#[test]
fn remove_then_add_matches_a_fresh_channel() {
    let mut reused: Dimmer<4> = Dimmer::default();
    let (mut handle, mut control) = reused.split();
    let mut io = MockIo::new();
    let pin = PinId::new(5);

    handle.setup(&mut io, SENSE).unwrap();
    handle.add(&mut io, pin, EdgeMode::LeadingEdge).unwrap();
    handle.set_level(pin, 1_000).unwrap();
    io.now = 10_000;
    io.sense = Some(Level::High);
    control.step(&mut io);
    assert!(handle.channel(pin).unwrap().switched);

    handle.remove(&mut io, pin).unwrap();
    handle.add(&mut io, pin, EdgeMode::LeadingEdge).unwrap();
    let recycled = handle.channel(pin).unwrap();

    let mut fresh: Dimmer<4> = Dimmer::default();
    let (mut fresh_handle, _fresh_control) = fresh.split();
    fresh_handle
        .add(&mut MockIo::new(), pin, EdgeMode::LeadingEdge)
        .unwrap();

    assert_eq!(Some(recycled), fresh_handle.channel(pin));
}

#[test]
fn removed_channels_release_their_load() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, mut control) = dimmer.split();
    let mut io = MockIo::new();
    let pin = PinId::new(5);

    handle.setup(&mut io, SENSE).unwrap();
    handle.add(&mut io, pin, EdgeMode::TrailingEdge).unwrap();
    handle.set_level(pin, 500).unwrap();
    io.now = 10_000;
    io.sense = Some(Level::High);
    control.step(&mut io);
    assert_eq!(io.level(pin), Some(Level::High), "conducting after the crossing");

    handle.remove(&mut io, pin).unwrap();
    assert_eq!(io.level(pin), Some(Level::Low));
    assert_eq!(io.history(pin).last(), Some(&(10_000, Level::Low)));
}

#[test]
fn remove_keeps_the_order_of_the_rest() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, _control) = dimmer.split();
    let mut io = MockIo::new();

    for raw in [2, 4, 6, 8] {
        handle
            .add(&mut io, PinId::new(raw), EdgeMode::TrailingEdge)
            .unwrap();
    }
    handle.remove(&mut io, PinId::new(4)).unwrap();

    let pins: Vec<u8> = handle
        .list()
        .channels
        .iter()
        .map(|channel| channel.pin.as_u8())
        .collect();
    assert_eq!(pins, vec![2, 6, 8]);
}

#[test]
fn unknown_pins_are_not_found() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, _control) = dimmer.split();
    let pin = PinId::new(9);

    assert_eq!(handle.remove(&mut MockIo::new(), pin), Err(NotFound(pin)));
    assert_eq!(handle.set_level(pin, 10), Err(NotFound(pin)));
}

#[test]
fn full_table_rejects_without_touching_hardware() {
    let mut dimmer: Dimmer<2> = Dimmer::default();
    let (mut handle, _control) = dimmer.split();
    let mut io = MockIo::new();

    handle.add(&mut io, PinId::new(1), EdgeMode::TrailingEdge).unwrap();
    handle.add(&mut io, PinId::new(2), EdgeMode::TrailingEdge).unwrap();
    assert_eq!(
        handle.add(&mut io, PinId::new(3), EdgeMode::TrailingEdge),
        Err(DimmerError::CapacityExhausted)
    );
    assert_eq!(io.outputs.len(), 2);
    assert_eq!(io.level(PinId::new(3)), None);
}

#[test]
fn rejected_configuration_leaves_registry_unchanged() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, _control) = dimmer.split();
    let mut io = MockIo::new();
    io.reject = Some(PinId::new(7));

    assert_eq!(
        handle.add(&mut io, PinId::new(7), EdgeMode::LeadingEdge),
        Err(DimmerError::HardwareConfiguration("pin is reserved"))
    );
    assert!(handle.list().channels.is_empty());
    assert!(io.transitions.is_empty());
}

#[test]
fn level_saturates_per_edge_mode() {
    let mut dimmer: Dimmer<4> = Dimmer::default();
    let (mut handle, _control) = dimmer.split();
    let mut io = MockIo::new();
    let trailing = PinId::new(1);
    let leading = PinId::new(2);
    let nominal = handle.config().nominal_half_period();

    handle.add(&mut io, trailing, EdgeMode::TrailingEdge).unwrap();
    handle.add(&mut io, leading, EdgeMode::LeadingEdge).unwrap();

    assert_eq!(handle.set_level(trailing, 1_000), Ok(2 * nominal));
    assert_eq!(handle.set_level(trailing, 0), Ok(0));
    assert_eq!(handle.set_level(leading, 1_000), Ok(0));
    assert_eq!(handle.set_level(leading, 0), Ok(2 * nominal));

    // Clamped, not rejected.
    assert_eq!(handle.set_level(trailing, 5_000), Ok(2 * nominal));
    assert_eq!(handle.set_level(trailing, -3), Ok(0));
    assert_eq!(handle.channel(trailing).unwrap().command, 0);
}
