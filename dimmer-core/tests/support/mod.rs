#![allow(dead_code)]

use std::collections::BTreeMap;

use dimmer_core::{Level, LoopIo, OutputPins, PinConfigurator, PinId, Pull};

pub const SENSE: PinId = PinId::new(0);

/// Scripted hardware: a settable clock and sense level plus a log of every
/// output transition.
#[derive(Debug, Default)]
pub struct MockIo {
    pub now: u32,
    pub sense: Option<Level>,
    pub levels: BTreeMap<PinId, Level>,
    pub transitions: Vec<(u32, PinId, Level)>,
    pub outputs: Vec<PinId>,
    pub inputs: Vec<(PinId, Pull)>,
    pub reject: Option<PinId>,
}

impl MockIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self, pin: PinId) -> Option<Level> {
        self.levels.get(&pin).copied()
    }

    /// Transitions of one pin as `(time, level)`.
    pub fn history(&self, pin: PinId) -> Vec<(u32, Level)> {
        self.transitions
            .iter()
            .filter(|(_, p, _)| *p == pin)
            .map(|(t, _, level)| (*t, *level))
            .collect()
    }

    pub fn clear_history(&mut self) {
        self.transitions.clear();
    }
}

impl OutputPins for MockIo {
    fn drive(&mut self, pin: PinId, level: Level) {
        self.levels.insert(pin, level);
        self.transitions.push((self.now, pin, level));
    }
}

impl PinConfigurator for MockIo {
    type Error = &'static str;

    fn configure_output(&mut self, pin: PinId) -> Result<(), Self::Error> {
        if self.reject == Some(pin) {
            return Err("pin is reserved");
        }
        self.outputs.push(pin);
        Ok(())
    }

    fn configure_input(&mut self, pin: PinId, pull: Pull) -> Result<(), Self::Error> {
        self.inputs.push((pin, pull));
        Ok(())
    }
}

impl LoopIo for MockIo {
    fn read(&mut self, pin: PinId) -> Level {
        assert_eq!(pin, SENSE, "loop read a pin other than the sense input");
        self.sense.unwrap_or(Level::Low)
    }

    fn cycle_count(&mut self) -> u32 {
        self.now
    }
}
