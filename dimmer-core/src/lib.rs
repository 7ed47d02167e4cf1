#![no_std]

// Real-time core of the phase-cut dimmer.
//
// The crate avoids the standard library so the same control engine runs on the
// MCU firmware and inside the host emulator. Platform crates supply the pins and
// the cycle counter through the traits in [`pins`].

pub mod channel;
pub mod console;
pub mod dimmer;
pub mod pins;
pub mod quiesce;
pub mod scheduler;
pub mod timing;

pub use channel::{ChannelSnapshot, EdgeMode};
pub use dimmer::{
    AddOutcome, ControlLoop, DEFAULT_CHANNEL_CAPACITY, Diagnostics, Dimmer, DimmerError,
    DimmerHandle,
};
pub use pins::{Level, LoopIo, OutputPins, PinConfigurator, PinId, Pull};
pub use timing::TimingConfig;
