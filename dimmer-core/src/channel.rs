//! Channel registry.
//!
//! The registry is a fixed-capacity, ordered table keyed by pin. Its shape only
//! changes while the control loop is parked (see [`crate::quiesce`]); the
//! per-channel scalars are single-word atomics the loop reads every iteration.

use core::fmt;

use heapless::Vec;
use portable_atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use crate::pins::{Level, PinId};

/// Largest accepted brightness command.
pub const COMMAND_MAX: u16 = 1000;

/// Phase-cut strategy used by a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EdgeMode {
    /// Output switches the load on late in the half-cycle.
    LeadingEdge,
    /// Output conducts from the crossing and cuts the load late in the half-cycle.
    #[default]
    TrailingEdge,
}

impl EdgeMode {
    /// Level driven at every zero crossing, before the channel's delay elapses.
    #[must_use]
    pub const fn crossing_level(self) -> Level {
        match self {
            EdgeMode::LeadingEdge => Level::Low,
            EdgeMode::TrailingEdge => Level::High,
        }
    }

    /// Level driven once the channel's delay has elapsed.
    #[must_use]
    pub const fn switch_level(self) -> Level {
        match self {
            EdgeMode::LeadingEdge => Level::High,
            EdgeMode::TrailingEdge => Level::Low,
        }
    }

    /// Level that delivers no power to the load.
    #[must_use]
    pub const fn idle_level(self) -> Level {
        Level::Low
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            EdgeMode::LeadingEdge => "leading",
            EdgeMode::TrailingEdge => "trailing",
        }
    }

    /// Parses the console keyword for an edge mode (case-insensitive).
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        if keyword.eq_ignore_ascii_case("leading") {
            Some(EdgeMode::LeadingEdge)
        } else if keyword.eq_ignore_ascii_case("trailing") {
            Some(EdgeMode::TrailingEdge)
        } else {
            None
        }
    }
}

impl fmt::Display for EdgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One controlled output.
#[derive(Debug)]
pub struct Channel {
    pin: PinId,
    mode: EdgeMode,
    command: AtomicU16,
    switch_delay: AtomicU32,
    switched: AtomicBool,
}

impl Channel {
    /// Builds a channel in the no-power state for its edge mode.
    ///
    /// Leading-edge channels get a delay no half-cycle can reach. Trailing-edge
    /// channels start with a zero delay and `switched == false`, so the next
    /// crossing cuts them immediately.
    #[must_use]
    pub fn new(pin: PinId, mode: EdgeMode) -> Self {
        let (command, delay) = match mode {
            EdgeMode::LeadingEdge => (0, u32::MAX),
            EdgeMode::TrailingEdge => (0, 0),
        };

        Self {
            pin,
            mode,
            command: AtomicU16::new(command),
            switch_delay: AtomicU32::new(delay),
            switched: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn pin(&self) -> PinId {
        self.pin
    }

    #[must_use]
    pub fn mode(&self) -> EdgeMode {
        self.mode
    }

    #[must_use]
    pub fn command(&self) -> u16 {
        self.command.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn switch_delay(&self) -> u32 {
        self.switch_delay.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_switched(&self) -> bool {
        self.switched.load(Ordering::Relaxed)
    }

    /// Stores a new command and its derived delay. Last writer wins.
    pub fn store_level(&self, command: u16, delay: u32) {
        self.command.store(command, Ordering::Relaxed);
        self.switch_delay.store(delay, Ordering::Relaxed);
    }

    pub(crate) fn mark_switched(&self, switched: bool) {
        self.switched.store(switched, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            pin: self.pin,
            mode: self.mode,
            command: self.command(),
            switch_delay: self.switch_delay(),
            switched: self.is_switched(),
        }
    }
}

/// Point-in-time copy of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub pin: PinId,
    pub mode: EdgeMode,
    pub command: u16,
    pub switch_delay: u32,
    pub switched: bool,
}

/// Errors raised when inserting into a full table.
#[derive(Debug)]
pub struct TableFull(pub Channel);

/// Ordered, fixed-capacity table of channels.
#[derive(Debug)]
pub struct ChannelTable<const N: usize> {
    channels: Vec<Channel, N>,
}

impl<const N: usize> ChannelTable<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.channels.is_full()
    }

    #[must_use]
    pub fn contains(&self, pin: PinId) -> bool {
        self.find(pin).is_some()
    }

    #[must_use]
    pub fn find(&self, pin: PinId) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.pin == pin)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Channel> {
        self.channels.iter()
    }

    /// Appends a channel. The caller guarantees the pin is not yet present.
    pub fn insert(&mut self, channel: Channel) -> Result<(), TableFull> {
        debug_assert!(!self.contains(channel.pin));
        self.channels.push(channel).map_err(TableFull)
    }

    /// Removes the channel for `pin`, keeping the order of the rest.
    pub fn remove(&mut self, pin: PinId) -> Option<Channel> {
        let index = self.channels.iter().position(|channel| channel.pin == pin)?;
        Some(self.channels.remove(index))
    }

    pub fn snapshot(&self) -> Vec<ChannelSnapshot, N> {
        self.channels.iter().map(Channel::snapshot).collect()
    }
}

impl<const N: usize> Default for ChannelTable<N> {
    fn default() -> Self {
        Self::new()
    }
}
