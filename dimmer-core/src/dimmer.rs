//! The dimmer context and its two handles.
//!
//! [`Dimmer`] owns every piece of shared state. [`Dimmer::split`] hands out a
//! [`DimmerHandle`] for the configuration path and a [`ControlLoop`] for the
//! real-time context; both borrow the same context, so no statics are needed.

use core::cell::UnsafeCell;
use core::fmt;

use heapless::Vec;
use portable_atomic::{AtomicU16, Ordering};

use crate::channel::{Channel, ChannelSnapshot, ChannelTable, EdgeMode};
use crate::pins::{LoopIo, OutputPins, PinConfigurator, PinId, Pull};
use crate::quiesce::{PendingPause, QuiesceGate, QuiesceGuard};
use crate::scheduler;
use crate::timing::{DetectorLimits, MainsTiming, Observation, TimingConfig, TimingSnapshot};

/// Channel capacity used when none is given.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

const NO_SENSE_PIN: u16 = u16::MAX;

/// Errors returned by dimmer operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DimmerError<E> {
    /// The pin has no channel.
    NotFound(PinId),
    /// Every channel slot is in use.
    CapacityExhausted,
    /// The platform rejected a pin configuration.
    HardwareConfiguration(E),
}

impl<E: fmt::Display> fmt::Display for DimmerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimmerError::NotFound(pin) => write!(f, "pin {pin} is not dimmed"),
            DimmerError::CapacityExhausted => f.write_str("channel table is full"),
            DimmerError::HardwareConfiguration(err) => {
                write!(f, "pin configuration rejected: {err}")
            }
        }
    }
}

/// `remove` / `set_level` on a pin without a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NotFound(pub PinId);

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pin {} is not dimmed", self.0)
    }
}

impl<E> From<NotFound> for DimmerError<E> {
    fn from(error: NotFound) -> Self {
        DimmerError::NotFound(error.0)
    }
}

/// Result of [`DimmerHandle::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// The pin already had a channel; nothing changed.
    AlreadyPresent,
}

/// Quiesced view returned by [`DimmerHandle::list`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostics<const N: usize> {
    pub channels: Vec<ChannelSnapshot, N>,
    pub timing: TimingSnapshot,
}

/// Owned dimmer state shared by the configuration path and the control loop.
pub struct Dimmer<const N: usize = DEFAULT_CHANNEL_CAPACITY> {
    table: UnsafeCell<ChannelTable<N>>,
    timing: MainsTiming,
    gate: QuiesceGate,
    sense_pin: AtomicU16,
    config: TimingConfig,
    limits: DetectorLimits,
}

// SAFETY: the table is only mutated through `Paused`, which exists while the
// loop is parked at its checkpoint (or not running) and holds the only
// `DimmerHandle` mutably. Every other access is a shared read whose mutable
// per-channel fields are atomics.
unsafe impl<const N: usize> Sync for Dimmer<N> {}

impl<const N: usize> Dimmer<N> {
    #[must_use]
    pub fn new(config: TimingConfig) -> Self {
        Self {
            table: UnsafeCell::new(ChannelTable::new()),
            timing: MainsTiming::new(),
            gate: QuiesceGate::new(),
            sense_pin: AtomicU16::new(NO_SENSE_PIN),
            limits: DetectorLimits::from_config(&config),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    /// Splits into the configuration handle and the control-loop handle.
    pub fn split(&mut self) -> (DimmerHandle<'_, N>, ControlLoop<'_, N>) {
        let shared: &Self = self;
        (
            DimmerHandle { dimmer: shared },
            ControlLoop {
                dimmer: shared,
                online: false,
            },
        )
    }

    fn sense_pin(&self) -> Option<PinId> {
        let raw = self.sense_pin.load(Ordering::Relaxed);
        u8::try_from(raw).ok().map(PinId::new)
    }

    fn table(&self) -> &ChannelTable<N> {
        // SAFETY: see the `Sync` impl; mutation only happens through `Paused`.
        unsafe { &*self.table.get() }
    }
}

impl<const N: usize> Default for Dimmer<N> {
    fn default() -> Self {
        Self::new(TimingConfig::DEFAULT)
    }
}

/// Configuration-side handle.
pub struct DimmerHandle<'a, const N: usize = DEFAULT_CHANNEL_CAPACITY> {
    dimmer: &'a Dimmer<N>,
}

impl<'a, const N: usize> DimmerHandle<'a, N> {
    /// Configures the sense input and restarts mains detection.
    pub fn setup<P: PinConfigurator>(
        &mut self,
        pins: &mut P,
        sense_pin: PinId,
    ) -> Result<(), DimmerError<P::Error>> {
        pins.configure_input(sense_pin, Pull::Up)
            .map_err(DimmerError::HardwareConfiguration)?;
        self.quiesce().restart_detection(sense_pin);
        Ok(())
    }

    /// Adds a channel in its no-power state. A known pin is left untouched.
    pub fn add<P: PinConfigurator>(
        &mut self,
        pins: &mut P,
        pin: PinId,
        mode: EdgeMode,
    ) -> Result<AddOutcome, DimmerError<P::Error>> {
        self.quiesce().add(pins, pin, mode)
    }

    pub fn remove<P: OutputPins>(&mut self, pins: &mut P, pin: PinId) -> Result<(), NotFound> {
        self.quiesce().remove(pins, pin)
    }

    /// Stores a brightness command (clamped to `0..=1000`) and returns the
    /// derived switch delay. The loop picks it up on its next iteration.
    pub fn set_level(&self, pin: PinId, command: i32) -> Result<u32, NotFound> {
        let channel = self.dimmer.table().find(pin).ok_or(NotFound(pin))?;
        let command = scheduler::clamp_command(command);
        let delay = scheduler::switch_delay(channel.mode(), command, self.mapping_period());
        channel.store_level(command, delay);
        Ok(delay)
    }

    /// Quiesced copy of the registry plus a timing snapshot.
    pub fn list(&mut self) -> Diagnostics<N> {
        let paused = self.quiesce();
        Diagnostics {
            channels: paused.snapshot(),
            timing: paused.timing(),
        }
    }

    /// Nearest integer mains frequency, `0` when mains is absent.
    #[must_use]
    pub fn mains_frequency(&self) -> u32 {
        self.dimmer
            .config
            .frequency_for(self.dimmer.timing.half_period())
    }

    /// Unquiesced read of one channel.
    #[must_use]
    pub fn channel(&self, pin: PinId) -> Option<ChannelSnapshot> {
        self.dimmer.table().find(pin).map(Channel::snapshot)
    }

    #[must_use]
    pub fn timing(&self) -> TimingSnapshot {
        self.dimmer.timing.snapshot(&self.dimmer.config)
    }

    #[must_use]
    pub fn sense_pin(&self) -> Option<PinId> {
        self.dimmer.sense_pin()
    }

    #[must_use]
    pub fn config(&self) -> &TimingConfig {
        &self.dimmer.config
    }

    /// Busy-waits until the loop parks.
    pub fn quiesce(&mut self) -> Paused<'_, 'a, N> {
        let dimmer = self.dimmer;
        let guard = dimmer.gate.request().wait();
        Paused {
            handle: self,
            _guard: guard,
        }
    }

    /// Publishes a pause request without waiting, for callers that must yield
    /// while the loop reaches its checkpoint.
    pub fn request_pause(&mut self) -> PendingQuiesce<'_, 'a, N> {
        let dimmer = self.dimmer;
        let pending = dimmer.gate.request();
        PendingQuiesce {
            handle: self,
            pending,
        }
    }

    fn mapping_period(&self) -> u32 {
        match self.dimmer.timing.half_period() {
            0 => self.dimmer.config.nominal_half_period(),
            measured => measured,
        }
    }
}

/// A pause request that has not been acknowledged yet.
pub struct PendingQuiesce<'h, 'a, const N: usize> {
    handle: &'h mut DimmerHandle<'a, N>,
    pending: PendingPause<'a>,
}

impl<'h, 'a, const N: usize> PendingQuiesce<'h, 'a, N> {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.pending.is_ready()
    }

    /// Returns the paused view once the loop has parked.
    pub fn try_complete(self) -> Result<Paused<'h, 'a, N>, Self> {
        let Self { handle, pending } = self;
        match pending.try_complete() {
            Ok(guard) => Ok(Paused {
                handle,
                _guard: guard,
            }),
            Err(pending) => Err(Self { handle, pending }),
        }
    }
}

/// Exclusive view of the registry while the control loop is parked.
pub struct Paused<'h, 'a, const N: usize> {
    handle: &'h mut DimmerHandle<'a, N>,
    _guard: QuiesceGuard<'a>,
}

impl<'a, const N: usize> Paused<'_, 'a, N> {
    /// The configuration handle, for operations that do not need the pause.
    #[must_use]
    pub fn handle(&self) -> &DimmerHandle<'a, N> {
        &*self.handle
    }

    /// See [`DimmerHandle::add`]. Hardware is configured before the table is
    /// touched, so a rejected pin leaves the registry unchanged.
    pub fn add<P: PinConfigurator>(
        &mut self,
        pins: &mut P,
        pin: PinId,
        mode: EdgeMode,
    ) -> Result<AddOutcome, DimmerError<P::Error>> {
        if self.table().contains(pin) {
            return Ok(AddOutcome::AlreadyPresent);
        }
        if self.table().is_full() {
            return Err(DimmerError::CapacityExhausted);
        }

        pins.configure_output(pin)
            .map_err(DimmerError::HardwareConfiguration)?;
        pins.drive(pin, mode.idle_level());

        self.table_mut()
            .insert(Channel::new(pin, mode))
            .map_err(|_| DimmerError::CapacityExhausted)?;
        Ok(AddOutcome::Added)
    }

    /// Drops the channel and leaves its pin at the no-power level.
    pub fn remove<P: OutputPins>(&mut self, pins: &mut P, pin: PinId) -> Result<(), NotFound> {
        let channel = self.table_mut().remove(pin).ok_or(NotFound(pin))?;
        pins.drive(pin, channel.mode().idle_level());
        Ok(())
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<ChannelSnapshot, N> {
        self.table().snapshot()
    }

    #[must_use]
    pub fn timing(&self) -> TimingSnapshot {
        self.handle.timing()
    }

    /// Records the sense pin and returns the timing state to "no mains".
    pub fn restart_detection(&mut self, sense_pin: PinId) {
        let dimmer = self.handle.dimmer;
        dimmer
            .sense_pin
            .store(u16::from(sense_pin.as_u8()), Ordering::Relaxed);
        dimmer.timing.reset();
    }

    fn table(&self) -> &ChannelTable<N> {
        self.handle.dimmer.table()
    }

    fn table_mut(&mut self) -> &mut ChannelTable<N> {
        // SAFETY: the guard keeps the loop parked and `handle` is borrowed
        // mutably, so no other reference into the table is live.
        unsafe { &mut *self.handle.dimmer.table.get() }
    }
}

/// Control-loop handle. Runs in its own execution context and never blocks
/// outside the quiesce checkpoint.
pub struct ControlLoop<'a, const N: usize = DEFAULT_CHANNEL_CAPACITY> {
    dimmer: &'a Dimmer<N>,
    online: bool,
}

impl<const N: usize> ControlLoop<'_, N> {
    /// One iteration: quiesce checkpoint, detector step, scheduler pass.
    pub fn poll<IO: LoopIo>(&mut self, io: &mut IO) -> Observation {
        let dimmer = self.dimmer;
        if !self.online {
            dimmer.gate.go_online();
            self.online = true;
        }
        dimmer.gate.checkpoint();

        let Some(sense_pin) = dimmer.sense_pin() else {
            return Observation::Absent;
        };

        let now = io.cycle_count();
        let sense = io.read(sense_pin);
        let table = dimmer.table();

        let observation = dimmer.timing.observe(&dimmer.limits, now, sense);
        match observation {
            Observation::Crossing => scheduler::reset_phase(table, io),
            Observation::Elapsed(elapsed) => scheduler::advance(table, elapsed, io),
            Observation::Absent => {}
        }
        observation
    }

    /// Runs one iteration without staying registered as running afterwards,
    /// so the same context can interleave configuration calls and iterations.
    pub fn step<IO: LoopIo>(&mut self, io: &mut IO) -> Observation {
        let observation = self.poll(io);
        self.dimmer.gate.go_offline();
        self.online = false;
        observation
    }

    pub fn run<IO: LoopIo>(&mut self, io: &mut IO) -> ! {
        loop {
            self.poll(io);
        }
    }
}

impl<const N: usize> Drop for ControlLoop<'_, N> {
    fn drop(&mut self) {
        if self.online {
            self.dimmer.gate.go_offline();
        }
    }
}

impl<const N: usize> fmt::Debug for Dimmer<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dimmer")
            .field("config", &self.config)
            .field("sense_pin", &self.sense_pin())
            .finish_non_exhaustive()
    }
}
