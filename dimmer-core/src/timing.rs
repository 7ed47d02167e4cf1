//! Mains timing: zero-crossing detection, half-period estimation and the
//! derived frequency report.
//!
//! All state lives in atomics so the configuration path can take snapshots
//! while the loop runs. The loop is the only writer outside of a pause.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::pins::Level;

/// Counter and mains-frequency parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    /// Cycle-counter rate in ticks per second.
    pub counter_hz: u32,
    /// Slowest supported mains frequency; bounds the staleness timeout.
    pub min_mains_hz: u32,
    /// Fastest supported mains frequency; bounds the debounce floor.
    pub max_mains_hz: u32,
    /// Frequency assumed for level mapping before mains has been measured.
    pub nominal_mains_hz: u32,
}

impl TimingConfig {
    /// 1 MHz counter, 45-65 Hz mains, 50 Hz nominal.
    pub const DEFAULT: Self = Self {
        counter_hz: 1_000_000,
        min_mains_hz: 45,
        max_mains_hz: 65,
        nominal_mains_hz: 50,
    };

    #[must_use]
    pub const fn with_counter_hz(mut self, counter_hz: u32) -> Self {
        self.counter_hz = counter_hz;
        self
    }

    /// No crossing for longer than this means mains is absent: 110% of the
    /// half-period at the slowest supported frequency.
    #[must_use]
    pub fn max_target(&self) -> u32 {
        self.scaled_half_period(self.min_mains_hz, 11)
    }

    /// Shortest plausible half-period: 90% of the half-period at the fastest
    /// supported frequency. Anything shorter is noise.
    #[must_use]
    pub fn min_half_period(&self) -> u32 {
        self.scaled_half_period(self.max_mains_hz, 9)
    }

    #[must_use]
    pub fn nominal_half_period(&self) -> u32 {
        self.scaled_half_period(self.nominal_mains_hz, 10)
    }

    /// Nearest integer frequency for a half-period, `0` for "no mains".
    #[must_use]
    pub fn frequency_for(&self, half_period: u32) -> u32 {
        if half_period == 0 {
            return 0;
        }

        let full_period = 2 * u64::from(half_period);
        let hz = (u64::from(self.counter_hz) + full_period / 2) / full_period;
        saturate(hz)
    }

    // counter_hz / (2 * hz) * tenths / 10
    fn scaled_half_period(&self, hz: u32, tenths: u64) -> u32 {
        let hz = u64::from(hz.max(1));
        saturate(u64::from(self.counter_hz) * tenths / (20 * hz))
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Detector thresholds derived once from a [`TimingConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectorLimits {
    pub min_half_period: u32,
    pub max_target: u32,
}

impl DetectorLimits {
    #[must_use]
    pub fn from_config(config: &TimingConfig) -> Self {
        Self {
            min_half_period: config.min_half_period(),
            max_target: config.max_target(),
        }
    }

    #[must_use]
    pub fn is_plausible(&self, elapsed: u32) -> bool {
        (self.min_half_period..=self.max_target).contains(&elapsed)
    }
}

/// Result of one detector step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observation {
    /// A zero crossing was declared; every channel starts a new half-cycle.
    Crossing,
    /// Mains is present and no crossing was declared; carries ticks since the
    /// last crossing.
    Elapsed(u32),
    /// Mains is absent; nothing may be switched.
    Absent,
}

/// Process-wide mains timing state.
#[derive(Debug)]
pub struct MainsTiming {
    last_crossing: AtomicU32,
    half_period: AtomicU32,
    poll_target: AtomicU32,
    crossings: AtomicU32,
    present: AtomicBool,
}

impl MainsTiming {
    /// Starts in the "no mains" state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_crossing: AtomicU32::new(0),
            half_period: AtomicU32::new(0),
            poll_target: AtomicU32::new(0),
            crossings: AtomicU32::new(0),
            present: AtomicBool::new(false),
        }
    }

    /// Returns to the "no mains" state. Only call while the loop is parked.
    pub fn reset(&self) {
        self.last_crossing.store(0, Ordering::Relaxed);
        self.half_period.store(0, Ordering::Relaxed);
        self.poll_target.store(0, Ordering::Relaxed);
        self.crossings.store(0, Ordering::Relaxed);
        self.present.store(false, Ordering::Relaxed);
    }

    #[must_use]
    pub fn half_period(&self) -> u32 {
        self.half_period.load(Ordering::Relaxed)
    }

    /// One detector step at counter value `now` with the sense input at `sense`.
    pub fn observe(&self, limits: &DetectorLimits, now: u32, sense: Level) -> Observation {
        let elapsed = now.wrapping_sub(self.last_crossing.load(Ordering::Relaxed));
        let poll_target = self.poll_target.load(Ordering::Relaxed);

        if elapsed > poll_target && sense.is_high() {
            self.record_crossing(limits, now, elapsed);
            return Observation::Crossing;
        }

        if elapsed > limits.max_target {
            self.mark_absent();
            return Observation::Absent;
        }

        if self.present.load(Ordering::Relaxed) {
            Observation::Elapsed(elapsed)
        } else {
            Observation::Absent
        }
    }

    fn record_crossing(&self, limits: &DetectorLimits, now: u32, elapsed: u32) {
        // The first crossing after an outage has no valid reference point.
        let had_reference = self.present.load(Ordering::Relaxed);
        let half_period = if had_reference && limits.is_plausible(elapsed) {
            elapsed
        } else {
            0
        };
        let poll_target = if elapsed > limits.max_target {
            0
        } else {
            saturate(u64::from(elapsed) * 9 / 10)
        };

        self.last_crossing.store(now, Ordering::Relaxed);
        self.half_period.store(half_period, Ordering::Relaxed);
        self.poll_target.store(poll_target, Ordering::Relaxed);
        self.crossings.store(
            self.crossings.load(Ordering::Relaxed).wrapping_add(1),
            Ordering::Relaxed,
        );
        self.present.store(true, Ordering::Relaxed);
    }

    fn mark_absent(&self) {
        self.poll_target.store(0, Ordering::Relaxed);
        self.half_period.store(0, Ordering::Relaxed);
        self.present.store(false, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self, config: &TimingConfig) -> TimingSnapshot {
        let half_period = self.half_period();
        TimingSnapshot {
            half_period,
            crossings: self.crossings.load(Ordering::Relaxed),
            last_crossing: self.last_crossing.load(Ordering::Relaxed),
            poll_target: self.poll_target.load(Ordering::Relaxed),
            max_target: config.max_target(),
            mains_present: self.present.load(Ordering::Relaxed),
            mains_hz: config.frequency_for(half_period),
        }
    }
}

impl Default for MainsTiming {
    fn default() -> Self {
        Self::new()
    }
}

/// Eventually consistent copy of the timing state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingSnapshot {
    pub half_period: u32,
    pub crossings: u32,
    pub last_crossing: u32,
    pub poll_target: u32,
    pub max_target: u32,
    pub mains_present: bool,
    pub mains_hz: u32,
}
