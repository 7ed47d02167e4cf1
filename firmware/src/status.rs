#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared link state for the firmware target.
//!
//! The USB task publishes whether a host holds the console open; the console
//! task reads it to decide whether responses are worth queueing.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Set while the host has the console port open with DTR asserted.
static CONSOLE_ATTACHED: AtomicBool = AtomicBool::new(false);
/// Response frames dropped because nobody was listening.
static DROPPED_FRAMES: AtomicU32 = AtomicU32::new(0);

/// Updates the cached console attachment flag.
pub fn set_console_attached(attached: bool) {
    CONSOLE_ATTACHED.store(attached, Ordering::Relaxed);
}

pub fn console_attached() -> bool {
    CONSOLE_ATTACHED.load(Ordering::Relaxed)
}

/// Counts a response frame that was discarded.
pub fn record_dropped_frame() -> u32 {
    DROPPED_FRAMES.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
}
