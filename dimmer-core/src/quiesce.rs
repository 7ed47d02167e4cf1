//! Cooperative pause handshake between the configuration path and the loop.
//!
//! The control loop cannot block, so structural changes to the channel table
//! are fenced by a request/acknowledge pair instead of a lock:
//!
//! 1. the mutator publishes a ticket in `request`;
//! 2. the loop, at the top of its next iteration, copies the ticket into
//!    `acknowledged` and spins until `request` no longer holds it;
//! 3. the mutator sees its own ticket acknowledged, mutates, then clears
//!    `request`.
//!
//! Tickets are odd and never reused back to back, so an acknowledgement left
//! over from an earlier pause can never release a later one. A loop that is not
//! running (`online == false`) cannot read the table, so a pause requested
//! while it is offline completes immediately; the loop publishes `online`
//! before its first checkpoint and both sides use sequentially consistent
//! accesses, so at least one of them observes the other.

use core::hint::spin_loop;

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

const NO_REQUEST: u32 = 0;

/// Shared flags of the handshake.
#[derive(Debug)]
pub struct QuiesceGate {
    request: AtomicU32,
    acknowledged: AtomicU32,
    online: AtomicBool,
    next_ticket: AtomicU32,
}

impl QuiesceGate {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            request: AtomicU32::new(NO_REQUEST),
            acknowledged: AtomicU32::new(NO_REQUEST),
            online: AtomicBool::new(false),
            next_ticket: AtomicU32::new(1),
        }
    }

    /// Publishes a pause request and returns a handle to wait on it.
    pub fn request(&self) -> PendingPause<'_> {
        let ticket = self.next_ticket.fetch_add(2, Ordering::Relaxed);
        self.request.store(ticket, Ordering::SeqCst);
        PendingPause { gate: self, ticket }
    }

    /// Loop side: parks while a pause is requested. Returns `true` if it parked.
    pub fn checkpoint(&self) -> bool {
        let ticket = self.request.load(Ordering::SeqCst);
        if ticket == NO_REQUEST {
            return false;
        }

        self.acknowledged.store(ticket, Ordering::SeqCst);
        while self.request.load(Ordering::SeqCst) == ticket {
            spin_loop();
        }
        true
    }

    /// Marks the loop as running. Must precede the loop's first checkpoint.
    pub fn go_online(&self) {
        self.online.store(true, Ordering::SeqCst);
    }

    /// Marks the loop as stopped; pending and future pauses stop waiting.
    pub fn go_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// `true` while any pause is requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.request.load(Ordering::SeqCst) != NO_REQUEST
    }

    fn is_parked_for(&self, ticket: u32) -> bool {
        self.acknowledged.load(Ordering::SeqCst) == ticket
            || !self.online.load(Ordering::SeqCst)
    }

    fn release(&self, ticket: u32) {
        let _ = self.acknowledged.compare_exchange(
            ticket,
            NO_REQUEST,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        let _ = self.request.compare_exchange(
            ticket,
            NO_REQUEST,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

impl Default for QuiesceGate {
    fn default() -> Self {
        Self::new()
    }
}

/// A published request the loop has not necessarily acknowledged yet.
///
/// Dropping it withdraws the request.
#[derive(Debug)]
#[must_use = "dropping a pending pause withdraws the request"]
pub struct PendingPause<'a> {
    gate: &'a QuiesceGate,
    ticket: u32,
}

impl<'a> PendingPause<'a> {
    /// `true` once the loop is parked (or not running).
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.gate.is_parked_for(self.ticket)
    }

    /// Converts into a guard if the loop is parked, otherwise hands itself back.
    pub fn try_complete(self) -> Result<QuiesceGuard<'a>, Self> {
        if self.is_ready() {
            Ok(self.into_guard())
        } else {
            Err(self)
        }
    }

    /// Busy-waits until the loop parks.
    pub fn wait(self) -> QuiesceGuard<'a> {
        while !self.is_ready() {
            spin_loop();
        }
        self.into_guard()
    }

    fn into_guard(self) -> QuiesceGuard<'a> {
        let guard = QuiesceGuard {
            gate: self.gate,
            ticket: self.ticket,
        };
        core::mem::forget(self);
        guard
    }
}

impl Drop for PendingPause<'_> {
    fn drop(&mut self) {
        self.gate.release(self.ticket);
    }
}

/// Proof that the loop is parked. Dropping it lets the loop resume.
#[derive(Debug)]
#[must_use = "the loop resumes as soon as the guard is dropped"]
pub struct QuiesceGuard<'a> {
    gate: &'a QuiesceGate,
    ticket: u32,
}

impl Drop for QuiesceGuard<'_> {
    fn drop(&mut self) {
        self.gate.release(self.ticket);
    }
}
