//! Coordination primitives shared by the pipeline tasks.
//!
//! | Primitive | Built on | Used for |
//! |-----------|----------|----------|
//! | [`EventGroup`] | `tokio::sync::watch` | Per-axis completion bits |
//! | [`CountingSignal`] | `tokio::sync::Semaphore` | Encoder rotation units |
//! | [`ErrorSignal`] | `AtomicU8` | Aggregated validation errors |
//!
//! Setters ([`EventGroup::set`], [`CountingSignal::give`],
//! [`ErrorSignal::raise`]) never block and are safe to call from timer
//! callbacks and interrupt shims.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::{watch, Semaphore};

use crate::commands::ErrorFlags;

// ============================================================================
// Event Group
// ============================================================================

/// Shared bitmask that tasks wait on.
///
/// # Example
///
/// ```rust
/// use stepper_servo_ctl::services::EventGroup;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let group = EventGroup::new();
/// group.set(0b01);
/// group.set(0b10);
/// assert_eq!(group.wait_all(0b11).await, 0b11);
/// // Waited bits are cleared on exit
/// assert_eq!(group.bits(), 0);
/// # }
/// ```
#[derive(Debug)]
pub struct EventGroup {
    bits: watch::Sender<u32>,
}

impl EventGroup {
    /// A group with every bit clear.
    pub fn new() -> Self {
        let (bits, _) = watch::channel(0);
        Self { bits }
    }

    /// Sets `mask` bits and wakes waiters.
    pub fn set(&self, mask: u32) {
        self.bits.send_modify(|bits| *bits |= mask);
    }

    /// Clears `mask` bits.
    pub fn clear(&self, mask: u32) {
        self.bits.send_modify(|bits| *bits &= !mask);
    }

    /// Current bits.
    pub fn bits(&self) -> u32 {
        *self.bits.borrow()
    }

    /// Waits until every bit in `mask` is set, clears them, and returns the
    /// bits observed at wake-up.
    pub async fn wait_all(&self, mask: u32) -> u32 {
        let mut rx = self.bits.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let observed = match rx.wait_for(|bits| bits & mask == mask).await {
            Ok(bits) => *bits,
            Err(_) => self.bits(),
        };
        self.clear(mask);
        observed
    }

    /// [`wait_all`](Self::wait_all) with an optional bound. Returns `None`
    /// on timeout, leaving the bits untouched.
    pub async fn wait_all_timeout(&self, mask: u32, timeout: Option<Duration>) -> Option<u32> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait_all(mask)).await.ok(),
            None => Some(self.wait_all(mask).await),
        }
    }
}

impl Default for EventGroup {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Counting Signal
// ============================================================================

/// Unit counter handed from a producer to one consumer without losing counts.
#[derive(Debug)]
pub struct CountingSignal {
    units: Semaphore,
}

impl CountingSignal {
    /// A signal with no units.
    pub fn new() -> Self {
        Self {
            units: Semaphore::new(0),
        }
    }

    /// Adds one unit. Never blocks.
    pub fn give(&self) {
        self.units.add_permits(1);
    }

    /// Waits for a unit and consumes it. Cancel-safe: a dropped wait
    /// consumes nothing.
    pub async fn take(&self) {
        if let Ok(permit) = self.units.acquire().await {
            permit.forget();
        }
    }

    /// Consumes a unit if one is available.
    pub fn try_take(&self) -> bool {
        match self.units.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Units waiting to be consumed.
    pub fn available(&self) -> usize {
        self.units.available_permits()
    }
}

impl Default for CountingSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Error Signal
// ============================================================================

/// Error bits raised during a command cycle and drained once at its end.
#[derive(Debug, Default)]
pub struct ErrorSignal {
    pending: AtomicU8,
}

impl ErrorSignal {
    /// No pending errors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `flags` to the pending set.
    pub fn raise(&self, flags: ErrorFlags) {
        self.pending.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Takes every pending flag, leaving none.
    pub fn drain(&self) -> ErrorFlags {
        ErrorFlags::from_bits_truncate(self.pending.swap(0, Ordering::AcqRel))
    }
}
