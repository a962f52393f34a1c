//! Single-slot overwrite mailboxes.
//!
//! A [`Mailbox`] holds exactly one value. Writers replace it, readers always
//! see the latest write and never block. Writes use `Release` and reads use
//! `Acquire`, so anything written before an `overwrite` is visible to a
//! reader that observes the new value.
//!
//! Used for the published servo angle and the encoder menu selection.
//!
//! ```rust
//! use stepper_servo_ctl::mailbox::Mailbox;
//!
//! let angle: Mailbox<i32> = Mailbox::new(90);
//! angle.overwrite(-15);
//! angle.overwrite(120);
//! assert_eq!(angle.peek(), 120);
//! ```

use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU32, Ordering};

/// Values that fit a 32-bit mailbox slot.
pub trait MailboxValue: Copy {
    /// Packs the value into the slot.
    fn to_slot(self) -> u32;
    /// Unpacks a value previously packed with [`to_slot`](Self::to_slot).
    fn from_slot(raw: u32) -> Self;
}

impl MailboxValue for u32 {
    fn to_slot(self) -> u32 {
        self
    }

    fn from_slot(raw: u32) -> Self {
        raw
    }
}

impl MailboxValue for i32 {
    fn to_slot(self) -> u32 {
        self as u32
    }

    fn from_slot(raw: u32) -> Self {
        raw as i32
    }
}

impl MailboxValue for usize {
    fn to_slot(self) -> u32 {
        self as u32
    }

    fn from_slot(raw: u32) -> Self {
        raw as usize
    }
}

/// Latest-value cell shared between one writer and any number of readers.
pub struct Mailbox<T: MailboxValue> {
    slot: AtomicU32,
    _value: PhantomData<T>,
}

impl<T: MailboxValue> Mailbox<T> {
    /// Creates a mailbox holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            slot: AtomicU32::new(initial.to_slot()),
            _value: PhantomData,
        }
    }

    /// Replaces the stored value.
    #[inline]
    pub fn overwrite(&self, value: T) {
        self.slot.store(value.to_slot(), Ordering::Release);
    }

    /// Reads the latest value without consuming it.
    #[inline]
    pub fn peek(&self) -> T {
        T::from_slot(self.slot.load(Ordering::Acquire))
    }
}

impl<T: MailboxValue + fmt::Debug> fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Mailbox").field(&self.peek()).finish()
    }
}

impl<T: MailboxValue + Default> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
