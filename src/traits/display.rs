//! Display abstraction for the menu and motion state.
//!
//! This module defines the [`MotionDisplay`] trait for rendering a
//! [`DisplaySnapshot`] to character LCDs, OLEDs, or a log.

use heapless::Vec;

use crate::commands::MAX_AXES;
use crate::encoder::MenuTarget;

/// Everything a display needs, read from the published mailboxes and the
/// stepper engine at refresh time.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DisplaySnapshot {
    /// Actuator the encoder currently drives.
    pub selection: MenuTarget,
    /// Last published servo angle in degrees.
    pub servo_angle: i32,
    /// Remaining travel per axis in degrees.
    pub pending_angles: Vec<u32, MAX_AXES>,
}

/// Display trait for rendering motion state.
///
/// # Example
///
/// ```ignore
/// use stepper_servo_ctl::traits::{DisplaySnapshot, MotionDisplay};
///
/// struct Lcd1602 { /* ... */ }
///
/// impl MotionDisplay for Lcd1602 {
///     type Error = ();
///
///     fn render(&mut self, snapshot: &DisplaySnapshot) -> Result<(), ()> {
///         // Row 1: selection, row 2: servo angle
///         Ok(())
///     }
/// }
/// ```
pub trait MotionDisplay {
    /// Error type for display operations.
    type Error: core::fmt::Debug;

    /// Renders a snapshot. Called on every refresh request.
    fn render(&mut self, snapshot: &DisplaySnapshot) -> Result<(), Self::Error>;
}
