//! Hardware abstraction traits for stepper drivers.
//!
//! Pins and PWM channels come from `embedded-hal` 1.0 directly
//! ([`OutputPin`](embedded_hal::digital::OutputPin),
//! [`InputPin`](embedded_hal::digital::InputPin),
//! [`SetDutyCycle`](embedded_hal::pwm::SetDutyCycle)). This module adds the
//! one seam `embedded-hal` has no trait for: a four-line stepper driver.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`StepperDriver`] | Writes one commutation pattern to the coil lines |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mocks from
//! [`crate::hal::mock`]. For real boards, wrap four GPIO outputs in
//! [`crate::hal::Uln2003`].
//!
//! # Example
//!
//! ```rust
//! use stepper_servo_ctl::traits::{Direction, StepperDriver};
//! use stepper_servo_ctl::hal::RecordingDriver;
//!
//! let mut driver = RecordingDriver::new();
//! driver.write_pattern([true, true, false, false]).unwrap();
//! assert_eq!(driver.patterns(), vec![[true, true, false, false]]);
//!
//! assert_eq!(Direction::from_digit(b'1'), Some(Direction::Forward));
//! ```

use crate::stepper::CoilPattern;

/// Rotation direction of a stepper axis.
///
/// On the wire, `1` is forward (positive phase advance) and `0` is backward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Phase index increases each step.
    #[default]
    Forward,
    /// Phase index decreases each step.
    Backward,
}

impl Direction {
    /// Parse the single-digit wire form.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepper_servo_ctl::Direction;
    ///
    /// assert_eq!(Direction::from_digit(b'1'), Some(Direction::Forward));
    /// assert_eq!(Direction::from_digit(b'0'), Some(Direction::Backward));
    /// assert_eq!(Direction::from_digit(b'2'), None);
    /// ```
    pub const fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            b'1' => Some(Direction::Forward),
            b'0' => Some(Direction::Backward),
            _ => None,
        }
    }

    /// The single-digit wire form.
    #[inline]
    pub const fn as_digit(&self) -> char {
        match self {
            Direction::Forward => '1',
            Direction::Backward => '0',
        }
    }

    /// The opposite direction.
    #[inline]
    pub const fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Four-line stepper coil driver.
///
/// Implementations must not block: [`write_pattern`](Self::write_pattern) is
/// called from the axis timer callback once per half-step.
pub trait StepperDriver {
    /// Error type for driver operations.
    type Error: core::fmt::Debug;

    /// Drives the four coil lines to `pattern` (`true` = energized).
    fn write_pattern(&mut self, pattern: CoilPattern) -> Result<(), Self::Error>;

    /// Drives the optional "moving" indicator line.
    ///
    /// Drivers without an indicator keep the default no-op.
    fn set_indicator(&mut self, _on: bool) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<T: StepperDriver + ?Sized> StepperDriver for &mut T {
    type Error = T::Error;

    fn write_pattern(&mut self, pattern: CoilPattern) -> Result<(), Self::Error> {
        (**self).write_pattern(pattern)
    }

    fn set_indicator(&mut self, on: bool) -> Result<(), Self::Error> {
        (**self).set_indicator(on)
    }
}
