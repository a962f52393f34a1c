//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`], built on `embedded-hal` 1.0 pins.
//!
//! # Available Implementations
//!
//! - `uln2003`: Four-line stepper driver (ULN2003 / 28BYJ-48)
//! - `ky040`: Polled rotary encoder with push button
//! - `mock`: Test implementations for desktop development (requires `std`)

pub mod ky040;
pub mod uln2003;

#[cfg(feature = "std")]
pub mod mock;

pub use ky040::*;
pub use uln2003::*;

#[cfg(feature = "std")]
pub use mock::*;
