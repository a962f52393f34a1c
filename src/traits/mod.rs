//! Trait definitions for hardware abstraction, transport, and display.
//!
//! These traits let the pipeline run on a microcontroller or against
//! desktop mocks without changes:
//!
//! # Submodules
//!
//! - `hardware`: Stepper coil driver and rotation direction
//! - `transport`: Outbound status lines
//! - `display`: Menu and motion state rendering
//!
//! Pins and PWM channels use the `embedded-hal` 1.0 traits directly.

pub mod display;
pub mod hardware;
pub mod transport;

pub use display::*;
pub use hardware::*;
pub use transport::*;
