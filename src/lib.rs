//! # stepper-servo-ctl
//!
//! Motion command pipeline for small stepper/servo controller boards:
//! short text frames (from a serial link or a rotary encoder) drive several
//! stepper axes and one servo, and completion and error status is reported
//! back over the link.
//!
//! ## Features
//!
//! - **Frame parser**: `:X<angle>`, `:S<axis>D<dir>A<angle>` (repeatable for
//!   joint moves), `:S<axis>V<period>`, with every field error collected
//! - **Stepper engine**: 8-phase half-step commutation, one periodic timer per
//!   axis, completion signalled through a shared bitmask group
//! - **Servo engine**: angle to duty mapping with clamping, on any
//!   `embedded-hal` PWM channel
//! - **Encoder decoder**: interrupt-safe rotation counting and menu selection
//! - **Coordinator**: FIFO command processing with `SCT:BGN`/`SCT:END` and
//!   `AST:ERR:<CODE>` status lines
//!
//! ## Architecture
//!
//! The core is `no_std` and testable without hardware:
//!
//! - `commands` - Command types, error flags, status lines
//! - `parsing` - Frame grammar
//! - `stepper` - Commutation table and the per-axis state machine
//! - `servo` - Servo positioning engine
//! - `encoder` - Rotation events, menu selection, detent commands
//! - `mailbox` - Single-slot overwrite cells
//! - `traits` - Driver, transport and display abstractions
//! - `hal` - Concrete drivers (ULN2003, KY-040) and mocks
//! - `services` - tokio runtime: per-axis timers, coordinator, encoder tasks
//!
//! ## Example
//!
//! ```rust
//! use stepper_servo_ctl::{parse_frame, AxisId, Command, Direction, FrameLimits};
//! use stepper_servo_ctl::stepper::{AxisState, TickOutcome};
//!
//! // Parse a frame for a two-axis board
//! let limits = FrameLimits::new(2);
//! let cmd = parse_frame(":S0D1A090", &limits).unwrap();
//! assert_eq!(cmd, Command::relative_move(AxisId(0), Direction::Forward, 1024));
//!
//! // Drive the axis state machine by hand
//! let mut axis = AxisState::new();
//! axis.set_setpoint(1024, Direction::Forward);
//! let mut steps = 0;
//! while let TickOutcome::Stepped(_pattern) = axis.tick() {
//!     steps += 1;
//! }
//! assert_eq!(steps, 1024);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Command types, error flags, and status lines.
pub mod commands;
/// Rotary encoder decoding and detent commands.
pub mod encoder;
/// Hardware abstraction layer with drivers and mocks.
pub mod hal;
/// Single-slot overwrite mailboxes.
pub mod mailbox;
/// Servo positioning engine.
pub mod servo;
/// Commutation table and per-axis state machine.
pub mod stepper;
/// Core traits for hardware, transport, and display abstraction.
pub mod traits;

/// Pipeline configuration.
pub mod config;

/// Command frame parser.
pub mod parsing;

/// Async pipeline runtime (tokio).
#[cfg(feature = "runtime")]
pub mod services;

// Re-exports for convenience
pub use commands::{AxisId, AxisMove, Command, ErrorFlags, StatusLine, MAX_AXES};
pub use encoder::{MenuTarget, Rotation};
pub use mailbox::Mailbox;
pub use parsing::{parse_frame, validate, FrameError, FrameLimits};
pub use servo::{ServoEngine, ServoError};
pub use stepper::{AxisState, CoilPattern, TickOutcome, COMMUTATION};
pub use traits::{DisplaySnapshot, Direction, MotionDisplay, StepperDriver, Transport};

// Config re-exports
pub use config::{
    CoordinatorConfig, DutyPolicy, EncoderConfig, MotionConfig, ServoConfig, StepperConfig,
};

#[cfg(feature = "runtime")]
pub use services::{CommandSender, EncoderInputs, MotionSystem, Request, SubmitError};
