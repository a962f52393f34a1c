//! Async runtime for the motion pipeline (requires the `runtime` feature).
//!
//! Maps the firmware's execution contexts onto tokio:
//!
//! | Firmware context | Here |
//! |------------------|------|
//! | Interrupt handler | Synchronous [`EncoderInputs`] methods (never block) |
//! | Service thread (deferred work) | [`run_deferred`] task |
//! | Periodic timer callback | One [`StepperEngine`] task per axis |
//! | Application threads | [`Coordinator`], [`EncoderWorker`], [`run_display`] |
//!
//! [`MotionSystem::start`] wires them together:
//!
//! ```ignore
//! let system = MotionSystem::start(&config, drivers, pwm, display, transport)?;
//!
//! // Transport RX callback
//! system.sender().deliver_line(":S0D1A090").await?;
//!
//! // Encoder interrupt shims
//! system.encoder().rotation_edge(dt_is_high);
//! system.encoder().button_edge();
//! ```

pub mod coordinator;
pub mod display;
pub mod encoder;
pub mod queue;
pub mod stepper;
pub mod sync;
pub mod system;

pub use coordinator::*;
pub use display::*;
pub use encoder::*;
pub use queue::*;
pub use stepper::*;
pub use sync::*;
pub use system::*;
