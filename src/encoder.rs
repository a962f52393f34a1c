//! Rotary encoder decoding: rotation events, menu selection, and the
//! commands a detent produces.
//!
//! The interrupt side only classifies an edge ([`Rotation::from_companion`])
//! and bumps a counter. Everything else here runs in the encoder worker:
//! [`next_selection`] on button presses and [`CommandBuilder::build`] per
//! consumed rotation unit.
//!
//! Menu indices `0..axis_count` address stepper axes; index `axis_count`
//! addresses the servo.
//!
//! # Example
//!
//! ```rust
//! use stepper_servo_ctl::encoder::{next_selection, CommandBuilder, MenuTarget, Rotation};
//! use stepper_servo_ctl::config::MotionConfig;
//! use stepper_servo_ctl::{AxisId, Command, Direction};
//!
//! let builder = CommandBuilder::new(&MotionConfig::default());
//!
//! let cmd = builder.build(MenuTarget::Stepper(AxisId(1)), Rotation::Negative, 90);
//! assert_eq!(cmd, Command::relative_move(AxisId(1), Direction::Backward, 170));
//!
//! let cmd = builder.build(MenuTarget::Servo, Rotation::Positive, 90);
//! assert_eq!(cmd, Command::ServoAbsoluteSetpoint { angle: 100 });
//!
//! // Two axes: 0 -> 1 -> servo -> 0
//! assert_eq!(next_selection(1, 2), 2);
//! assert_eq!(next_selection(2, 2), 0);
//! ```

use crate::commands::{AxisId, Command};
use crate::config::MotionConfig;
use crate::stepper::angle_to_steps;
use crate::traits::Direction;

// ============================================================================
// Rotation
// ============================================================================

/// One detent of rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotation {
    /// Companion channel was high at the clock edge.
    Positive,
    /// Companion channel was low at the clock edge.
    Negative,
}

impl Rotation {
    /// Classifies a clock edge by the companion channel level.
    #[inline]
    pub const fn from_companion(companion_high: bool) -> Self {
        if companion_high {
            Rotation::Positive
        } else {
            Rotation::Negative
        }
    }

    /// Stepper direction for this rotation.
    #[inline]
    pub const fn direction(self) -> Direction {
        match self {
            Rotation::Positive => Direction::Forward,
            Rotation::Negative => Direction::Backward,
        }
    }
}

/// Edge detector for boards that sample the encoder instead of taking
/// interrupts. Reports a rotation on every falling clock edge.
#[derive(Clone, Copy, Debug)]
pub struct QuadratureDecoder {
    last_clock: bool,
}

impl QuadratureDecoder {
    /// Starts from the current clock level so power-up is not an edge.
    pub const fn new(clock_high: bool) -> Self {
        Self {
            last_clock: clock_high,
        }
    }

    /// Feeds one sample of both channels.
    pub fn update(&mut self, clock_high: bool, companion_high: bool) -> Option<Rotation> {
        let falling = self.last_clock && !clock_high;
        self.last_clock = clock_high;
        falling.then(|| Rotation::from_companion(companion_high))
    }
}

// ============================================================================
// Menu Selection
// ============================================================================

/// Actuator addressed by the encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum MenuTarget {
    /// A stepper axis.
    Stepper(AxisId),
    /// The servo (last menu index).
    Servo,
}

impl MenuTarget {
    /// Target for a raw menu index.
    pub fn from_index(index: usize, axis_count: usize) -> Self {
        if index < axis_count {
            MenuTarget::Stepper(AxisId(index as u8))
        } else {
            MenuTarget::Servo
        }
    }
}

/// Menu index after one button press: `(current + 1) mod (axis_count + 1)`.
#[inline]
pub const fn next_selection(current: usize, axis_count: usize) -> usize {
    (current + 1) % (axis_count + 1)
}

// ============================================================================
// Command Builder
// ============================================================================

/// Turns one rotation unit into a motion command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandBuilder {
    stepper_steps: u32,
    servo_step_deg: i32,
    servo_min: i32,
    servo_max: i32,
}

impl CommandBuilder {
    /// Builder with the configured per-detent increments.
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            stepper_steps: angle_to_steps(
                config.encoder.stepper_step_deg,
                config.stepper.steps_per_revolution,
            ),
            servo_step_deg: config.encoder.servo_step_deg,
            servo_min: config.servo.angle_min,
            servo_max: config.servo.angle_max,
        }
    }

    /// Half-steps a stepper detent moves.
    pub fn stepper_steps(&self) -> u32 {
        self.stepper_steps
    }

    /// Servo angle one detent away from `from`, held inside the servo range.
    pub fn servo_target(&self, rotation: Rotation, from: i32) -> i32 {
        let delta = match rotation {
            Rotation::Positive => self.servo_step_deg,
            Rotation::Negative => -self.servo_step_deg,
        };
        from.saturating_add(delta)
            .clamp(self.servo_min, self.servo_max.max(self.servo_min))
    }

    /// Command for one rotation unit against `target`.
    ///
    /// Servo setpoints are relative to `servo_angle` and clamped to the
    /// servo range.
    pub fn build(&self, target: MenuTarget, rotation: Rotation, servo_angle: i32) -> Command {
        match target {
            MenuTarget::Stepper(axis) => {
                Command::relative_move(axis, rotation.direction(), self.stepper_steps)
            }
            MenuTarget::Servo => Command::ServoAbsoluteSetpoint {
                angle: self.servo_target(rotation, servo_angle),
            },
        }
    }
}
