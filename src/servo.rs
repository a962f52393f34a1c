//! Servo positioning engine.
//!
//! Converts an absolute angle into a PWM duty cycle on any
//! [`SetDutyCycle`] channel and publishes the resulting angle to a
//! [`Mailbox`] that the encoder decoder and the display read.
//!
//! | Request | Applied duty | Published angle | Result |
//! |---------|--------------|-----------------|--------|
//! | below `angle_min` | `duty_min` | `angle_min` | `Err(OutOfRange)` |
//! | above `angle_max` | `duty_max` | `angle_max` | `Err(OutOfRange)` |
//! | in range | linear map | requested (or snapped, see [`DutyPolicy`]) | `Ok` |
//!
//! # Example
//!
//! ```rust
//! use stepper_servo_ctl::config::ServoConfig;
//! use stepper_servo_ctl::hal::MockPwm;
//! use stepper_servo_ctl::servo::{ServoEngine, ServoError};
//!
//! let mut servo = ServoEngine::new(MockPwm::new(1000), ServoConfig::default());
//!
//! servo.absolute_setpoint(90).unwrap();
//! assert_eq!(servo.pwm().duty, 75); // 1.5 ms of 20 ms
//!
//! let err = servo.absolute_setpoint(200).unwrap_err();
//! assert!(matches!(err, ServoError::OutOfRange { requested: 200, clamped: 180 }));
//! assert_eq!(servo.angle(), 180);
//! ```

use alloc::sync::Arc;

use embedded_hal::pwm::{Error as _, ErrorKind, SetDutyCycle};
use thiserror::Error;

use crate::config::{DutyPolicy, ServoConfig};
use crate::mailbox::Mailbox;

/// Why a setpoint was not applied as requested.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoError {
    /// The angle was clamped to the nearest end of the range and applied.
    #[error("angle {requested} outside range, clamped to {clamped}")]
    OutOfRange {
        /// Angle asked for.
        requested: i32,
        /// Angle applied and published.
        clamped: i32,
    },
    /// The PWM channel refused the duty cycle.
    #[error("PWM output failed: {0:?}")]
    Pwm(ErrorKind),
}

/// Servo on a single PWM channel.
pub struct ServoEngine<P: SetDutyCycle> {
    pwm: P,
    config: ServoConfig,
    published: Arc<Mailbox<i32>>,
}

impl<P: SetDutyCycle> ServoEngine<P> {
    /// Wraps a PWM channel. Nothing is written until [`init`](Self::init)
    /// or the first setpoint.
    pub fn new(pwm: P, config: ServoConfig) -> Self {
        let published = Arc::new(Mailbox::new(config.center_angle()));
        Self {
            pwm,
            config,
            published,
        }
    }

    /// Centers the servo and publishes the center angle.
    pub fn init(&mut self) -> Result<(), ServoError> {
        let center = self.config.center_angle();
        self.apply(center)?;
        self.published.overwrite(center);
        Ok(())
    }

    /// Moves to `angle` degrees.
    ///
    /// Out-of-range requests are clamped, applied, published, and still
    /// returned as [`ServoError::OutOfRange`].
    pub fn absolute_setpoint(&mut self, angle: i32) -> Result<(), ServoError> {
        let clamped = angle.clamp(self.config.angle_min, self.config.angle_max);
        if clamped != angle {
            self.apply(clamped)?;
            self.published.overwrite(clamped);
            return Err(ServoError::OutOfRange {
                requested: angle,
                clamped,
            });
        }

        let target = self.policy_angle(angle);
        self.apply(target)?;
        self.published.overwrite(target);
        Ok(())
    }

    /// Halts the PWM output entirely (the servo goes limp).
    pub fn stop(&mut self) -> Result<(), ServoError> {
        self.pwm
            .set_duty_cycle_fully_off()
            .map_err(|e| ServoError::Pwm(e.kind()))
    }

    /// Last published angle.
    #[inline]
    pub fn angle(&self) -> i32 {
        self.published.peek()
    }

    /// Shared handle to the published angle.
    pub fn angle_mailbox(&self) -> Arc<Mailbox<i32>> {
        Arc::clone(&self.published)
    }

    /// The PWM channel.
    pub fn pwm(&self) -> &P {
        &self.pwm
    }

    /// Duty cycle (in channel ticks) for an in-range angle.
    pub fn duty_for(&self, angle: i32) -> u16 {
        let c = &self.config;
        let span = (c.angle_max - c.angle_min).max(1) as i64;
        let offset = (angle - c.angle_min).clamp(0, c.angle_max - c.angle_min) as i64;
        let duty_min = c.duty_min_permille as i64;
        let duty_max = c.duty_max_permille as i64;
        let permille = duty_min + (duty_max - duty_min) * offset / span;
        (self.pwm.max_duty_cycle() as i64 * permille / 1000) as u16
    }

    fn policy_angle(&self, angle: i32) -> i32 {
        match self.config.policy {
            DutyPolicy::Continuous => angle,
            DutyPolicy::Quantized { positions } => {
                let c = &self.config;
                let gaps = positions.max(2) as i32 - 1;
                let span = c.angle_max - c.angle_min;
                let offset = angle - c.angle_min;
                // Nearest of `positions` evenly spaced angles
                let index = (offset * gaps + span / 2) / span.max(1);
                c.angle_min + index * span / gaps
            }
        }
    }

    fn apply(&mut self, angle: i32) -> Result<(), ServoError> {
        let duty = self.duty_for(angle);
        self.pwm
            .set_duty_cycle(duty)
            .map_err(|e| ServoError::Pwm(e.kind()))
    }
}
