//! Pipeline configuration shared by the firmware core and the host runtime.
//!
//! Every section has a `Default` matching the reference board (28BYJ-48
//! steppers behind ULN2003 drivers, a 50 Hz hobby servo, a KY-040 encoder)
//! and `with_*` builder methods for overrides.
//!
//! # Example
//!
//! ```rust
//! use stepper_servo_ctl::config::{MotionConfig, ServoConfig, StepperConfig};
//!
//! // Use defaults
//! let config = MotionConfig::default();
//! assert_eq!(config.stepper.steps_per_revolution, 4096);
//!
//! // Or customize
//! let config = MotionConfig::default()
//!     .with_stepper(StepperConfig::default().with_default_period_ms(5))
//!     .with_servo(ServoConfig::default().with_angle_range(-90, 90));
//! assert_eq!(config.servo.angle_min, -90);
//! ```

// ============================================================================
// Main Config
// ============================================================================

/// Complete pipeline configuration
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MotionConfig {
    /// Stepper engine configuration
    pub stepper: StepperConfig,
    /// Servo engine configuration
    pub servo: ServoConfig,
    /// Encoder decoder configuration
    pub encoder: EncoderConfig,
    /// Coordinator and queue configuration
    pub coordinator: CoordinatorConfig,
}

impl MotionConfig {
    /// Set stepper configuration
    pub fn with_stepper(mut self, stepper: StepperConfig) -> Self {
        self.stepper = stepper;
        self
    }

    /// Set servo configuration
    pub fn with_servo(mut self, servo: ServoConfig) -> Self {
        self.servo = servo;
        self
    }

    /// Set encoder configuration
    pub fn with_encoder(mut self, encoder: EncoderConfig) -> Self {
        self.encoder = encoder;
        self
    }

    /// Set coordinator configuration
    pub fn with_coordinator(mut self, coordinator: CoordinatorConfig) -> Self {
        self.coordinator = coordinator;
        self
    }
}

// ============================================================================
// Stepper Config
// ============================================================================

/// Stepper engine configuration
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StepperConfig {
    /// Half-steps per output shaft revolution
    pub steps_per_revolution: u32,
    /// Timer period every axis starts with (ms per half-step)
    pub default_period_ms: u32,
    /// Smallest period accepted by a speed change
    pub min_period_ms: u32,
    /// Largest period accepted by a speed change
    pub max_period_ms: u32,
    /// Drive all coil lines low when an axis goes idle
    pub release_on_idle: bool,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            steps_per_revolution: 4096,
            default_period_ms: 2,
            min_period_ms: 1,
            max_period_ms: 50,
            release_on_idle: false,
        }
    }
}

impl StepperConfig {
    /// Set steps per revolution (clamped to at least 1)
    pub fn with_steps_per_revolution(mut self, steps: u32) -> Self {
        self.steps_per_revolution = steps.max(1);
        self
    }

    /// Set the initial timer period
    pub fn with_default_period_ms(mut self, ms: u32) -> Self {
        self.default_period_ms = ms.max(1);
        self
    }

    /// Set the accepted speed-change period range
    pub fn with_period_range(mut self, min_ms: u32, max_ms: u32) -> Self {
        self.min_period_ms = min_ms.max(1);
        self.max_period_ms = max_ms.max(self.min_period_ms);
        self
    }

    /// Release the coils when a move completes
    pub fn with_release_on_idle(mut self, release: bool) -> Self {
        self.release_on_idle = release;
        self
    }

    /// Whether `period_ms` lies within the configured range
    pub fn period_in_range(&self, period_ms: u32) -> bool {
        (self.min_period_ms..=self.max_period_ms).contains(&period_ms)
    }
}

// ============================================================================
// Servo Config
// ============================================================================

/// How an in-range angle is turned into a duty cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DutyPolicy {
    /// Linear map of the exact angle onto the duty range.
    #[default]
    Continuous,
    /// Snap the angle to the nearest of `positions` evenly spaced angles
    /// across the range, then map linearly.
    Quantized {
        /// Number of reachable positions (at least 2)
        positions: u8,
    },
}

/// Servo engine configuration
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ServoConfig {
    /// Lowest reachable angle in degrees
    pub angle_min: i32,
    /// Highest reachable angle in degrees
    pub angle_max: i32,
    /// Duty cycle at `angle_min`, in thousandths of the PWM period
    pub duty_min_permille: u16,
    /// Duty cycle at `angle_max`, in thousandths of the PWM period
    pub duty_max_permille: u16,
    /// Angle to duty mapping policy
    pub policy: DutyPolicy,
}

impl Default for ServoConfig {
    fn default() -> Self {
        // 1 ms to 2 ms pulses on a 20 ms period
        Self {
            angle_min: 0,
            angle_max: 180,
            duty_min_permille: 50,
            duty_max_permille: 100,
            policy: DutyPolicy::Continuous,
        }
    }
}

impl ServoConfig {
    /// Set the reachable angle range (swapped if given in reverse)
    pub fn with_angle_range(mut self, min: i32, max: i32) -> Self {
        self.angle_min = min.min(max);
        self.angle_max = max.max(min);
        self
    }

    /// Set the duty range in thousandths of the PWM period
    pub fn with_duty_range_permille(mut self, min: u16, max: u16) -> Self {
        self.duty_min_permille = min.min(1000);
        self.duty_max_permille = max.min(1000);
        self
    }

    /// Set the mapping policy
    pub fn with_policy(mut self, policy: DutyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Midpoint of the angle range
    pub fn center_angle(&self) -> i32 {
        self.angle_min + (self.angle_max - self.angle_min) / 2
    }
}

// ============================================================================
// Encoder Config
// ============================================================================

/// Encoder decoder configuration
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EncoderConfig {
    /// Stepper move per detent, in degrees
    pub stepper_step_deg: u32,
    /// Servo setpoint change per detent, in degrees
    pub servo_step_deg: i32,
    /// Capacity of the deferred-work queue fed by the button interrupt
    pub deferred_queue_capacity: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            stepper_step_deg: 15,
            servo_step_deg: 10,
            deferred_queue_capacity: 10,
        }
    }
}

impl EncoderConfig {
    /// Set the stepper move per detent
    pub fn with_stepper_step_deg(mut self, deg: u32) -> Self {
        self.stepper_step_deg = deg;
        self
    }

    /// Set the servo increment per detent
    pub fn with_servo_step_deg(mut self, deg: i32) -> Self {
        self.servo_step_deg = deg;
        self
    }
}

// ============================================================================
// Coordinator Config
// ============================================================================

/// Coordinator and command queue configuration
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CoordinatorConfig {
    /// Command queue capacity
    pub queue_capacity: usize,
    /// How long a producer waits on a full queue (`None` = forever)
    pub submit_timeout_ms: Option<u64>,
    /// How long a move may take before `STPTMO` is reported (`None` = forever)
    pub completion_timeout_ms: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            submit_timeout_ms: Some(1000),
            completion_timeout_ms: None,
        }
    }
}

impl CoordinatorConfig {
    /// Set the command queue capacity (at least 1)
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the producer timeout on a full queue
    pub fn with_submit_timeout_ms(mut self, ms: Option<u64>) -> Self {
        self.submit_timeout_ms = ms;
        self
    }

    /// Set the completion wait bound
    pub fn with_completion_timeout_ms(mut self, ms: Option<u64>) -> Self {
        self.completion_timeout_ms = ms;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
