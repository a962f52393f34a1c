//! Mock implementations for testing without hardware.
//!
//! These test doubles let the whole pipeline run on a desktop. Mocks that
//! get moved into an engine (pins, drivers, displays) share their state
//! through an `Arc`, so a clone kept by the test sees every write.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockPin`] | [`OutputPin`] / [`InputPin`] | Shared pin level |
//! | [`RecordingDriver`] | [`StepperDriver`] | Records every coil pattern |
//! | [`MockPwm`] | [`SetDutyCycle`] | Tracks the last duty cycle |
//! | [`MockTransport`] | [`Transport`] | Captures outbound lines |
//! | [`MockDisplay`] | [`MotionDisplay`] | Captures rendered snapshots |
//!
//! # Example
//!
//! ```rust
//! use stepper_servo_ctl::hal::{RecordingDriver, Uln2003, MockPin};
//! use stepper_servo_ctl::traits::StepperDriver;
//!
//! let pins = [MockPin::new(), MockPin::new(), MockPin::new(), MockPin::new()];
//! let probe = pins.clone();
//! let mut driver = Uln2003::new(pins);
//!
//! driver.write_pattern([true, false, false, true]).unwrap();
//! assert!(probe[0].is_set_high());
//! assert!(!probe[1].is_set_high());
//! assert!(probe[3].is_set_high());
//! ```
//!
//! [`OutputPin`]: embedded_hal::digital::OutputPin
//! [`InputPin`]: embedded_hal::digital::InputPin
//! [`SetDutyCycle`]: embedded_hal::pwm::SetDutyCycle
//! [`StepperDriver`]: crate::traits::StepperDriver
//! [`Transport`]: crate::traits::Transport
//! [`MotionDisplay`]: crate::traits::MotionDisplay

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};

use crate::stepper::CoilPattern;
use crate::traits::{DisplaySnapshot, MotionDisplay, StepperDriver, Transport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Pins
// ============================================================================

/// Mock GPIO pin usable as input or output.
///
/// Clones share the same level.
#[derive(Clone, Debug, Default)]
pub struct MockPin {
    level: Arc<AtomicBool>,
}

impl MockPin {
    /// A pin driven low.
    pub fn new() -> Self {
        Self::default()
    }

    /// A pin driven high (e.g. a pulled-up input at rest).
    pub fn high() -> Self {
        let pin = Self::new();
        pin.set_level(true);
        pin
    }

    /// Forces the level, as an external signal would.
    pub fn set_level(&self, high: bool) {
        self.level.store(high, Ordering::SeqCst);
    }

    /// Current level.
    pub fn is_set_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

impl digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.set_level(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.set_level(true);
        Ok(())
    }
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.is_set_high())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.is_set_high())
    }
}

// ============================================================================
// Stepper Driver
// ============================================================================

/// Error returned by a [`RecordingDriver`] set to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockDriverError;

#[derive(Debug, Default)]
struct DriverLog {
    patterns: Vec<CoilPattern>,
    indicator: bool,
    fail: bool,
}

/// Stepper driver that records every pattern written.
///
/// # Example
///
/// ```rust
/// use stepper_servo_ctl::hal::RecordingDriver;
/// use stepper_servo_ctl::traits::StepperDriver;
///
/// let probe = RecordingDriver::new();
/// let mut driver = probe.clone();
/// driver.write_pattern([false, true, false, false]).unwrap();
/// driver.set_indicator(true).unwrap();
///
/// assert_eq!(probe.step_count(), 1);
/// assert!(probe.indicator());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RecordingDriver {
    log: Arc<Mutex<DriverLog>>,
}

impl RecordingDriver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pattern written, oldest first.
    pub fn patterns(&self) -> Vec<CoilPattern> {
        lock(&self.log).patterns.clone()
    }

    /// Number of patterns written.
    pub fn step_count(&self) -> usize {
        lock(&self.log).patterns.len()
    }

    /// Most recent pattern.
    pub fn last_pattern(&self) -> Option<CoilPattern> {
        lock(&self.log).patterns.last().copied()
    }

    /// Current indicator level.
    pub fn indicator(&self) -> bool {
        lock(&self.log).indicator
    }

    /// Makes subsequent writes fail (still recorded).
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.log).fail = fail;
    }
}

impl StepperDriver for RecordingDriver {
    type Error = MockDriverError;

    fn write_pattern(&mut self, pattern: CoilPattern) -> Result<(), MockDriverError> {
        let mut log = lock(&self.log);
        log.patterns.push(pattern);
        if log.fail {
            Err(MockDriverError)
        } else {
            Ok(())
        }
    }

    fn set_indicator(&mut self, on: bool) -> Result<(), MockDriverError> {
        lock(&self.log).indicator = on;
        Ok(())
    }
}

// ============================================================================
// PWM
// ============================================================================

/// Error returned by a [`MockPwm`] set to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockPwmError;

impl pwm::Error for MockPwmError {
    fn kind(&self) -> pwm::ErrorKind {
        pwm::ErrorKind::Other
    }
}

/// Mock PWM channel.
///
/// Use the public fields to inspect state after test operations.
#[derive(Debug, Default)]
pub struct MockPwm {
    /// Full-scale duty value.
    pub max_duty: u16,
    /// Last duty written.
    pub duty: u16,
    /// Whether the output is running.
    pub enabled: bool,
    /// Number of duty writes.
    pub writes: usize,
    /// Fail every write when set.
    pub fail: bool,
}

impl MockPwm {
    /// A stopped channel with `max_duty` resolution.
    pub fn new(max_duty: u16) -> Self {
        Self {
            max_duty,
            ..Self::default()
        }
    }
}

impl pwm::ErrorType for MockPwm {
    type Error = MockPwmError;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max_duty
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), MockPwmError> {
        if self.fail {
            return Err(MockPwmError);
        }
        self.duty = duty;
        self.enabled = true;
        self.writes += 1;
        Ok(())
    }

    fn set_duty_cycle_fully_off(&mut self) -> Result<(), MockPwmError> {
        if self.fail {
            return Err(MockPwmError);
        }
        self.duty = 0;
        self.enabled = false;
        Ok(())
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Transport that keeps every line sent.
#[derive(Debug, Default)]
pub struct MockTransport {
    lines: Mutex<Vec<String>>,
}

impl MockTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line sent so far.
    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }

    /// Returns and forgets every line sent so far.
    pub fn take_lines(&self) -> Vec<String> {
        std::mem::take(&mut *lock(&self.lines))
    }
}

impl Transport for MockTransport {
    fn send(&self, line: &str) {
        lock(&self.lines).push(line.to_string());
    }
}

// ============================================================================
// Display
// ============================================================================

/// Display that records every snapshot rendered.
#[derive(Clone, Debug, Default)]
pub struct MockDisplay {
    frames: Arc<Mutex<Vec<DisplaySnapshot>>>,
}

impl MockDisplay {
    /// Creates an empty display.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of renders.
    pub fn render_count(&self) -> usize {
        lock(&self.frames).len()
    }

    /// Most recent snapshot.
    pub fn last(&self) -> Option<DisplaySnapshot> {
        lock(&self.frames).last().cloned()
    }
}

impl MotionDisplay for MockDisplay {
    type Error = Infallible;

    fn render(&mut self, snapshot: &DisplaySnapshot) -> Result<(), Infallible> {
        lock(&self.frames).push(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_clones_share_level() {
        let probe = MockPin::new();
        let mut pin = probe.clone();
        pin.set_high().unwrap();
        assert!(probe.is_set_high());
        pin.set_low().unwrap();
        assert!(!probe.is_set_high());
    }

    #[test]
    fn driver_failure_still_records() {
        let probe = RecordingDriver::new();
        let mut driver = probe.clone();
        probe.fail_writes(true);
        assert!(driver.write_pattern([true; 4]).is_err());
        assert_eq!(probe.step_count(), 1);
    }

    #[test]
    fn transport_take_drains() {
        let transport = MockTransport::new();
        transport.send("SCT:BGN");
        assert_eq!(transport.take_lines(), vec!["SCT:BGN".to_string()]);
        assert!(transport.lines().is_empty());
    }

    #[test]
    fn pwm_off_disables() {
        let mut pwm = MockPwm::new(100);
        pwm.set_duty_cycle(10).unwrap();
        assert!(pwm.enabled);
        pwm.set_duty_cycle_fully_off().unwrap();
        assert!(!pwm.enabled);
        assert_eq!(pwm.writes, 1);
    }
}
