//! ULN2003 Darlington array driving a unipolar stepper (e.g. 28BYJ-48).
//!
//! Each of the four inputs IN1..IN4 sinks one coil; a high GPIO energizes
//! that coil. An optional fifth GPIO lights a "moving" LED.
//!
//! # Wiring
//!
//! - IN1..IN4 → four push-pull outputs
//! - LED (optional) → output, active high

use embedded_hal::digital::{OutputPin, PinState};

use crate::stepper::CoilPattern;
use crate::traits::StepperDriver;

/// Four-line stepper driver over `embedded-hal` output pins.
///
/// # Example
///
/// ```ignore
/// use stepper_servo_ctl::hal::Uln2003;
///
/// let axis0 = Uln2003::new([in1, in2, in3, in4]).with_indicator(led);
/// ```
pub struct Uln2003<P: OutputPin> {
    lines: [P; 4],
    indicator: Option<P>,
}

impl<P: OutputPin> Uln2003<P> {
    /// Driver without an indicator line.
    pub fn new(lines: [P; 4]) -> Self {
        Self {
            lines,
            indicator: None,
        }
    }

    /// Adds an active-high indicator line.
    pub fn with_indicator(mut self, indicator: P) -> Self {
        self.indicator = Some(indicator);
        self
    }

    /// Gives the pins back.
    pub fn release(self) -> ([P; 4], Option<P>) {
        (self.lines, self.indicator)
    }
}

impl<P: OutputPin> StepperDriver for Uln2003<P> {
    type Error = P::Error;

    fn write_pattern(&mut self, pattern: CoilPattern) -> Result<(), P::Error> {
        for (pin, on) in self.lines.iter_mut().zip(pattern) {
            pin.set_state(PinState::from(on))?;
        }
        Ok(())
    }

    fn set_indicator(&mut self, on: bool) -> Result<(), P::Error> {
        match self.indicator.as_mut() {
            Some(pin) => pin.set_state(PinState::from(on)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockPin;
    use crate::stepper::COMMUTATION;

    fn pins() -> [MockPin; 4] {
        [MockPin::new(), MockPin::new(), MockPin::new(), MockPin::new()]
    }

    fn levels(pins: &[MockPin; 4]) -> CoilPattern {
        [
            pins[0].is_set_high(),
            pins[1].is_set_high(),
            pins[2].is_set_high(),
            pins[3].is_set_high(),
        ]
    }

    #[test]
    fn every_phase_reaches_the_pins() {
        let probe = pins();
        let mut driver = Uln2003::new(probe.clone());
        for pattern in COMMUTATION {
            driver.write_pattern(pattern).unwrap();
            assert_eq!(levels(&probe), pattern);
        }
    }

    #[test]
    fn indicator_is_optional() {
        let mut bare = Uln2003::new(pins());
        assert!(bare.set_indicator(true).is_ok());

        let led = MockPin::new();
        let mut driver = Uln2003::new(pins()).with_indicator(led.clone());
        driver.set_indicator(true).unwrap();
        assert!(led.is_set_high());
        driver.set_indicator(false).unwrap();
        assert!(!led.is_set_high());
    }
}
