//! KY-040 rotary encoder sampled over `embedded-hal` input pins.
//!
//! For boards without edge interrupts on the encoder pins. Call
//! [`poll`](Ky040::poll) every few milliseconds and forward the result to
//! the encoder inputs.
//!
//! # Wiring
//!
//! - CLK (A) → input with pull-up
//! - DT (B) → input with pull-up
//! - SW → input with pull-up (active low)

use embedded_hal::digital::InputPin;

use crate::encoder::{QuadratureDecoder, Rotation};

/// What one poll observed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncoderSample {
    /// Detent seen since the previous poll.
    pub rotation: Option<Rotation>,
    /// Button went from released to pressed.
    pub pressed: bool,
}

/// Polled KY-040 encoder.
pub struct Ky040<CLK, DT, SW> {
    clk: CLK,
    dt: DT,
    sw: SW,
    decoder: QuadratureDecoder,
    button_last: bool,
}

impl<CLK, DT, SW, E> Ky040<CLK, DT, SW>
where
    CLK: InputPin<Error = E>,
    DT: InputPin<Error = E>,
    SW: InputPin<Error = E>,
{
    /// Takes the three inputs and latches the current levels.
    pub fn new(mut clk: CLK, dt: DT, mut sw: SW) -> Result<Self, E> {
        let clock_high = clk.is_high()?;
        let button_last = sw.is_low()?;
        Ok(Self {
            clk,
            dt,
            sw,
            decoder: QuadratureDecoder::new(clock_high),
            button_last,
        })
    }

    /// Samples all three pins once.
    pub fn poll(&mut self) -> Result<EncoderSample, E> {
        let clock_high = self.clk.is_high()?;
        let companion_high = self.dt.is_high()?;
        let rotation = self.decoder.update(clock_high, companion_high);

        let button = self.sw.is_low()?;
        let pressed = button && !self.button_last;
        self.button_last = button;

        Ok(EncoderSample { rotation, pressed })
    }
}
