//! Coordinator: parse, validate, dispatch, wait, report.
//!
//! The coordinator is the single consumer of the command queue. For each
//! request it:
//!
//! 1. Parses raw frames ([`parse_frame`]) or checks built commands
//!    ([`validate`]). Malformed frames are echoed as `<text> - error` and
//!    dropped. Field errors are raised on the [`ErrorSignal`] and nothing is
//!    dispatched.
//! 2. Dispatches to the stepper or servo engine.
//! 3. For moves: sends `SCT:BGN`, waits until every started axis has set
//!    its completion bit, then sends `SCT:END`.
//! 4. Drains the error signal and sends one `AST:ERR:<CODE>` per flag.

use std::sync::Arc;
use std::time::Duration;

use embedded_hal::pwm::SetDutyCycle;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::commands::{Command, ErrorFlags, StatusLine};
use crate::config::MotionConfig;
use crate::parsing::{parse_frame, validate, FrameError, FrameLimits};
use crate::servo::{ServoEngine, ServoError};
use crate::traits::{StepperDriver, Transport};

use super::queue::Request;
use super::stepper::{StepperEngine, StepperError};
use super::sync::ErrorSignal;

/// Command consumer driving both engines.
pub struct Coordinator<D, P: SetDutyCycle> {
    stepper: Arc<StepperEngine<D>>,
    servo: ServoEngine<P>,
    transport: Arc<dyn Transport>,
    errors: Arc<ErrorSignal>,
    limits: FrameLimits,
    completion_timeout: Option<Duration>,
}

impl<D, P> Coordinator<D, P>
where
    D: StepperDriver + Send + 'static,
    P: SetDutyCycle,
{
    /// Wires the coordinator to its engines and transport.
    pub fn new(
        config: &MotionConfig,
        stepper: Arc<StepperEngine<D>>,
        servo: ServoEngine<P>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let limits = FrameLimits::from_config(stepper.axis_count(), &config.stepper);
        Self {
            stepper,
            servo,
            transport,
            errors: Arc::new(ErrorSignal::new()),
            limits,
            completion_timeout: config
                .coordinator
                .completion_timeout_ms
                .map(Duration::from_millis),
        }
    }

    /// Error signal drained after every command.
    pub fn errors(&self) -> &Arc<ErrorSignal> {
        &self.errors
    }

    /// The servo engine.
    pub fn servo(&self) -> &ServoEngine<P> {
        &self.servo
    }

    /// Processes requests until every sender is dropped.
    pub async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        info!("coordinator started with {} axes", self.limits.axis_count);
        while let Some(request) = requests.recv().await {
            self.process(request).await;
        }
        info!("coordinator stopped");
    }

    /// One full command cycle.
    pub async fn process(&mut self, request: Request) {
        if let Some(command) = self.accept(request) {
            self.dispatch(command).await;
        }
        self.report_errors();
    }

    fn accept(&self, request: Request) -> Option<Command> {
        match request {
            Request::Line(text) => match parse_frame(&text, &self.limits) {
                Ok(command) => Some(command),
                Err(FrameError::Invalid(flags)) => {
                    debug!("frame {text:?}: {flags:?}");
                    self.errors.raise(flags);
                    None
                }
                Err(e) => {
                    warn!("malformed frame {text:?}: {e}");
                    self.emit(StatusLine::Rejected(text));
                    None
                }
            },
            Request::Command(command) => {
                let flags = validate(&command, &self.limits);
                if flags.is_empty() {
                    Some(command)
                } else {
                    debug!("command {command:?}: {flags:?}");
                    self.errors.raise(flags);
                    None
                }
            }
        }
    }

    async fn dispatch(&mut self, command: Command) {
        debug!("dispatch {command:?}");
        match command {
            Command::StepperRelativeMove { .. } | Command::StepperGroupMove(_) => {
                self.run_move(&command).await;
            }
            Command::StepperSpeedChange { axis, period_ms } => {
                if let Err(e) = self.stepper.change_speed(axis, period_ms) {
                    self.errors.raise(stepper_flag(e));
                }
            }
            Command::ServoAbsoluteSetpoint { angle } => match self.servo.absolute_setpoint(angle) {
                Ok(()) => {}
                Err(ServoError::OutOfRange { requested, clamped }) => {
                    debug!("servo {requested} clamped to {clamped}");
                    self.errors.raise(ErrorFlags::SRV_ANG);
                }
                Err(e) => error!("servo: {e}"),
            },
        }
    }

    async fn run_move(&mut self, command: &Command) {
        let moves = command.moves();
        let completion = Arc::clone(self.stepper.completion());

        // Each started axis clears its own bit under its lock
        let mut waiting = 0;
        for m in &moves {
            match self.stepper.set_relative_setpoint(m.axis, m.steps, m.direction) {
                Ok(true) => waiting |= m.axis.completion_bit(),
                Ok(false) => {}
                Err(e) => self.errors.raise(stepper_flag(e)),
            }
        }

        self.emit(StatusLine::MotionBegin);
        if waiting == 0 {
            self.emit(StatusLine::MotionEnd);
            return;
        }

        match completion
            .wait_all_timeout(waiting, self.completion_timeout)
            .await
        {
            Some(_) => self.emit(StatusLine::MotionEnd),
            None => {
                warn!("move did not complete within {:?}", self.completion_timeout);
                self.errors.raise(ErrorFlags::STP_TMO);
            }
        }
    }

    fn report_errors(&self) {
        for line in self.errors.drain().diagnostics() {
            self.emit(line);
        }
    }

    fn emit(&self, line: StatusLine) {
        self.transport.send(&line.to_string());
    }
}

fn stepper_flag(error: StepperError) -> ErrorFlags {
    match error {
        StepperError::UnknownAxis(_) => ErrorFlags::STP_ID,
        StepperError::InvalidPeriod(_) => ErrorFlags::STP_VEL,
    }
}
