//! Assembles the whole pipeline on a tokio runtime.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use stepper_servo_ctl::config::MotionConfig;
//! use stepper_servo_ctl::hal::{MockDisplay, MockPwm, MockTransport, RecordingDriver};
//! use stepper_servo_ctl::services::MotionSystem;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(MockTransport::new());
//! let system = MotionSystem::start(
//!     &MotionConfig::default(),
//!     vec![RecordingDriver::new(), RecordingDriver::new()],
//!     MockPwm::new(1000),
//!     MockDisplay::new(),
//!     transport.clone(),
//! )?;
//!
//! system.sender().deliver_line(":X45").await?;
//! system.shutdown();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use embedded_hal::pwm::SetDutyCycle;
use log::info;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::commands::MAX_AXES;
use crate::config::MotionConfig;
use crate::encoder::CommandBuilder;
use crate::mailbox::Mailbox;
use crate::servo::{ServoEngine, ServoError};
use crate::traits::{MotionDisplay, StepperDriver, Transport};

use super::coordinator::Coordinator;
use super::display::{run_display, DisplayView};
use super::encoder::{run_deferred, EncoderInputs, EncoderWorker};
use super::queue::{command_queue, CommandSender};
use super::stepper::StepperEngine;
use super::sync::EventGroup;

/// Startup failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemError {
    /// At least one stepper axis is required.
    #[error("no stepper axes")]
    NoAxes,
    /// More axes than completion bits.
    #[error("{0} axes exceeds the maximum of {max}", max = MAX_AXES)]
    TooManyAxes(usize),
    /// The servo could not be centered.
    #[error("servo init failed: {0}")]
    Servo(#[from] ServoError),
}

/// Running pipeline and the handles external collaborators use.
pub struct MotionSystem<D> {
    sender: CommandSender,
    inputs: EncoderInputs,
    view: DisplayView<D>,
    stepper: Arc<StepperEngine<D>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<D> MotionSystem<D>
where
    D: StepperDriver + Send + 'static,
{
    /// Centers the servo and spawns every task on the current runtime:
    /// one timer task per axis, the coordinator, the encoder worker, the
    /// deferred service, and the display refresh.
    pub fn start<P, M>(
        config: &MotionConfig,
        drivers: Vec<D>,
        pwm: P,
        display: M,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SystemError>
    where
        P: SetDutyCycle + Send + 'static,
        M: MotionDisplay + Send + 'static,
    {
        let axis_count = drivers.len();
        if axis_count == 0 {
            return Err(SystemError::NoAxes);
        }
        if axis_count > MAX_AXES {
            return Err(SystemError::TooManyAxes(axis_count));
        }

        let mut servo = ServoEngine::new(pwm, config.servo.clone());
        servo.init()?;
        let servo_angle = servo.angle_mailbox();
        let selection = Arc::new(Mailbox::new(0usize));
        let refresh = Arc::new(Notify::new());

        let stepper = StepperEngine::new(drivers, &config.stepper, Arc::new(EventGroup::new()));
        let mut tasks = stepper.spawn();

        let (sender, requests) = command_queue(&config.coordinator, Arc::clone(&transport));
        let coordinator = Coordinator::new(config, Arc::clone(&stepper), servo, Arc::clone(&transport));
        tasks.push(tokio::spawn(coordinator.run(requests)));

        let (inputs, deferred) = EncoderInputs::new(config.encoder.deferred_queue_capacity);
        let worker = EncoderWorker::new(
            &inputs,
            Arc::clone(&selection),
            Arc::clone(&servo_angle),
            axis_count,
            CommandBuilder::new(config),
            sender.clone(),
        );
        tasks.push(tokio::spawn(worker.run()));
        tasks.push(tokio::spawn(run_deferred(
            deferred,
            Arc::clone(&selection),
            axis_count,
            Arc::clone(&refresh),
            transport,
        )));

        let view = DisplayView::new(Arc::clone(&stepper), selection, servo_angle);
        tasks.push(tokio::spawn(run_display(view.clone(), display, Arc::clone(&refresh))));
        // First frame
        refresh.notify_one();

        info!("motion system started: {axis_count} axes");
        Ok(Self {
            sender,
            inputs,
            view,
            stepper,
            tasks,
        })
    }

    /// Line-delivery handle for the transport (and any other producer).
    pub fn sender(&self) -> &CommandSender {
        &self.sender
    }

    /// Interrupt entry points for the encoder.
    pub fn encoder(&self) -> &EncoderInputs {
        &self.inputs
    }

    /// Read-only state for displays.
    pub fn view(&self) -> &DisplayView<D> {
        &self.view
    }

    /// The stepper engine.
    pub fn stepper(&self) -> &Arc<StepperEngine<D>> {
        &self.stepper
    }

    /// Aborts every task.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!("motion system stopped");
    }
}
