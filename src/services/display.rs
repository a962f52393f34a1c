//! Read-only view for displays and the refresh task.

use std::sync::Arc;

use heapless::Vec;
use log::warn;
use tokio::sync::Notify;

use crate::commands::AxisId;
use crate::encoder::MenuTarget;
use crate::mailbox::Mailbox;
use crate::traits::{DisplaySnapshot, MotionDisplay, StepperDriver};

use super::stepper::StepperEngine;

/// Peeks at the published state without affecting it.
pub struct DisplayView<D> {
    stepper: Arc<StepperEngine<D>>,
    selection: Arc<Mailbox<usize>>,
    servo_angle: Arc<Mailbox<i32>>,
}

impl<D> Clone for DisplayView<D> {
    fn clone(&self) -> Self {
        Self {
            stepper: Arc::clone(&self.stepper),
            selection: Arc::clone(&self.selection),
            servo_angle: Arc::clone(&self.servo_angle),
        }
    }
}

impl<D> DisplayView<D>
where
    D: StepperDriver + Send + 'static,
{
    /// View over the given engine and mailboxes.
    pub fn new(
        stepper: Arc<StepperEngine<D>>,
        selection: Arc<Mailbox<usize>>,
        servo_angle: Arc<Mailbox<i32>>,
    ) -> Self {
        Self {
            stepper,
            selection,
            servo_angle,
        }
    }

    /// Actuator the encoder drives.
    pub fn selection(&self) -> MenuTarget {
        MenuTarget::from_index(self.selection.peek(), self.stepper.axis_count())
    }

    /// Last published servo angle.
    pub fn servo_angle(&self) -> i32 {
        self.servo_angle.peek()
    }

    /// Remaining travel of `axis` in degrees, `None` for an unknown axis.
    pub fn pending_angle(&self, axis: AxisId) -> Option<u32> {
        self.stepper.pending_angle(axis).ok()
    }

    /// Everything at once.
    pub fn snapshot(&self) -> DisplaySnapshot {
        let mut pending_angles = Vec::new();
        for index in 0..self.stepper.axis_count() {
            let angle = self.pending_angle(AxisId(index as u8)).unwrap_or(0);
            // The engine never holds more than MAX_AXES axes
            let _ = pending_angles.push(angle);
        }
        DisplaySnapshot {
            selection: self.selection(),
            servo_angle: self.servo_angle(),
            pending_angles,
        }
    }
}

/// Renders a snapshot on every refresh request.
pub async fn run_display<D, M>(view: DisplayView<D>, mut display: M, refresh: Arc<Notify>)
where
    D: StepperDriver + Send + 'static,
    M: MotionDisplay,
{
    loop {
        refresh.notified().await;
        if let Err(e) = display.render(&view.snapshot()) {
            warn!("display render failed: {e:?}");
        }
    }
}
