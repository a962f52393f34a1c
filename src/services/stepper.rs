//! Stepper motion engine: one periodic timer task per axis.
//!
//! The engine owns an arena of axes indexed by [`AxisId`]. Each axis has
//! its own [`AxisState`], driver, and timer period. While an axis is
//! ACTIVE its task ticks every `period_ms`; each tick runs
//! [`AxisState::tick`] under the axis lock and writes the resulting coil
//! pattern. The tick never awaits.
//!
//! When a move runs out of steps the axis goes IDLE and sets its bit
//! ([`AxisId::completion_bit`]) in the shared completion [`EventGroup`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use stepper_servo_ctl::config::StepperConfig;
//! use stepper_servo_ctl::hal::RecordingDriver;
//! use stepper_servo_ctl::services::{EventGroup, StepperEngine};
//! use stepper_servo_ctl::{AxisId, Direction};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let completion = Arc::new(EventGroup::new());
//! let probe = RecordingDriver::new();
//! let engine = StepperEngine::new(vec![probe.clone()], &StepperConfig::default(), completion.clone());
//! let _tasks = engine.spawn();
//!
//! engine.set_relative_setpoint(AxisId(0), 8, Direction::Forward).unwrap();
//! completion.wait_all(AxisId(0).completion_bit()).await;
//! assert_eq!(probe.step_count(), 8);
//! # }
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, error};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::commands::AxisId;
use crate::config::StepperConfig;
use crate::stepper::{AxisState, TickOutcome, RELEASED};
use crate::traits::{Direction, StepperDriver};

use super::sync::EventGroup;

/// Stepper engine request errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperError {
    /// No axis with this index.
    #[error("unknown axis {0}")]
    UnknownAxis(AxisId),
    /// Timer period of zero.
    #[error("invalid timer period {0} ms")]
    InvalidPeriod(u32),
}

struct AxisCell<D> {
    state: AxisState,
    driver: D,
}

struct Axis<D> {
    id: AxisId,
    cell: Mutex<AxisCell<D>>,
    period_ms: AtomicU32,
    wake: Notify,
}

impl<D> Axis<D> {
    fn lock(&self) -> MutexGuard<'_, AxisCell<D>> {
        self.cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.load(Ordering::Acquire) as u64)
    }
}

/// Multi-axis stepper engine.
pub struct StepperEngine<D> {
    axes: Vec<Axis<D>>,
    completion: Arc<EventGroup>,
    steps_per_revolution: u32,
    release_on_idle: bool,
}

impl<D> StepperEngine<D>
where
    D: StepperDriver + Send + 'static,
{
    /// Builds one axis per driver, all IDLE at phase 0 with the default
    /// period. Axes beyond the completion group's width are dropped.
    pub fn new(drivers: Vec<D>, config: &StepperConfig, completion: Arc<EventGroup>) -> Arc<Self> {
        let axes = drivers
            .into_iter()
            .take(crate::commands::MAX_AXES)
            .enumerate()
            .map(|(i, driver)| Axis {
                id: AxisId(i as u8),
                cell: Mutex::new(AxisCell {
                    state: AxisState::new(),
                    driver,
                }),
                period_ms: AtomicU32::new(config.default_period_ms.max(1)),
                wake: Notify::new(),
            })
            .collect();

        Arc::new(Self {
            axes,
            completion,
            steps_per_revolution: config.steps_per_revolution,
            release_on_idle: config.release_on_idle,
        })
    }

    /// Spawns the timer task of every axis on the current runtime.
    pub fn spawn(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        (0..self.axes.len())
            .map(|index| tokio::spawn(Arc::clone(self).run_axis(index)))
            .collect()
    }

    /// Number of axes.
    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    /// Shared completion group.
    pub fn completion(&self) -> &Arc<EventGroup> {
        &self.completion
    }

    fn axis(&self, axis: AxisId) -> Result<&Axis<D>, StepperError> {
        self.axes
            .get(axis.index())
            .ok_or(StepperError::UnknownAxis(axis))
    }

    /// Loads a relative move and starts the axis timer.
    ///
    /// Returns `Ok(false)` for a zero-step request, which changes nothing.
    /// A request on an ACTIVE axis replaces its in-flight target. A started
    /// move clears the axis completion bit under the axis lock, so a bit
    /// left over from an earlier move can never stand for this one.
    pub fn set_relative_setpoint(
        &self,
        axis: AxisId,
        steps: u32,
        direction: Direction,
    ) -> Result<bool, StepperError> {
        let slot = self.axis(axis)?;
        let started = {
            let mut cell = slot.lock();
            let started = cell.state.set_setpoint(steps, direction);
            if started {
                self.completion.clear(axis.completion_bit());
                if let Err(e) = cell.driver.set_indicator(true) {
                    error!("axis {axis}: indicator write failed: {e:?}");
                }
            }
            started
        };
        if started {
            debug!("axis {axis}: {steps} steps {direction:?}");
            slot.wake.notify_one();
        }
        Ok(started)
    }

    /// Changes the timer period without touching phase or pending steps.
    pub fn change_speed(&self, axis: AxisId, period_ms: u32) -> Result<(), StepperError> {
        if period_ms == 0 {
            return Err(StepperError::InvalidPeriod(period_ms));
        }
        self.axis(axis)?.period_ms.store(period_ms, Ordering::Release);
        debug!("axis {axis}: period {period_ms} ms");
        Ok(())
    }

    /// Current timer period.
    pub fn period_ms(&self, axis: AxisId) -> Result<u32, StepperError> {
        Ok(self.axis(axis)?.period_ms.load(Ordering::Acquire))
    }

    /// Remaining travel in whole degrees: `pending * 360 / steps_per_rev`.
    pub fn pending_angle(&self, axis: AxisId) -> Result<u32, StepperError> {
        let slot = self.axis(axis)?;
        let cell = slot.lock();
        Ok(cell.state.pending_angle(self.steps_per_revolution))
    }

    /// Remaining half-steps.
    pub fn pending_steps(&self, axis: AxisId) -> Result<u32, StepperError> {
        Ok(self.axis(axis)?.lock().state.pending_steps())
    }

    /// Current commutation phase index.
    pub fn phase(&self, axis: AxisId) -> Result<u8, StepperError> {
        Ok(self.axis(axis)?.lock().state.phase().index())
    }

    /// Whether the axis timer is running.
    pub fn is_active(&self, axis: AxisId) -> Result<bool, StepperError> {
        Ok(self.axis(axis)?.lock().state.is_active())
    }

    /// One timer callback for `index`.
    fn tick(&self, index: usize) -> TickOutcome {
        let axis = &self.axes[index];
        let mut cell = axis.lock();
        let outcome = cell.state.tick();
        match outcome {
            TickOutcome::Stepped(pattern) => {
                // The step is counted even if the write fails
                if let Err(e) = cell.driver.write_pattern(pattern) {
                    error!("axis {}: coil write failed: {e:?}", axis.id);
                }
            }
            TickOutcome::Completed => {
                if self.release_on_idle {
                    if let Err(e) = cell.driver.write_pattern(RELEASED) {
                        error!("axis {}: coil release failed: {e:?}", axis.id);
                    }
                }
                if let Err(e) = cell.driver.set_indicator(false) {
                    error!("axis {}: indicator write failed: {e:?}", axis.id);
                }
                // Set under the lock: a new setpoint cannot slip in between
                self.completion.set(axis.id.completion_bit());
                drop(cell);
                debug!("axis {}: complete", axis.id);
            }
            TickOutcome::Idle => {}
        }
        outcome
    }

    async fn run_axis(self: Arc<Self>, index: usize) {
        let axis = &self.axes[index];
        loop {
            axis.wake.notified().await;

            let mut period = axis.period();
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !matches!(self.tick(index), TickOutcome::Stepped(_)) {
                    break;
                }
                let current = axis.period();
                if current != period {
                    period = current;
                    ticker = time::interval_at(Instant::now() + period, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                }
            }
        }
    }
}
