//! Encoder input decoder tasks.
//!
//! Interrupt shims call [`EncoderInputs::rotation_edge`] and
//! [`EncoderInputs::button_edge`]. Both return immediately: a rotation only
//! adds a unit to one of two counting signals, and a button press only
//! posts deferred work.
//!
//! Two tasks do the rest:
//!
//! - **Deferred service** ([`run_deferred`]): advances the menu selection,
//!   asks the display to refresh, and sends `MNU:STP<n>` / `MNU:SRV`.
//! - **Worker** ([`EncoderWorker::run`]): waits on whichever counting
//!   signal has a unit, consumes one, builds a command for the selected
//!   actuator, and submits it to the coordinator queue. Servo detents
//!   accumulate on a running target seeded from the published angle when
//!   the selection changes, so units queued faster than the coordinator
//!   applies them still count.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{mpsc, Notify};

use crate::commands::{Command, StatusLine};
use crate::encoder::{next_selection, CommandBuilder, MenuTarget, Rotation};
use crate::hal::EncoderSample;
use crate::mailbox::Mailbox;
use crate::traits::Transport;

use super::queue::{CommandSender, Request};
use super::sync::CountingSignal;

/// Work posted from interrupt context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deferred {
    /// The encoder button was pressed.
    ButtonPressed,
}

// ============================================================================
// Interrupt entry points
// ============================================================================

/// Interrupt-side handle. Cheap to clone.
#[derive(Clone)]
pub struct EncoderInputs {
    positive: Arc<CountingSignal>,
    negative: Arc<CountingSignal>,
    deferred: mpsc::Sender<Deferred>,
}

impl EncoderInputs {
    /// Handle plus the receiving end of the deferred-work queue.
    pub fn new(deferred_capacity: usize) -> (Self, mpsc::Receiver<Deferred>) {
        let (deferred, rx) = mpsc::channel(deferred_capacity.max(1));
        let inputs = Self {
            positive: Arc::new(CountingSignal::new()),
            negative: Arc::new(CountingSignal::new()),
            deferred,
        };
        (inputs, rx)
    }

    /// Clock edge: classify by the companion channel and count one unit.
    pub fn rotation_edge(&self, companion_high: bool) {
        match Rotation::from_companion(companion_high) {
            Rotation::Positive => self.positive.give(),
            Rotation::Negative => self.negative.give(),
        }
    }

    /// Button edge: post deferred work. A full queue drops the press.
    pub fn button_edge(&self) {
        if self.deferred.try_send(Deferred::ButtonPressed).is_err() {
            warn!("deferred queue full, button press dropped");
        }
    }

    /// Forwards one poll of a sampled encoder.
    pub fn feed(&self, sample: EncoderSample) {
        match sample.rotation {
            Some(Rotation::Positive) => self.positive.give(),
            Some(Rotation::Negative) => self.negative.give(),
            None => {}
        }
        if sample.pressed {
            self.button_edge();
        }
    }

    /// Positive-rotation units.
    pub fn positive(&self) -> &Arc<CountingSignal> {
        &self.positive
    }

    /// Negative-rotation units.
    pub fn negative(&self) -> &Arc<CountingSignal> {
        &self.negative
    }
}

// ============================================================================
// Deferred service
// ============================================================================

/// Runs deferred button work until every [`EncoderInputs`] is dropped.
pub async fn run_deferred(
    mut work: mpsc::Receiver<Deferred>,
    selection: Arc<Mailbox<usize>>,
    axis_count: usize,
    refresh: Arc<Notify>,
    transport: Arc<dyn Transport>,
) {
    while let Some(item) = work.recv().await {
        match item {
            Deferred::ButtonPressed => {
                let next = next_selection(selection.peek(), axis_count);
                selection.overwrite(next);
                refresh.notify_one();
                let target = MenuTarget::from_index(next, axis_count);
                debug!("menu -> {target:?}");
                transport.send(&StatusLine::Menu(target).to_string());
            }
        }
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Turns rotation units into commands.
pub struct EncoderWorker {
    positive: Arc<CountingSignal>,
    negative: Arc<CountingSignal>,
    selection: Arc<Mailbox<usize>>,
    servo_angle: Arc<Mailbox<i32>>,
    axis_count: usize,
    builder: CommandBuilder,
    sender: CommandSender,
    last_selection: Option<usize>,
    servo_target: Option<i32>,
}

impl EncoderWorker {
    /// Worker reading `inputs`' counters and the published mailboxes.
    pub fn new(
        inputs: &EncoderInputs,
        selection: Arc<Mailbox<usize>>,
        servo_angle: Arc<Mailbox<i32>>,
        axis_count: usize,
        builder: CommandBuilder,
        sender: CommandSender,
    ) -> Self {
        Self {
            positive: Arc::clone(&inputs.positive),
            negative: Arc::clone(&inputs.negative),
            selection,
            servo_angle,
            axis_count,
            builder,
            sender,
            last_selection: None,
            servo_target: None,
        }
    }

    /// Waits for the next rotation unit from either signal.
    async fn next_rotation(&self) -> Rotation {
        tokio::select! {
            _ = self.positive.take() => Rotation::Positive,
            _ = self.negative.take() => Rotation::Negative,
        }
    }

    /// Command for one unit against the current selection.
    fn command_for(&mut self, rotation: Rotation) -> Command {
        // Selection is read after waking so a press during the wait applies
        let index = self.selection.peek();
        if self.last_selection != Some(index) {
            self.last_selection = Some(index);
            self.servo_target = None;
        }

        match MenuTarget::from_index(index, self.axis_count) {
            MenuTarget::Servo => {
                let from = match self.servo_target {
                    Some(angle) => angle,
                    None => self.servo_angle.peek(),
                };
                let angle = self.builder.servo_target(rotation, from);
                self.servo_target = Some(angle);
                Command::ServoAbsoluteSetpoint { angle }
            }
            target => self.builder.build(target, rotation, 0),
        }
    }

    /// Processes rotation units forever.
    pub async fn run(mut self) {
        loop {
            let rotation = self.next_rotation().await;
            let command = self.command_for(rotation);
            debug!("encoder {rotation:?} -> {command:?}");
            if let Err(e) = self.sender.submit(Request::Command(command)).await {
                warn!("encoder command dropped: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoordinatorConfig, MotionConfig};
    use crate::hal::MockTransport;
    use crate::services::queue::command_queue;
    use crate::{AxisId, Direction};

    #[test]
    fn rotation_edges_count_by_companion_level() {
        let (inputs, _rx) = EncoderInputs::new(4);
        inputs.rotation_edge(true);
        inputs.rotation_edge(true);
        inputs.rotation_edge(false);
        assert_eq!(inputs.positive().available(), 2);
        assert_eq!(inputs.negative().available(), 1);
    }

    #[test]
    fn button_overflow_is_dropped_not_blocking() {
        let (inputs, _rx) = EncoderInputs::new(1);
        inputs.button_edge();
        inputs.button_edge();
    }

    #[tokio::test]
    async fn button_advances_menu_and_announces() {
        let (inputs, rx) = EncoderInputs::new(4);
        let selection = Arc::new(Mailbox::new(0usize));
        let refresh = Arc::new(Notify::new());
        let transport = Arc::new(MockTransport::new());

        inputs.button_edge();
        inputs.button_edge();
        inputs.button_edge();
        drop(inputs);

        run_deferred(rx, selection.clone(), 2, refresh.clone(), transport.clone()).await;

        assert_eq!(selection.peek(), 0);
        assert_eq!(transport.lines(), ["MNU:STP1", "MNU:SRV", "MNU:STP0"]);
        // A stored permit means a refresh was requested
        refresh.notified().await;
    }

    #[tokio::test]
    async fn worker_builds_commands_for_selection() {
        let transport = Arc::new(MockTransport::new());
        let (sender, mut queue) = command_queue(&CoordinatorConfig::default(), transport);
        let (inputs, _rx) = EncoderInputs::new(4);
        let selection = Arc::new(Mailbox::new(1usize));
        let servo_angle = Arc::new(Mailbox::new(90i32));
        let worker = EncoderWorker::new(
            &inputs,
            selection.clone(),
            servo_angle,
            2,
            CommandBuilder::new(&MotionConfig::default()),
            sender,
        );
        let task = tokio::spawn(worker.run());

        inputs.rotation_edge(false);
        assert_eq!(
            queue.recv().await,
            Some(Request::Command(Command::relative_move(
                AxisId(1),
                Direction::Backward,
                170
            )))
        );

        selection.overwrite(2);
        inputs.rotation_edge(true);
        assert_eq!(
            queue.recv().await,
            Some(Request::Command(Command::ServoAbsoluteSetpoint { angle: 100 }))
        );
        task.abort();
    }

    #[tokio::test]
    async fn rapid_servo_detents_accumulate() {
        let transport = Arc::new(MockTransport::new());
        let (sender, mut queue) = command_queue(&CoordinatorConfig::default(), transport);
        let (inputs, _rx) = EncoderInputs::new(4);
        let selection = Arc::new(Mailbox::new(2usize));
        let servo_angle = Arc::new(Mailbox::new(90i32));
        let worker = EncoderWorker::new(
            &inputs,
            selection,
            servo_angle.clone(),
            2,
            CommandBuilder::new(&MotionConfig::default()),
            sender,
        );
        let task = tokio::spawn(worker.run());

        // Nothing applies the commands, so the published angle stays at 90
        for _ in 0..3 {
            inputs.rotation_edge(false);
        }
        for expected in [80, 70, 60] {
            assert_eq!(
                queue.recv().await,
                Some(Request::Command(Command::ServoAbsoluteSetpoint { angle: expected }))
            );
        }
        assert_eq!(servo_angle.peek(), 90);
        task.abort();
    }

    #[tokio::test]
    async fn servo_target_stops_at_range_end() {
        let transport = Arc::new(MockTransport::new());
        let (sender, mut queue) = command_queue(&CoordinatorConfig::default(), transport);
        let (inputs, _rx) = EncoderInputs::new(4);
        let worker = EncoderWorker::new(
            &inputs,
            Arc::new(Mailbox::new(1usize)),
            Arc::new(Mailbox::new(165i32)),
            1,
            CommandBuilder::new(&MotionConfig::default()),
            sender,
        );
        let task = tokio::spawn(worker.run());

        for _ in 0..3 {
            inputs.rotation_edge(true);
        }
        for expected in [175, 180, 180] {
            assert_eq!(
                queue.recv().await,
                Some(Request::Command(Command::ServoAbsoluteSetpoint { angle: expected }))
            );
        }
        task.abort();
    }
}
