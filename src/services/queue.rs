//! Bounded command queue feeding the coordinator.
//!
//! Two producers share it: the transport (raw frames through
//! [`CommandSender::deliver_line`]) and the encoder worker (built commands
//! through [`CommandSender::submit`]). The coordinator drains it in arrival
//! order.
//!
//! A full queue makes the producer wait for at most the configured submit
//! timeout, then fail with [`SubmitError::Timeout`].

use std::sync::Arc;
use std::time::Duration;

use log::warn;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::SendTimeoutError};

use crate::commands::{Command, StatusLine};
use crate::config::CoordinatorConfig;
use crate::traits::Transport;

/// One unit of work for the coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// Raw frame text from the transport.
    Line(String),
    /// Command built by the encoder worker.
    Command(Command),
}

/// Why a request was not queued.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The queue stayed full for the whole submit timeout.
    #[error("command queue full")]
    Timeout,
    /// The coordinator has shut down.
    #[error("coordinator stopped")]
    Closed,
}

/// Producer handle for the command queue. Cheap to clone.
#[derive(Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Request>,
    timeout: Option<Duration>,
    transport: Arc<dyn Transport>,
}

/// Creates the queue: the sender for producers, the receiver for the
/// coordinator.
pub fn command_queue(
    config: &CoordinatorConfig,
    transport: Arc<dyn Transport>,
) -> (CommandSender, mpsc::Receiver<Request>) {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let sender = CommandSender {
        tx,
        timeout: config.submit_timeout_ms.map(Duration::from_millis),
        transport,
    };
    (sender, rx)
}

impl CommandSender {
    /// Queues a request, waiting at most the submit timeout for space.
    pub async fn submit(&self, request: Request) -> Result<(), SubmitError> {
        match self.timeout {
            Some(limit) => self
                .tx
                .send_timeout(request, limit)
                .await
                .map_err(|e| match e {
                    SendTimeoutError::Timeout(_) => SubmitError::Timeout,
                    SendTimeoutError::Closed(_) => SubmitError::Closed,
                }),
            None => self.tx.send(request).await.map_err(|_| SubmitError::Closed),
        }
    }

    /// Line-delivery entry point for the transport.
    ///
    /// Line terminators are stripped. A line that cannot be queued is echoed
    /// back as `<text> - error`.
    pub async fn deliver_line(&self, text: &str) -> Result<(), SubmitError> {
        let line = text.trim_end_matches(|c: char| matches!(c, '\r' | '\n' | '\0'));
        let result = self.submit(Request::Line(line.to_string())).await;
        if let Err(e) = result {
            warn!("dropping frame {line:?}: {e}");
            self.transport
                .send(&StatusLine::Rejected(line.to_string()).to_string());
        }
        result
    }

    /// Free slots in the queue.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}
