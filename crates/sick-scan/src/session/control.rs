//! Handles shared between a session and other tasks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, Notify};

use super::SessionError;

/// Depth of the command queue of a session
pub const COMMAND_QUEUE_DEPTH: usize = 16;

/// Request to stop data acquisition
///
/// Cloned out of the session so that the interrupt path can stop streaming
/// without touching the session itself.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionStop {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl AcquisitionStop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the session to stop acquisition; idempotent
    pub fn stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once [`stop`](Self::stop) has been called
    pub async fn stopped(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_requested() {
            return;
        }
        notified.await;
    }
}

/// A raw SOPAS command and the channel its reply goes to
#[derive(Debug)]
pub struct SopasRequest {
    pub command: String,
    pub reply: oneshot::Sender<Result<Bytes, SessionError>>,
}

/// Sending side of a session's command queue
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<SopasRequest>,
}

impl CommandSender {
    pub fn new(tx: mpsc::Sender<SopasRequest>) -> Self {
        Self { tx }
    }

    /// Create a connected sender/receiver pair
    pub fn channel() -> (Self, mpsc::Receiver<SopasRequest>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        (Self::new(tx), rx)
    }

    /// Send `command` and wait up to `timeout` for the device reply
    pub async fn request(&self, command: &str, timeout: Duration) -> Result<Bytes, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = SopasRequest {
            command: command.to_string(),
            reply: reply_tx,
        };
        self.tx
            .send(request)
            .await
            .map_err(|_| SessionError::Unavailable)?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SessionError::Unavailable),
            Err(_) => Err(SessionError::Timeout(format!("no reply to '{}'", command))),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
