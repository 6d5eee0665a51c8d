//! Host runtime hooks

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

/// Process lifecycle hooks the controller drives
#[async_trait]
pub trait HostRuntime: Send + Sync {
    fn is_running(&self) -> bool;

    /// Handle pending host events once
    async fn service_events_once(&self);

    /// Ask the runtime to unwind; idempotent
    fn request_shutdown(&self);

    /// Wait for `duration`, returning early on shutdown
    async fn idle(&self, duration: Duration);
}

/// Default runtime: a running flag plus a shutdown notifier
#[derive(Debug)]
pub struct NodeRuntime {
    running: AtomicBool,
    shutdown: Notify,
}

impl Default for NodeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRuntime {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            shutdown: Notify::new(),
        }
    }

    /// Resolves once shutdown was requested
    pub async fn shutdown_requested(&self) {
        let notified = self.shutdown.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if !self.is_running() {
            return;
        }
        notified.await;
    }
}

#[async_trait]
impl HostRuntime for NodeRuntime {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn service_events_once(&self) {
        tokio::task::yield_now().await;
    }

    fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    async fn idle(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown_requested() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_shutdown_requested_wakes_on_request() {
        let runtime = NodeRuntime::new();
        let mut waiter = task::spawn(runtime.shutdown_requested());
        assert_pending!(waiter.poll());

        runtime.request_shutdown();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_idle_cut_short_by_shutdown() {
        let runtime = Arc::new(NodeRuntime::new());
        let waiter = {
            let runtime = runtime.clone();
            tokio::spawn(async move {
                let start = Instant::now();
                runtime.idle(Duration::from_secs(30)).await;
                start.elapsed()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        runtime.request_shutdown();

        let elapsed = waiter.await.unwrap();
        assert!(elapsed < Duration::from_secs(5));
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_idle_after_shutdown_returns() {
        let runtime = NodeRuntime::new();
        runtime.request_shutdown();
        runtime.request_shutdown();
        tokio::time::timeout(Duration::from_secs(1), runtime.idle(Duration::from_secs(30)))
            .await
            .unwrap();
    }
}
