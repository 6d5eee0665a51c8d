//! Shared state for the service handlers

use std::sync::Arc;
use std::time::{Duration, Instant};

use sick_core::ParameterRegistry;
use sick_scan::{CommandSender, Dialect, SharedParser};

/// Default time a `/cola` request waits for the device
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// State shared across all handlers
///
/// Built against one initialized session; the services are torn down
/// together with that session.
#[derive(Clone)]
pub struct ServiceState {
    pub commands: CommandSender,
    pub dialect: Dialect,
    pub registry: Arc<ParameterRegistry>,
    pub parser: SharedParser,
    pub request_timeout: Duration,
    started: Instant,
}

impl ServiceState {
    pub fn new(
        commands: CommandSender,
        dialect: Dialect,
        registry: Arc<ParameterRegistry>,
        parser: SharedParser,
    ) -> Self {
        Self {
            commands,
            dialect,
            registry,
            parser,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            started: Instant::now(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Time since the services were started
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}
