//! Device sessions
//!
//! A session is the live connection to one scanner. The lifecycle
//! controller owns exactly one at a time and drives it through
//! [`DeviceSession::initialize`] and repeated [`DeviceSession::run_step`]
//! calls. Other tasks reach a session only through the handles it hands
//! out: an [`AcquisitionStop`] and a [`CommandSender`].

mod control;
mod emulated;
mod error;
mod tcp;

use std::time::Duration;

use async_trait::async_trait;
use sick_core::ParameterRegistry;
use tracing::info;

pub use control::{AcquisitionStop, CommandSender, SopasRequest, COMMAND_QUEUE_DEPTH};
pub use emulated::EmulatedSession;
pub use error::SessionError;
pub use tcp::TcpSession;

use crate::dialect::Dialect;
use crate::profile::SharedParser;

/// Registry key requesting a device IP address change
pub const NEW_IP_ADDRESS: &str = "new_IP_address";

/// Parameters a session is constructed from
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Scanner host name or address; mandatory unless emulating
    pub host: Option<String>,
    pub port: u16,
    /// Bound for every blocking network operation
    pub timeout: Duration,
    pub dialect: Dialect,
    /// Use the built-in emulated scanner instead of TCP
    pub emulate: bool,
}

/// Result of [`DeviceSession::initialize`]
#[derive(Debug, Clone, PartialEq)]
pub enum InitOutcome {
    /// Session is set up and streaming
    Ready,
    /// Transient failure; construct a fresh session and try again
    Retry(SessionError),
    /// Unrecoverable failure; do not retry
    Fatal(SessionError),
}

impl InitOutcome {
    /// Classify an error raised during initialization
    ///
    /// Device rejections and configuration problems are fatal, transport
    /// problems are retried.
    pub fn from_error(err: SessionError) -> Self {
        match err {
            SessionError::DeviceRejected { .. } | SessionError::InvalidConfig(_) => Self::Fatal(err),
            _ => Self::Retry(err),
        }
    }
}

/// Result of one acquisition step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Continue,
    Failed(SessionError),
}

/// Live connection to one scanner
#[async_trait]
pub trait DeviceSession: Send {
    /// Connect and configure the device
    async fn initialize(&mut self, registry: &ParameterRegistry) -> InitOutcome;

    /// Process one unit of work: a telegram, a queued command or a stop
    /// request
    async fn run_step(&mut self) -> StepOutcome;

    /// Handle that stops acquisition from another task
    fn acquisition_stop(&self) -> AcquisitionStop;

    /// Queue for raw SOPAS commands from other tasks
    fn commands(&self) -> CommandSender;

    fn dialect(&self) -> Dialect;

    /// Stop streaming and release the connection
    async fn close(&mut self);
}

/// Creates sessions for the lifecycle controller
pub trait SessionFactory: Send + Sync {
    fn construct(
        &self,
        config: &SessionConfig,
        parser: SharedParser,
    ) -> Result<Box<dyn DeviceSession>, SessionError>;
}

/// Builds a [`TcpSession`], or an [`EmulatedSession`] when emulating
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSessionFactory;

impl SessionFactory for DefaultSessionFactory {
    fn construct(
        &self,
        config: &SessionConfig,
        parser: SharedParser,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        if config.emulate {
            info!(dialect = %config.dialect, "Constructing emulated scanner session");
            return Ok(Box::new(EmulatedSession::new(config, parser)));
        }

        let host = config
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                SessionError::InvalidConfig(
                    "TCP is not switched on, hostname not set".to_string(),
                )
            })?;
        if config.port == 0 {
            return Err(SessionError::InvalidConfig("port not set".to_string()));
        }

        info!(host, port = config.port, dialect = %config.dialect, "Constructing TCP scanner session");
        Ok(Box::new(TcpSession::new(host, config, parser)))
    }
}
