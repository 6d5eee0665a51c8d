//! Node error types

use sick_core::{ExitCode, RegistryError};
use sick_launch::InjectError;
use sick_scan::ProfileError;
use thiserror::Error;

/// Errors that stop the node before or outside the lifecycle loop
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Inject(#[from] InjectError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    /// A recognized parameter holds a value outside its domain
    #[error("invalid value for parameter '{key}': {message}")]
    InvalidParameter { key: String, message: String },

    /// Scanner family handled by a different driver
    #[error("scanner type {0} is not supported by this node")]
    Unsupported(String),

    #[error("cannot start services: {0}")]
    Services(#[from] std::io::Error),
}

impl NodeError {
    /// Process exit code for this error
    ///
    /// Configuration problems are fatal; an unsupported device family is a
    /// plain error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            NodeError::Unsupported(_) => ExitCode::Error,
            _ => ExitCode::Fatal,
        }
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
