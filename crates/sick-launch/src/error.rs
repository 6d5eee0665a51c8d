//! Error types for launch parsing and parameter injection

use std::path::PathBuf;

use sick_core::{ParamType, RegistryError};
use thiserror::Error;

/// Errors raised while reading a launch description
#[derive(Debug, Error)]
pub enum LaunchError {
    /// File could not be read
    #[error("cannot read launch file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Structural problem in the launch description
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// Element is missing a mandatory attribute
    #[error("line {line}: <{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        line: usize,
        element: String,
        attribute: String,
    },

    /// `$(arg name)` refers to an argument that was never declared
    #[error("line {line}: unknown argument '{name}'")]
    UnknownArg { line: usize, name: String },
}

/// Result type for launch parsing
pub type LaunchResult<T> = Result<T, LaunchError>;

/// Errors raised by the configuration injector
///
/// Every variant is a configuration error: the node must not attempt any
/// device I/O after one of these.
#[derive(Debug, Error)]
pub enum InjectError {
    /// A launch file named on the command line failed to parse
    #[error("cannot parse launch file {path}: {source}")]
    LaunchParse {
        path: PathBuf,
        #[source]
        source: LaunchError,
    },

    /// A typed launch value does not parse as its declared type
    #[error("parameter '{tag}' declared as {ty} has invalid value '{raw}'")]
    InvalidValue {
        tag: String,
        ty: ParamType,
        raw: String,
    },

    /// Argument is neither a launch file nor a `tag:=value` assignment
    #[error("tag-value setting not valid, use pattern <tag>:=<value> (e.g. hostname:=192.168.0.4), check the entry: {0}")]
    MalformedAssignment(String),

    /// Registry refused the write
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
