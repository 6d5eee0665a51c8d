//! Error types for the parameter registry

use thiserror::Error;

use crate::param::ParamType;

/// Errors returned by registry writes and declarations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    /// A value cannot be coerced to the declared type of its key
    #[error("parameter '{key}' is declared as {expected}, cannot store {found} value '{value}'")]
    TypeMismatch {
        key: String,
        expected: ParamType,
        found: ParamType,
        value: String,
    },

    /// A key was declared a second time with a different type
    #[error("parameter '{key}' already declared as {declared}, cannot redeclare as {requested}")]
    Redeclared {
        key: String,
        declared: ParamType,
        requested: ParamType,
    },
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
