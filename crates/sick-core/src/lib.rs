//! sick-core: shared types for the SICK scanner node
//!
//! This crate holds the pieces every other crate depends on:
//! - [`ParameterRegistry`]: the process-wide typed parameter store
//! - [`ParamValue`] / [`ParamType`]: tagged parameter values and coercion
//! - [`ExitCode`]: process exit classification

pub mod error;
pub mod exit;
pub mod param;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use exit::ExitCode;
pub use param::{parse_bool, ParamType, ParamValue};
pub use registry::ParameterRegistry;
