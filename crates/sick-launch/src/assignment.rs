//! Launch assignments and `tag:=value` tokens

use sick_core::{ParamType, ParamValue};

use crate::error::InjectError;

/// Separator between tag and value on the command line
pub const ASSIGN_SEPARATOR: &str = ":=";

/// File name suffix that identifies a launch description
pub const LAUNCH_SUFFIX: &str = ".launch";

/// One `(tag, type, raw value)` triple from a launch file or command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchAssignment {
    pub tag: String,
    pub param_type: ParamType,
    pub raw: String,
}

impl LaunchAssignment {
    pub fn new(tag: impl Into<String>, param_type: ParamType, raw: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            param_type,
            raw: raw.into(),
        }
    }

    /// Coerce the raw value by its declared type.
    ///
    /// An empty raw value is kept as a string whatever the declared type.
    pub fn typed_value(&self) -> Result<ParamValue, InjectError> {
        if self.raw.is_empty() {
            return Ok(ParamValue::String(String::new()));
        }
        self.param_type
            .parse(&self.raw)
            .ok_or_else(|| InjectError::InvalidValue {
                tag: self.tag.clone(),
                ty: self.param_type,
                raw: self.raw.clone(),
            })
    }
}

/// Split `tag:=value` at the first separator
///
/// The value may itself contain `:=`; the tag may be empty.
pub fn split_tag_value(token: &str) -> Option<(&str, &str)> {
    token.split_once(ASSIGN_SEPARATOR)
}

/// True if the token names a launch file
///
/// A `tag:=value` token is never a launch file, even if its value ends with
/// the launch suffix.
pub fn is_launch_file(token: &str) -> bool {
    token.ends_with(LAUNCH_SUFFIX) && !token.contains(ASSIGN_SEPARATOR)
}
