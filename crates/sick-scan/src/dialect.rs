//! Wire dialect selection
//!
//! The dialect is decided once, before the first session is constructed,
//! from the user's preference and the layer count of the scanner profile.
//! Devices with more than [`MAX_ASCII_LAYERS`] layers produce telegrams too
//! large for CoLa-A, so an ASCII request is overridden for them.

use std::fmt;

use serde::Serialize;
use sick_core::{ParameterRegistry, RegistryError};
use tracing::{info, warn};

use crate::profile::ScanParser;

/// Registry key holding the dialect preference
pub const USE_BINARY_PROTOCOL: &str = "use_binary_protocol";

/// Highest layer count that can be served over CoLa-A
pub const MAX_ASCII_LAYERS: u8 = 4;

/// CoLa wire dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dialect {
    /// CoLa-A, human readable
    Ascii,
    /// CoLa-B, compact binary
    Binary,
}

impl Dialect {
    pub fn from_binary_flag(binary: bool) -> Self {
        if binary {
            Self::Binary
        } else {
            Self::Ascii
        }
    }

    /// Dialect byte handed to the session constructor
    pub fn id(self) -> char {
        match self {
            Self::Ascii => 'A',
            Self::Binary => 'B',
        }
    }

    pub fn is_binary(self) -> bool {
        self == Self::Binary
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoLa-{}", self.id())
    }
}

/// Outcome of the dialect rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectDecision {
    /// What the user asked for
    pub requested: Dialect,
    /// What will be spoken
    pub dialect: Dialect,
    /// True if `dialect` differs from `requested`
    pub overridden: bool,
    /// Warning emitted when the request was overridden
    pub warning: Option<String>,
}

/// Apply the dialect rule to a preference and a layer count
pub fn select_dialect(preference: Dialect, layers: u8) -> DialectDecision {
    if preference == Dialect::Ascii && layers > MAX_ASCII_LAYERS {
        let message = format!(
            "ASCII communication requested, but the scanner has {layers} layers \
             (more than {MAX_ASCII_LAYERS}); switching to binary"
        );
        warn!(layers, max_ascii_layers = MAX_ASCII_LAYERS, "{message}");
        return DialectDecision {
            requested: preference,
            dialect: Dialect::Binary,
            overridden: true,
            warning: Some(message),
        };
    }
    DialectDecision {
        requested: preference,
        dialect: preference,
        overridden: false,
        warning: None,
    }
}

/// Decide the dialect for `parser` and publish it.
///
/// Reads `use_binary_protocol` (declared with default `true`), stores the
/// effective dialect in the parser and writes it back to the registry.
pub fn resolve_dialect(
    registry: &ParameterRegistry,
    parser: &mut ScanParser,
) -> Result<DialectDecision, RegistryError> {
    let binary = registry
        .declare(USE_BINARY_PROTOCOL, true)?
        .as_bool()
        .unwrap_or(true);

    let decision = select_dialect(Dialect::from_binary_flag(binary), parser.layers());
    parser.set_use_binary_protocol(decision.dialect.is_binary());
    registry.set(USE_BINARY_PROTOCOL, decision.dialect.is_binary())?;

    info!(
        scanner_type = parser.scanner_type(),
        dialect = %decision.dialect,
        overridden = decision.overridden,
        "Dialect selected"
    );
    Ok(decision)
}
