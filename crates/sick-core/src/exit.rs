//! Process exit classification

use std::fmt;

/// How the node terminated
///
/// `Fatal` differs from `Error` in that it forecloses any retry: it is
/// reported for configuration problems and for failures the device session
/// flags as unrecoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitCode {
    Success,
    Error,
    Fatal,
}

impl ExitCode {
    /// Numeric process exit code
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Error => 1,
            Self::Fatal => 2,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Fatal => "fatal",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::Error.code(), 1);
        assert_eq!(ExitCode::Fatal.code(), 2);
        assert!(ExitCode::Success.is_success());
        assert!(!ExitCode::Fatal.is_success());
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::Fatal.to_string(), "fatal (2)");
    }
}
