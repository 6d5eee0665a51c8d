//! Developer switches passed as `__name:=<int>` tokens

use crate::assignment::split_tag_value;

/// Token tag enabling the internal debug configuration
pub const INTERNAL_DEBUG_TAG: &str = "__internalDebug";
/// Token tag enabling the emulated sensor
pub const EMUL_SENSOR_TAG: &str = "__emulSensor";

/// Switches read from the raw argument vector before injection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugFlags {
    /// Force the local debug host and topics
    pub internal_debug: bool,
    /// Default `emul_sensor` to on
    pub emul_sensor: bool,
}

impl DebugFlags {
    /// Scan `args` for the debug tokens
    ///
    /// A flag is on when its value starts with an integer greater than
    /// zero; trailing text after the number is ignored.
    pub fn scan<S: AsRef<str>>(args: &[S]) -> Self {
        let mut flags = Self::default();
        for token in args {
            let Some((tag, value)) = split_tag_value(token.as_ref()) else {
                continue;
            };
            let on = leading_int(value).is_some_and(|v| v > 0);
            match tag {
                INTERNAL_DEBUG_TAG => flags.internal_debug = on,
                EMUL_SENSOR_TAG => flags.emul_sensor = on,
                _ => {}
            }
        }
        flags
    }
}

fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let digits_start = usize::from(s.starts_with(['+', '-']));
    let len = s[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len() - digits_start);
    if len == 0 {
        return None;
    }
    s[..digits_start + len].parse().ok()
}
