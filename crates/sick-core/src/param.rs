//! Typed parameter values
//!
//! Parameters are stored as a tagged variant instead of raw strings. A value
//! can be coerced into another declared type following a fixed set of rules
//! (see [`ParamValue::coerce`]).

use std::fmt;

use serde::Serialize;

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Bool,
    Int,
    Float,
    Double,
    String,
}

impl ParamType {
    /// Map a type name as written in a launch file to a parameter type.
    ///
    /// Unknown type names (including `str` and `string`) map to `String`.
    pub fn from_type_name(name: &str) -> Self {
        match name.trim() {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "double" => Self::Double,
            _ => Self::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
        }
    }

    /// Parse a raw string into a value of this type
    ///
    /// - `Bool`: true iff the first character is `1`, `t` or `T`
    /// - `Int`, `Float`, `Double`: numeric parse, `None` on failure
    /// - `String`: taken verbatim
    pub fn parse(self, raw: &str) -> Option<ParamValue> {
        match self {
            Self::Bool => Some(ParamValue::Bool(parse_bool(raw))),
            Self::Int => raw.trim().parse::<i32>().ok().map(ParamValue::Int),
            Self::Float => raw.trim().parse::<f32>().ok().map(ParamValue::Float),
            Self::Double => raw.trim().parse::<f64>().ok().map(ParamValue::Double),
            Self::String => Some(ParamValue::String(raw.to_string())),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean rule shared by launch files and string overrides
pub fn parse_bool(raw: &str) -> bool {
    matches!(raw.chars().next(), Some('1' | 't' | 'T'))
}

/// A typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Double(f64),
    String(String),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Bool(_) => ParamType::Bool,
            Self::Int(_) => ParamType::Int,
            Self::Float(_) => ParamType::Float,
            Self::Double(_) => ParamType::Double,
            Self::String(_) => ParamType::String,
        }
    }

    /// Convert this value into `target`, or `None` if no rule applies.
    ///
    /// Rules:
    /// - same type: unchanged
    /// - string source: parsed with [`ParamType::parse`]
    /// - any source to string: its display form
    /// - numeric widening/narrowing between int, float and double; a
    ///   floating value only becomes an int when it is integral and in range
    /// - bool and numbers never convert into each other
    pub fn coerce(self, target: ParamType) -> Option<ParamValue> {
        if self.param_type() == target {
            return Some(self);
        }
        match (self, target) {
            (Self::String(s), t) => t.parse(&s),
            (v, ParamType::String) => Some(Self::String(v.to_string())),
            (Self::Int(i), ParamType::Float) => Some(Self::Float(i as f32)),
            (Self::Int(i), ParamType::Double) => Some(Self::Double(i as f64)),
            (Self::Float(f), ParamType::Double) => Some(Self::Double(f as f64)),
            (Self::Double(d), ParamType::Float) => Some(Self::Float(d as f32)),
            (Self::Float(f), ParamType::Int) => integral_to_i32(f as f64),
            (Self::Double(d), ParamType::Int) => integral_to_i32(d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value as `f64` (ints and floats are converted)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f as f64),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

fn integral_to_i32(value: f64) -> Option<ParamValue> {
    if value.fract() == 0.0 && value >= i32::MIN as f64 && value <= i32::MAX as f64 {
        Some(ParamValue::Int(value as i32))
    } else {
        None
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(ParamType::from_type_name("bool"), ParamType::Bool);
        assert_eq!(ParamType::from_type_name("int"), ParamType::Int);
        assert_eq!(ParamType::from_type_name("float"), ParamType::Float);
        assert_eq!(ParamType::from_type_name("double"), ParamType::Double);
        assert_eq!(ParamType::from_type_name("str"), ParamType::String);
        assert_eq!(ParamType::from_type_name("whatever"), ParamType::String);
    }

    #[test]
    fn test_parse_bool_first_character() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("True"));
        assert!(parse_bool("t"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("yes"));
        assert!(!parse_bool(""));
        // Only the first character counts
        assert!(parse_bool("1garbage"));
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(ParamType::Int.parse("2112"), Some(ParamValue::Int(2112)));
        assert_eq!(ParamType::Int.parse(" -3 "), Some(ParamValue::Int(-3)));
        assert_eq!(ParamType::Int.parse("12.5"), None);
        assert_eq!(ParamType::Float.parse("0.05"), Some(ParamValue::Float(0.05)));
        assert_eq!(ParamType::Double.parse("abc"), None);
    }

    #[test]
    fn test_coerce_string_sources() {
        let v = ParamValue::from("true").coerce(ParamType::Bool);
        assert_eq!(v, Some(ParamValue::Bool(true)));

        let v = ParamValue::from("5").coerce(ParamType::Int);
        assert_eq!(v, Some(ParamValue::Int(5)));

        assert_eq!(ParamValue::from("five").coerce(ParamType::Int), None);
    }

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(
            ParamValue::Int(3).coerce(ParamType::Double),
            Some(ParamValue::Double(3.0))
        );
        assert_eq!(
            ParamValue::Double(4.0).coerce(ParamType::Int),
            Some(ParamValue::Int(4))
        );
        assert_eq!(ParamValue::Double(4.5).coerce(ParamType::Int), None);
        assert_eq!(ParamValue::Bool(true).coerce(ParamType::Int), None);
        assert_eq!(ParamValue::Int(1).coerce(ParamType::Bool), None);
    }

    #[test]
    fn test_coerce_to_string() {
        assert_eq!(
            ParamValue::Int(2112).coerce(ParamType::String),
            Some(ParamValue::from("2112"))
        );
        assert_eq!(
            ParamValue::Bool(false).coerce(ParamType::String),
            Some(ParamValue::from("false"))
        );
    }

    #[test]
    fn test_serialize_untagged() {
        let json = serde_json::to_value(ParamValue::Int(7)).unwrap();
        assert_eq!(json, serde_json::json!(7));
        let json = serde_json::to_value(ParamValue::from("cloud")).unwrap();
        assert_eq!(json, serde_json::json!("cloud"));
    }
}
