//! Launch description parser
//!
//! Understands the subset of the ROS launch XML format used to configure
//! scanner nodes:
//!
//! ```xml
//! <launch>
//!   <arg name="hostname" default="192.168.0.1"/>
//!   <node name="sick_tim_5xx" pkg="sick_scan" type="sick_generic_caller">
//!     <param name="scanner_type" type="string" value="sick_tim_5xx"/>
//!     <param name="hostname" type="string" value="$(arg hostname)"/>
//!   </node>
//! </launch>
//! ```
//!
//! `arg` elements define substitution variables (a `name:=value` command
//! line token overrides an arg's default, never its fixed `value`), `param`
//! elements produce assignments in document order. Other elements are
//! walked through but otherwise ignored.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use sick_core::ParamType;
use tracing::debug;

use crate::assignment::LaunchAssignment;
use crate::error::{LaunchError, LaunchResult};

/// Source of launch assignments
pub trait LaunchParser: Send + Sync {
    /// Parse the file at `path`.
    ///
    /// `overrides` holds the command line `tag:=value` pairs; they take
    /// precedence over `arg` defaults.
    fn parse_file(
        &self,
        path: &Path,
        overrides: &HashMap<String, String>,
    ) -> LaunchResult<Vec<LaunchAssignment>>;
}

/// Built-in XML launch parser
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlLaunchParser;

impl XmlLaunchParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse launch XML from a string
    pub fn parse_str(
        &self,
        content: &str,
        overrides: &HashMap<String, String>,
    ) -> LaunchResult<Vec<LaunchAssignment>> {
        let mut args: HashMap<String, String> = HashMap::new();
        let mut assignments = Vec::new();
        let mut pos = 0;

        while let Some(rel) = content[pos..].find('<') {
            let start = pos + rel;
            let line = line_at(content, start);
            let tail = &content[start..];

            if tail.starts_with("<!--") {
                let end = tail
                    .find("-->")
                    .ok_or_else(|| syntax(line, "unterminated comment"))?;
                pos = start + end + 3;
                continue;
            }

            let end = find_tag_end(tail).ok_or_else(|| syntax(line, "unterminated tag"))?;
            let inner = &tail[1..end];
            pos = start + end + 1;

            // Declarations, doctype and closing tags carry no data
            if inner.starts_with(['?', '!', '/']) {
                continue;
            }
            let inner = inner.strip_suffix('/').unwrap_or(inner);
            let (element, rest) = match inner.find(char::is_whitespace) {
                Some(i) => (&inner[..i], &inner[i..]),
                None => (inner, ""),
            };

            match element {
                "arg" => {
                    let attrs = parse_attributes(rest, line)?;
                    let name = require(&attrs, "arg", "name", line)?;
                    let value = if let Some(fixed) = attrs.get("value") {
                        Some(substitute(fixed, &args, line)?)
                    } else if let Some(given) = overrides.get(name) {
                        Some(given.clone())
                    } else if let Some(default) = attrs.get("default") {
                        Some(substitute(default, &args, line)?)
                    } else {
                        None
                    };
                    if let Some(value) = value {
                        args.insert(name.to_string(), value);
                    }
                }
                "param" => {
                    let attrs = parse_attributes(rest, line)?;
                    let name = require(&attrs, "param", "name", line)?;
                    let param_type = attrs
                        .get("type")
                        .map(|t| ParamType::from_type_name(t))
                        .unwrap_or(ParamType::String);
                    let raw = match attrs.get("value") {
                        Some(v) => substitute(v, &args, line)?,
                        None => String::new(),
                    };
                    assignments.push(LaunchAssignment::new(name, param_type, raw));
                }
                _ => {}
            }
        }

        debug!(count = assignments.len(), "Parsed launch description");
        Ok(assignments)
    }
}

impl LaunchParser for XmlLaunchParser {
    fn parse_file(
        &self,
        path: &Path,
        overrides: &HashMap<String, String>,
    ) -> LaunchResult<Vec<LaunchAssignment>> {
        let content = fs::read_to_string(path).map_err(|source| LaunchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&content, overrides)
    }
}

fn syntax(line: usize, message: impl Into<String>) -> LaunchError {
    LaunchError::Syntax {
        line,
        message: message.into(),
    }
}

fn line_at(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

/// Index of the `>` closing the tag that starts `tail`, skipping quoted text
fn find_tag_end(tail: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in tail.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            (None, _) => {}
        }
    }
    None
}

fn parse_attributes(mut s: &str, line: usize) -> LaunchResult<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    loop {
        s = s.trim_start();
        if s.is_empty() {
            return Ok(attrs);
        }
        let eq = s
            .find('=')
            .ok_or_else(|| syntax(line, format!("attribute without value near '{}'", s)))?;
        let name = s[..eq].trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(syntax(line, format!("malformed attribute near '{}'", s)));
        }
        s = s[eq + 1..].trim_start();
        let quote = s
            .chars()
            .next()
            .filter(|c| *c == '"' || *c == '\'')
            .ok_or_else(|| syntax(line, format!("unquoted value for attribute '{}'", name)))?;
        let body = &s[1..];
        let close = body
            .find(quote)
            .ok_or_else(|| syntax(line, format!("unterminated value for attribute '{}'", name)))?;
        attrs.insert(name.to_string(), unescape(&body[..close]));
        s = &body[close + 1..];
    }
}

fn require<'a>(
    attrs: &'a HashMap<String, String>,
    element: &str,
    attribute: &str,
    line: usize,
) -> LaunchResult<&'a str> {
    attrs
        .get(attribute)
        .map(String::as_str)
        .ok_or_else(|| LaunchError::MissingAttribute {
            line,
            element: element.to_string(),
            attribute: attribute.to_string(),
        })
}

fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Expand `$(arg name)`; other substitutions are kept verbatim
fn substitute(value: &str, args: &HashMap<String, String>, line: usize) -> LaunchResult<String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("$(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find(')')
            .ok_or_else(|| syntax(line, format!("unterminated substitution in '{}'", value)))?;

        let mut parts = after[..end].split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("arg"), Some(name), None) => {
                let resolved = args.get(name).ok_or_else(|| LaunchError::UnknownArg {
                    line,
                    name: name.to_string(),
                })?;
                out.push_str(resolved);
            }
            _ => out.push_str(&rest[start..start + end + 3]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const TIM_LAUNCH: &str = r#"<?xml version="1.0"?>
<launch>
    <!-- hostname can be overridden with hostname:=<ip> -->
    <arg name="hostname" default="192.168.0.1"/>
    <arg name="port" value="2112"/>
    <node name="sick_tim_5xx" pkg="sick_scan" type="sick_generic_caller" output="screen">
        <param name="scanner_type" type="string" value="sick_tim_5xx"/>
        <param name="hostname" type="string" value="$(arg hostname)"/>
        <param name="port" type="string" value="$(arg port)"/>
        <param name="timelimit" type="int" value="5"/>
        <param name="use_binary_protocol" type="bool" value="false"/>
        <param name="range_max" type="double" value="25.0"/>
    </node>
</launch>
"#;

    fn no_overrides() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_parse_tim_launch() {
        let assignments = XmlLaunchParser::new()
            .parse_str(TIM_LAUNCH, &no_overrides())
            .unwrap();

        assert_eq!(
            assignments,
            vec![
                LaunchAssignment::new("scanner_type", ParamType::String, "sick_tim_5xx"),
                LaunchAssignment::new("hostname", ParamType::String, "192.168.0.1"),
                LaunchAssignment::new("port", ParamType::String, "2112"),
                LaunchAssignment::new("timelimit", ParamType::Int, "5"),
                LaunchAssignment::new("use_binary_protocol", ParamType::Bool, "false"),
                LaunchAssignment::new("range_max", ParamType::Double, "25.0"),
            ]
        );
    }

    #[test]
    fn test_arg_default_overridden() {
        let mut overrides = HashMap::new();
        overrides.insert("hostname".to_string(), "10.1.1.1".to_string());
        // Fixed arg values are not overridable
        overrides.insert("port".to_string(), "9999".to_string());

        let assignments = XmlLaunchParser::new()
            .parse_str(TIM_LAUNCH, &overrides)
            .unwrap();

        assert_eq!(assignments[1].raw, "10.1.1.1");
        assert_eq!(assignments[2].raw, "2112");
    }

    #[test]
    fn test_single_quotes_and_entities() {
        let xml = "<param name='cloud_topic' type='string' value='a &amp; b'/>";
        let assignments = XmlLaunchParser::new().parse_str(xml, &no_overrides()).unwrap();
        assert_eq!(assignments[0].raw, "a & b");
    }

    #[test]
    fn test_param_without_type_is_string() {
        let xml = r#"<param name="frame_id" value="laser"/>"#;
        let assignments = XmlLaunchParser::new().parse_str(xml, &no_overrides()).unwrap();
        assert_eq!(assignments[0].param_type, ParamType::String);
    }

    #[test]
    fn test_other_substitutions_kept() {
        let xml = r#"<param name="cfg" value="$(find sick_scan)/cfg"/>"#;
        let assignments = XmlLaunchParser::new().parse_str(xml, &no_overrides()).unwrap();
        assert_eq!(assignments[0].raw, "$(find sick_scan)/cfg");
    }

    #[test]
    fn test_unterminated_comment() {
        let xml = "<launch>\n<!-- never closed\n<param name=\"a\" value=\"1\"/>";
        let err = XmlLaunchParser::new().parse_str(xml, &no_overrides()).unwrap_err();
        assert!(matches!(err, LaunchError::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_unterminated_tag() {
        let xml = r#"<launch><param name="a" value="1""#;
        let err = XmlLaunchParser::new().parse_str(xml, &no_overrides()).unwrap_err();
        assert!(matches!(err, LaunchError::Syntax { .. }));
    }

    #[test]
    fn test_param_without_name() {
        let xml = "<launch>\n\n<param type=\"int\" value=\"1\"/></launch>";
        let err = XmlLaunchParser::new().parse_str(xml, &no_overrides()).unwrap_err();
        match err {
            LaunchError::MissingAttribute {
                line,
                element,
                attribute,
            } => {
                assert_eq!(line, 3);
                assert_eq!(element, "param");
                assert_eq!(attribute, "name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_arg() {
        let xml = r#"<param name="hostname" value="$(arg nowhere)"/>"#;
        let err = XmlLaunchParser::new().parse_str(xml, &no_overrides()).unwrap_err();
        assert!(matches!(err, LaunchError::UnknownArg { ref name, .. } if name == "nowhere"));
    }

    #[test]
    fn test_unquoted_attribute() {
        let xml = r#"<param name=hostname value="x"/>"#;
        let err = XmlLaunchParser::new().parse_str(xml, &no_overrides()).unwrap_err();
        assert!(matches!(err, LaunchError::Syntax { .. }));
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::Builder::new().suffix(".launch").tempfile().unwrap();
        file.write_all(TIM_LAUNCH.as_bytes()).unwrap();

        let assignments = XmlLaunchParser::new()
            .parse_file(file.path(), &no_overrides())
            .unwrap();
        assert_eq!(assignments.len(), 6);
    }

    #[test]
    fn test_parse_missing_file() {
        let err = XmlLaunchParser::new()
            .parse_file(Path::new("/nonexistent/sick.launch"), &no_overrides())
            .unwrap_err();
        assert!(matches!(err, LaunchError::Io { .. }));
    }
}
