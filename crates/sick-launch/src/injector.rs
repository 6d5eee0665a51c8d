//! Configuration injection
//!
//! Populates the parameter registry from the argument vector before any
//! other component reads it. Launch files are applied first with their
//! declared types; bare `tag:=value` tokens follow as string overrides.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sick_core::ParameterRegistry;
use tracing::{error, info};

use crate::assignment::{is_launch_file, split_tag_value, LaunchAssignment};
use crate::error::InjectError;
use crate::parser::{LaunchParser, XmlLaunchParser};

/// What an injection pass wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionReport {
    /// Launch files applied, in argument order
    pub launch_files: Vec<PathBuf>,
    /// Typed assignments taken from launch files
    pub file_assignments: Vec<LaunchAssignment>,
    /// `(tag, value)` overrides taken from the command line
    pub overrides: Vec<(String, String)>,
}

/// Writes launch file and command line assignments into the registry
#[derive(Debug, Default)]
pub struct ConfigInjector<P = XmlLaunchParser> {
    parser: P,
}

impl ConfigInjector<XmlLaunchParser> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: LaunchParser> ConfigInjector<P> {
    /// Use a custom launch parser
    pub fn with_parser(parser: P) -> Self {
        Self { parser }
    }

    /// Inject `args` (program name excluded) into `registry`.
    ///
    /// At most one launch file may be named. Every token is checked before
    /// anything is written, so a malformed token leaves the registry
    /// untouched.
    pub fn inject<S: AsRef<str>>(
        &self,
        args: &[S],
        registry: &ParameterRegistry,
    ) -> Result<InjectionReport, InjectError> {
        let mut launch_files: Vec<PathBuf> = Vec::new();
        let mut overrides = Vec::new();

        for token in args.iter().map(AsRef::as_ref) {
            if let Some((tag, value)) = split_tag_value(token) {
                overrides.push((tag.to_string(), value.to_string()));
            } else if is_launch_file(token) {
                if let Some(first) = launch_files.first() {
                    error!(token, first = %first.display(), "Only one launch file can be named");
                    return Err(InjectError::MalformedAssignment(token.to_string()));
                }
                launch_files.push(PathBuf::from(token));
            } else {
                error!(token, "Tag-value setting not valid, use pattern <tag>:=<value>");
                return Err(InjectError::MalformedAssignment(token.to_string()));
            }
        }

        let lookup: HashMap<String, String> = overrides.iter().cloned().collect();
        let mut report = InjectionReport::default();

        for path in launch_files {
            let assignments = self.apply_launch_file(&path, &lookup, registry)?;
            report.file_assignments.extend(assignments);
            report.launch_files.push(path);
        }

        for (tag, value) in &overrides {
            registry.set(tag, value.as_str())?;
        }
        report.overrides = overrides;

        info!(
            files = report.launch_files.len(),
            file_assignments = report.file_assignments.len(),
            overrides = report.overrides.len(),
            "Configuration injected"
        );
        Ok(report)
    }

    fn apply_launch_file(
        &self,
        path: &Path,
        lookup: &HashMap<String, String>,
        registry: &ParameterRegistry,
    ) -> Result<Vec<LaunchAssignment>, InjectError> {
        let assignments = self.parser.parse_file(path, lookup).map_err(|source| {
            error!(path = %path.display(), error = %source, "Cannot parse launch file");
            InjectError::LaunchParse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        info!(path = %path.display(), "Applying launch file");
        for assignment in &assignments {
            info!(
                "{:<30} {:<10} {:<20}",
                assignment.tag,
                assignment.param_type.as_str(),
                assignment.raw
            );
            let value = assignment.typed_value()?;
            registry.set(&assignment.tag, value)?;
        }
        Ok(assignments)
    }
}
