//! sick-launch: configuration injection for the SICK scanner node
//!
//! Reads an optional launch description and `tag:=value` command line
//! tokens and writes them into a [`sick_core::ParameterRegistry`] before the
//! node starts talking to a device.

pub mod assignment;
pub mod error;
pub mod flags;
pub mod injector;
pub mod parser;

pub use assignment::{is_launch_file, split_tag_value, LaunchAssignment, LAUNCH_SUFFIX};
pub use error::{InjectError, LaunchError, LaunchResult};
pub use flags::DebugFlags;
pub use injector::{ConfigInjector, InjectionReport};
pub use parser::{LaunchParser, XmlLaunchParser};
