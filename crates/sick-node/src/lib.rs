//! sick-node: connection lifecycle controller for SICK laser scanners
//!
//! - [`LifecycleController`]: the `Init -> Run -> Finalize` state machine
//!   and sole owner of session, services and parser
//! - [`RunControl`]: run state shared with the interrupt path
//! - [`NodeSettings`]: typed view of the recognized parameters
//! - [`HostRuntime`]: process lifecycle hooks

pub mod controller;
pub mod error;
pub mod launcher;
pub mod runtime;
pub mod services;
pub mod settings;
pub mod signal;
pub mod state;

pub use controller::{LifecycleController, LDMRS_SCANNER_TYPE};
pub use error::{NodeError, NodeResult};
pub use launcher::{node_name, run_node};
pub use runtime::{HostRuntime, NodeRuntime};
pub use services::{HttpServicesFactory, ServicesFactory, ServicesHandle};
pub use settings::{declare_scan_limits, NodeSettings};
pub use signal::spawn_interrupt_handler;
pub use state::{RunControl, RunState};
