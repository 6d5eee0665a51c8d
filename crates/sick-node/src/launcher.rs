//! Process entry sequence: inject, configure, run

use std::path::Path;
use std::sync::Arc;

use sick_core::{ExitCode, ParameterRegistry};
use sick_launch::{split_tag_value, ConfigInjector, DebugFlags};
use tracing::{error, info};

use crate::controller::LifecycleController;
use crate::runtime::NodeRuntime;
use crate::signal::spawn_interrupt_handler;

/// Token tag overriding the node name
pub const NAME_TAG: &str = "__name";
pub const DEFAULT_NODE_NAME: &str = "sick_generic_caller";

/// `__name:=<name>` if present, otherwise the stem of `exe`
pub fn node_name(args: &[String], exe: Option<&str>) -> String {
    args.iter()
        .filter_map(|arg| split_tag_value(arg))
        .find(|(tag, _)| *tag == NAME_TAG)
        .map(|(_, name)| name.to_string())
        .or_else(|| {
            exe.and_then(|exe| Path::new(exe).file_stem())
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| DEFAULT_NODE_NAME.to_string())
}

/// Run the node for `args` until it finalizes
///
/// A configuration that cannot be injected exits `Fatal` before any
/// session is constructed.
pub async fn run_node(args: &[String], node_name: &str, runtime: Arc<NodeRuntime>) -> ExitCode {
    let flags = DebugFlags::scan(args);
    let registry = Arc::new(ParameterRegistry::new());
    match ConfigInjector::new().inject(args, &registry) {
        Ok(report) => info!(
            launch_files = report.launch_files.len(),
            overrides = report.overrides.len(),
            "Configuration applied"
        ),
        Err(e) => {
            error!(error = %e, "Cannot apply configuration");
            return ExitCode::Fatal;
        }
    }

    let mut controller =
        match LifecycleController::new(registry, node_name, flags, runtime.clone()) {
            Ok(controller) => controller,
            Err(e) => {
                error!(error = %e, "Cannot set up scanner node");
                return e.exit_code();
            }
        };

    let interrupts = spawn_interrupt_handler(controller.control(), runtime);
    let code = controller.run().await;
    interrupts.abort();
    code
}
