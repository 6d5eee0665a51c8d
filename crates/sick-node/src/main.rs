//! sick_generic_caller - SICK scanner node
//!
//! Usage: sick_generic_caller [file.launch] [tag:=value ...]

use std::sync::Arc;

use sick_node::{node_name, run_node, NodeRuntime};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sick_node=info,sick_scan=info,sick_launch=info,sick_services=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<std::process::ExitCode> {
    init_tracing()?;

    let exe = std::env::args().next();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let name = node_name(&args, exe.as_deref());
    tracing::info!(node = %name, version = env!("CARGO_PKG_VERSION"), "Starting SICK scanner node");

    let code = run_node(&args, &name, Arc::new(NodeRuntime::new())).await;
    tracing::info!(exit = %code, "SICK scanner node stopped");
    Ok(code.into())
}
