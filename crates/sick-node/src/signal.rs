//! Ctrl-C handling

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::runtime::HostRuntime;
use crate::state::RunControl;

/// Spawn the interrupt task
///
/// Each Ctrl-C stops acquisition and forces `Finalize`; repeated signals
/// are harmless. The task never touches the session itself.
pub fn spawn_interrupt_handler(
    control: Arc<RunControl>,
    runtime: Arc<dyn HostRuntime>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(%err, "Cannot listen for Ctrl-C");
                return;
            }
            info!("Caught signal, shutting down");
            info!(version = env!("CARGO_PKG_VERSION"), "sick_generic_caller says good bye");
            control.interrupt(runtime.as_ref());
        }
    })
}
