//! Run state shared between the controller and the interrupt path

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::Mutex;
use sick_scan::AcquisitionStop;
use tracing::{debug, info};

use crate::runtime::HostRuntime;

/// Lifecycle state of the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Init = 0,
    Run = 1,
    Finalize = 2,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunState::Init,
            1 => RunState::Run,
            _ => RunState::Finalize,
        }
    }
}

/// Run state plus the handles the interrupt path may touch
///
/// Everything here is safe to call from any task. The interrupt path never
/// receives the session itself, only its [`AcquisitionStop`].
#[derive(Debug)]
pub struct RunControl {
    state: AtomicU8,
    session_initialized: AtomicBool,
    stop: Mutex<Option<AcquisitionStop>>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RunState::Init as u8),
            session_initialized: AtomicBool::new(false),
            stop: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Move from `Init` to `Run`.
    ///
    /// Fails if the state changed meanwhile, so a concurrent interrupt is
    /// never overwritten.
    pub fn begin_run(&self) -> bool {
        self.state
            .compare_exchange(
                RunState::Init as u8,
                RunState::Run as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Force the terminal state
    pub fn finalize(&self) {
        self.state.store(RunState::Finalize as u8, Ordering::SeqCst);
    }

    /// Publish the stop handle of a freshly initialized session
    pub fn mark_initialized(&self, stop: AcquisitionStop) {
        *self.stop.lock() = Some(stop);
        self.session_initialized.store(true, Ordering::SeqCst);
    }

    /// Withdraw the stop handle before the session is released
    pub fn clear_initialized(&self) {
        self.session_initialized.store(false, Ordering::SeqCst);
        self.stop.lock().take();
    }

    pub fn is_session_initialized(&self) -> bool {
        self.session_initialized.load(Ordering::SeqCst)
    }

    /// Handle an interrupt: stop acquisition on an initialized session,
    /// force `Finalize` and ask the runtime to unwind. Idempotent.
    pub fn interrupt(&self, runtime: &dyn HostRuntime) {
        if self.is_session_initialized() {
            if let Some(stop) = self.stop.lock().as_ref() {
                debug!("Stopping data acquisition");
                stop.stop();
            }
        }
        let previous = RunState::from_u8(
            self.state
                .swap(RunState::Finalize as u8, Ordering::SeqCst),
        );
        if previous != RunState::Finalize {
            info!(?previous, "Interrupt: finalizing");
        }
        runtime.request_shutdown();
    }
}
