//! Connection lifecycle controller
//!
//! Drives one scanner through `Init -> Run -> Finalize`, reconnecting on
//! recoverable failures. The controller is the only owner of the session,
//! the services handle and the parser; every release takes the `Option`
//! first so a second release finds nothing.

use std::sync::Arc;

use sick_core::{ExitCode, ParameterRegistry};
use sick_launch::DebugFlags;
use sick_scan::{
    resolve_dialect, DefaultSessionFactory, DeviceSession, Dialect, InitOutcome, ScanParser,
    SessionFactory, SharedParser, StepOutcome,
};
use tracing::{debug, error, info, warn};

use crate::error::{NodeError, NodeResult};
use crate::runtime::HostRuntime;
use crate::services::{HttpServicesFactory, ServicesFactory, ServicesHandle};
use crate::settings::{declare_scan_limits, NodeSettings};
use crate::state::{RunControl, RunState};

/// Scanner family served by a separate driver
pub const LDMRS_SCANNER_TYPE: &str = "sick_ldmrs";

enum InitStep {
    Continue,
    Exit(ExitCode),
}

pub struct LifecycleController {
    registry: Arc<ParameterRegistry>,
    settings: NodeSettings,
    dialect: Dialect,
    control: Arc<RunControl>,
    runtime: Arc<dyn HostRuntime>,
    session_factory: Box<dyn SessionFactory>,
    services_factory: Box<dyn ServicesFactory>,
    services: Option<Box<dyn ServicesHandle>>,
    session: Option<Box<dyn DeviceSession>>,
    parser: Option<SharedParser>,
    init_attempts: u32,
}

impl LifecycleController {
    /// Read the settings, build the parser and pick the dialect
    ///
    /// Runs once before the first session is constructed.
    pub fn new(
        registry: Arc<ParameterRegistry>,
        node_name: &str,
        flags: DebugFlags,
        runtime: Arc<dyn HostRuntime>,
    ) -> NodeResult<Self> {
        let settings = NodeSettings::declare(&registry, node_name, flags)?;
        if settings.scanner_type == LDMRS_SCANNER_TYPE {
            error!(
                scanner_type = %settings.scanner_type,
                "LD-MRS scanners need their own driver"
            );
            return Err(NodeError::Unsupported(settings.scanner_type));
        }

        let mut parser = ScanParser::new(&settings.scanner_type)?;
        declare_scan_limits(&registry, &mut parser)?;
        let decision = resolve_dialect(&registry, &mut parser)?;
        info!(
            scanner_type = %settings.scanner_type,
            layers = parser.layers(),
            dialect = %decision.dialect,
            "Scanner configured"
        );

        let services_factory = Box::new(HttpServicesFactory::new(registry.clone()));
        Ok(Self {
            registry,
            settings,
            dialect: decision.dialect,
            control: Arc::new(RunControl::new()),
            runtime,
            session_factory: Box::new(DefaultSessionFactory),
            services_factory,
            services: None,
            session: None,
            parser: Some(parser.into_shared()),
            init_attempts: 0,
        })
    }

    pub fn with_session_factory(mut self, factory: impl SessionFactory + 'static) -> Self {
        self.session_factory = Box::new(factory);
        self
    }

    pub fn with_services_factory(mut self, factory: impl ServicesFactory + 'static) -> Self {
        self.services_factory = Box::new(factory);
        self
    }

    /// Handle for the interrupt path
    pub fn control(&self) -> Arc<RunControl> {
        self.control.clone()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Parser, until final teardown
    pub fn parser(&self) -> Option<&SharedParser> {
        self.parser.as_ref()
    }

    /// Drive the state machine until it finalizes or the runtime stops
    pub async fn run(&mut self) -> ExitCode {
        let mut result = ExitCode::Success;
        let mut last_step_ok = true;

        while self.runtime.is_running() {
            match self.control.state() {
                RunState::Init => {
                    if let InitStep::Exit(code) = self.init_step().await {
                        result = code;
                        break;
                    }
                }
                RunState::Run => {
                    if !last_step_ok {
                        info!("Acquisition failed, finalizing");
                        self.control.finalize();
                        continue;
                    }
                    self.runtime.service_events_once().await;
                    let Some(session) = self.session.as_mut() else {
                        self.control.finalize();
                        continue;
                    };
                    if let StepOutcome::Failed(err) = session.run_step().await {
                        error!(%err, "Scanner session failed");
                        result = ExitCode::Error;
                        last_step_ok = false;
                    }
                }
                RunState::Finalize => break,
            }
        }

        self.teardown().await;
        info!(exit = %result, "Lifecycle finished");
        result
    }

    async fn init_step(&mut self) -> InitStep {
        self.release_session().await;

        let Some(parser) = self.parser.clone() else {
            error!("Parser already released");
            return InitStep::Exit(ExitCode::Fatal);
        };
        self.init_attempts += 1;
        let config = self.settings.session_config(self.dialect);
        let mut session = match self.session_factory.construct(&config, parser.clone()) {
            Ok(session) => session,
            Err(err) => {
                error!(%err, "Cannot construct scanner session");
                return InitStep::Exit(ExitCode::Fatal);
            }
        };

        match session.initialize(&self.registry).await {
            InitOutcome::Ready => {
                info!(attempt = self.init_attempts, "Scanner session initialized");
                if self.settings.start_services {
                    match self.services_factory.start(
                        &*session,
                        &parser,
                        self.dialect.is_binary(),
                    ) {
                        Ok(handle) => self.services = Some(handle),
                        Err(err) => warn!(%err, "Cannot start services, continuing without them"),
                    }
                }
                self.control.mark_initialized(session.acquisition_stop());
                self.session = Some(session);

                if let Some(ip) = &self.settings.new_ip_address {
                    info!(%ip, "IP address changed, restart the node to use the new address");
                    self.control.finalize();
                } else if !self.control.begin_run() {
                    debug!(state = ?self.control.state(), "State changed during init");
                }
                InitStep::Continue
            }
            InitOutcome::Retry(err) => {
                self.session = Some(session);
                let max = self.settings.max_init_attempts;
                if max > 0 && self.init_attempts >= max {
                    error!(%err, attempts = self.init_attempts, "Giving up on scanner initialization");
                    return InitStep::Exit(ExitCode::Error);
                }
                warn!(
                    %err,
                    attempt = self.init_attempts,
                    delay_ms = self.settings.reconnect_delay.as_millis() as u64,
                    "Scanner initialization failed, retrying"
                );
                self.runtime.idle(self.settings.reconnect_delay).await;
                InitStep::Continue
            }
            InitOutcome::Fatal(err) => {
                error!(%err, "Scanner initialization failed");
                self.session = Some(session);
                InitStep::Exit(ExitCode::Fatal)
            }
        }
    }

    /// Release services, then the session
    async fn release_session(&mut self) {
        if let Some(services) = self.services.take() {
            debug!(addr = %services.local_addr(), "Releasing services");
            drop(services);
        }
        self.control.clear_initialized();
        if let Some(mut session) = self.session.take() {
            debug!("Releasing scanner session");
            session.close().await;
            drop(session);
        }
    }

    /// Release every owned resource: services, session, parser.
    /// Safe to call more than once.
    pub async fn teardown(&mut self) {
        self.release_session().await;
        if let Some(parser) = self.parser.take() {
            debug!(scans = parser.lock().scans(), "Releasing parser");
            drop(parser);
        }
    }
}
