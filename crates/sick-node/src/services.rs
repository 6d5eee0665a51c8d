//! Optional request/response services bound to the live session

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use sick_core::ParameterRegistry;
use sick_scan::{DeviceSession, Dialect, SharedParser};
use sick_services::{AuxServices, ServiceState};
use tokio::sync::watch;
use tracing::info;

use crate::error::{NodeError, NodeResult};

/// Running services; dropping the handle stops them
pub trait ServicesHandle: Send {
    fn local_addr(&self) -> SocketAddr;
}

impl ServicesHandle for AuxServices {
    fn local_addr(&self) -> SocketAddr {
        AuxServices::local_addr(self)
    }
}

/// Starts services against an initialized session
pub trait ServicesFactory: Send + Sync {
    fn start(
        &self,
        session: &dyn DeviceSession,
        parser: &SharedParser,
        dialect_is_binary: bool,
    ) -> NodeResult<Box<dyn ServicesHandle>>;
}

/// HTTP services on `bind_ip:services_port`
pub struct HttpServicesFactory {
    registry: Arc<ParameterRegistry>,
    bind_ip: IpAddr,
    bound: watch::Sender<Option<SocketAddr>>,
}

impl HttpServicesFactory {
    pub fn new(registry: Arc<ParameterRegistry>) -> Self {
        let (bound, _) = watch::channel(None);
        Self {
            registry,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            bound,
        }
    }

    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Address of the most recently started services
    pub fn subscribe(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.bound.subscribe()
    }
}

impl ServicesFactory for HttpServicesFactory {
    fn start(
        &self,
        session: &dyn DeviceSession,
        parser: &SharedParser,
        dialect_is_binary: bool,
    ) -> NodeResult<Box<dyn ServicesHandle>> {
        let port = self.registry.get_i32("services_port").unwrap_or(0);
        let port = u16::try_from(port).map_err(|_| NodeError::InvalidParameter {
            key: "services_port".to_string(),
            message: format!("{} is not a TCP port", port),
        })?;

        let state = ServiceState::new(
            session.commands(),
            Dialect::from_binary_flag(dialect_is_binary),
            self.registry.clone(),
            parser.clone(),
        );
        let services = AuxServices::start(SocketAddr::new(self.bind_ip, port), state)?;
        info!(addr = %services.local_addr(), binary = dialect_is_binary, "Services started");
        self.bound.send_replace(Some(services.local_addr()));
        Ok(Box::new(services))
    }
}
