//! Recognized node parameters and their defaults

use std::time::Duration;

use sick_core::{ParamValue, ParameterRegistry};
use sick_launch::DebugFlags;
use sick_scan::session::NEW_IP_ADDRESS;
use sick_scan::{Dialect, ScanParser, SessionConfig};
use tracing::{error, info, warn};

use crate::error::{NodeError, NodeResult};

pub const DEFAULT_HOSTNAME: &str = "192.168.0.4";
pub const DEFAULT_PORT: &str = "2112";
pub const DEFAULT_TIMELIMIT_SECS: i32 = 5;
pub const DEFAULT_FRAME_ID: &str = "cloud";
pub const DEFAULT_CLOUD_TOPIC: &str = "cloud";
pub const DEFAULT_RECONNECT_DELAY_MS: i32 = 1000;

/// Typed view of the recognized parameters
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSettings {
    pub scanner_type: String,
    pub hostname: String,
    pub port: u16,
    /// Bound for blocking session operations
    pub timelimit: Duration,
    /// Pending device address change
    pub new_ip_address: Option<String>,
    pub emul_sensor: bool,
    pub start_services: bool,
    /// 0 picks an ephemeral port
    pub services_port: u16,
    pub subscribe_datagram: bool,
    pub device_number: i32,
    pub verbose_level: i32,
    pub frame_id: String,
    pub imu_enable: bool,
    pub cloud_topic: String,
    pub reconnect_delay: Duration,
    /// 0 means unbounded
    pub max_init_attempts: u32,
}

impl NodeSettings {
    /// Declare every recognized key with its default and read back the
    /// effective values
    pub fn declare(
        registry: &ParameterRegistry,
        node_name: &str,
        flags: DebugFlags,
    ) -> NodeResult<Self> {
        if flags.internal_debug {
            info!("Internal debug mode, forcing hostname, imu_enable and cloud_topic");
            registry.set("hostname", DEFAULT_HOSTNAME)?;
            registry.set("imu_enable", true)?;
            registry.set("cloud_topic", DEFAULT_CLOUD_TOPIC)?;
        }

        let mut scanner_type = string(registry, "scanner_type", "")?;
        if scanner_type.is_empty() {
            error!(
                node_name,
                "Cannot find parameter scanner_type in the parameter list, using node name"
            );
            scanner_type = node_name.to_string();
            registry.set("scanner_type", scanner_type.as_str())?;
        }

        let hostname = string(registry, "hostname", DEFAULT_HOSTNAME)?;
        let port_raw = string(registry, "port", DEFAULT_PORT)?;
        let port = port_raw.trim().parse::<u16>().map_err(|_| NodeError::InvalidParameter {
            key: "port".to_string(),
            message: format!("'{}' is not a TCP port", port_raw),
        })?;

        let timelimit = int(registry, "timelimit", DEFAULT_TIMELIMIT_SECS)?;
        if timelimit <= 0 {
            return Err(NodeError::InvalidParameter {
                key: "timelimit".to_string(),
                message: format!("{} is not a positive number of seconds", timelimit),
            });
        }

        let new_ip = string(registry, NEW_IP_ADDRESS, "")?;
        let emul_sensor = boolean(registry, "emul_sensor", flags.emul_sensor)?;
        let start_services = boolean(registry, "start_services", false)?;
        let services_port = unsigned(registry, "services_port", 0)?;
        let subscribe_datagram = boolean(registry, "subscribe_datagram", false)?;
        let device_number = int(registry, "device_number", 0)?;
        let verbose_level = int(registry, "verboseLevel", 0)?;
        let frame_id = string(registry, "frame_id", DEFAULT_FRAME_ID)?;
        let imu_enable = boolean(registry, "imu_enable", true)?;
        let cloud_topic = string(registry, "cloud_topic", DEFAULT_CLOUD_TOPIC)?;
        let reconnect_delay_ms = unsigned(registry, "reconnect_delay_ms", DEFAULT_RECONNECT_DELAY_MS)?;
        let max_init_attempts = unsigned(registry, "max_init_attempts", 0)?;

        if emul_sensor {
            info!("Emulation of the sensor is active");
        }
        if subscribe_datagram {
            warn!("subscribe_datagram is not supported over TCP sessions, ignored");
        }

        Ok(Self {
            scanner_type,
            hostname,
            port: port_checked(port)?,
            timelimit: Duration::from_secs(timelimit as u64),
            new_ip_address: (!new_ip.is_empty()).then_some(new_ip),
            emul_sensor,
            start_services,
            services_port: u16::try_from(services_port).map_err(|_| NodeError::InvalidParameter {
                key: "services_port".to_string(),
                message: format!("{} is not a TCP port", services_port),
            })?,
            subscribe_datagram,
            device_number,
            verbose_level,
            frame_id,
            imu_enable,
            cloud_topic,
            reconnect_delay: Duration::from_millis(reconnect_delay_ms as u64),
            max_init_attempts,
        })
    }

    /// Session parameters for the given dialect
    pub fn session_config(&self, dialect: Dialect) -> SessionConfig {
        SessionConfig {
            host: (!self.hostname.is_empty()).then(|| self.hostname.clone()),
            port: self.port,
            timeout: self.timelimit,
            dialect,
            emulate: self.emul_sensor,
        }
    }
}

/// Declare the scan limits with the profile defaults and copy the
/// effective values into the parser
pub fn declare_scan_limits(registry: &ParameterRegistry, parser: &mut ScanParser) -> NodeResult<()> {
    let range_min = double(registry, "range_min", parser.range_min())?;
    let range_max = double(registry, "range_max", parser.range_max())?;
    let time_increment = double(registry, "time_increment", parser.time_increment())?;
    if range_min > range_max {
        return Err(NodeError::InvalidParameter {
            key: "range_min".to_string(),
            message: format!("{} exceeds range_max {}", range_min, range_max),
        });
    }
    parser.set_range_min(range_min);
    parser.set_range_max(range_max);
    parser.set_time_increment(time_increment);
    Ok(())
}

fn port_checked(port: u16) -> NodeResult<u16> {
    if port == 0 {
        return Err(NodeError::InvalidParameter {
            key: "port".to_string(),
            message: "port 0 is not a scanner port".to_string(),
        });
    }
    Ok(port)
}

fn string(registry: &ParameterRegistry, key: &str, default: &str) -> NodeResult<String> {
    match registry.declare(key, default)? {
        ParamValue::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

fn boolean(registry: &ParameterRegistry, key: &str, default: bool) -> NodeResult<bool> {
    Ok(registry.declare(key, default)?.as_bool().unwrap_or(default))
}

fn int(registry: &ParameterRegistry, key: &str, default: i32) -> NodeResult<i32> {
    Ok(registry.declare(key, default)?.as_i32().unwrap_or(default))
}

fn unsigned(registry: &ParameterRegistry, key: &str, default: i32) -> NodeResult<u32> {
    let value = int(registry, key, default)?;
    u32::try_from(value).map_err(|_| NodeError::InvalidParameter {
        key: key.to_string(),
        message: format!("{} is negative", value),
    })
}

fn double(registry: &ParameterRegistry, key: &str, default: f64) -> NodeResult<f64> {
    Ok(registry.declare(key, default)?.as_f64().unwrap_or(default))
}
