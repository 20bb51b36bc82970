//! Gateway configuration

use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::error::{Error, Result};

/// Well-known UDP port of the control channel
pub const DEFAULT_CONTROL_PORT: u16 = 23232;
/// Session table capacity, control slot included
pub const DEFAULT_MAX_SESSIONS: usize = 80;
/// Size of each of the inbound and outbound id ranges
pub const DEFAULT_ID_POOL_SIZE: u32 = 1024;
/// First media port
pub const DEFAULT_PORT_BASE: u16 = 37000;
/// Number of media ports
pub const DEFAULT_PORT_COUNT: u16 = 200;
/// Bounded wait of one event loop iteration
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 40;
/// Pause between two media bridge passes
pub const DEFAULT_BRIDGE_INTERVAL_MS: u64 = 2;
/// Receive buffer for one datagram on any socket
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Configuration for a [`Gateway`](crate::Gateway)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address the control socket binds to
    pub control_ip: Ipv4Addr,

    /// Control UDP port
    pub control_port: u16,

    /// Address media sockets bind to and that is advertised in `OK` replies
    pub media_ip: Ipv4Addr,

    /// Network interface to take the media address from, if any
    pub interface: Option<String>,

    /// Maximum number of sessions, control session included
    pub max_sessions: usize,

    /// Ids per direction
    pub id_pool_size: u32,

    /// First port of the media port range
    pub port_base: u16,

    /// Number of ports in the media port range
    pub port_count: u16,

    /// Event loop wait, in milliseconds
    pub poll_timeout_ms: u64,

    /// Media bridge pause, in milliseconds
    pub bridge_interval_ms: u64,

    /// Datagram receive buffer size in bytes
    pub buffer_size: usize,

    /// Parameters handed to every fax engine
    pub engine: EngineConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            control_ip: Ipv4Addr::UNSPECIFIED,
            control_port: DEFAULT_CONTROL_PORT,
            media_ip: Ipv4Addr::LOCALHOST,
            interface: None,
            max_sessions: DEFAULT_MAX_SESSIONS,
            id_pool_size: DEFAULT_ID_POOL_SIZE,
            port_base: DEFAULT_PORT_BASE,
            port_count: DEFAULT_PORT_COUNT,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            bridge_interval_ms: DEFAULT_BRIDGE_INTERVAL_MS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            engine: EngineConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load a configuration from a TOML file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = faxgw_infra_common::config::load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the control port
    pub fn with_control_port(mut self, port: u16) -> Self {
        self.control_port = port;
        self
    }

    /// Set the control bind address
    pub fn with_control_ip(mut self, ip: Ipv4Addr) -> Self {
        self.control_ip = ip;
        self
    }

    /// Set the media address
    pub fn with_media_ip(mut self, ip: Ipv4Addr) -> Self {
        self.media_ip = ip;
        self
    }

    /// Set the media port range
    pub fn with_port_range(mut self, base: u16, count: u16) -> Self {
        self.port_base = base;
        self.port_count = count;
        self
    }

    /// Set the session table capacity
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn bridge_interval(&self) -> Duration {
        Duration::from_millis(self.bridge_interval_ms)
    }

    /// Check sizing constraints
    pub fn validate(&self) -> Result<()> {
        if self.max_sessions < 3 {
            return Err(Error::config(format!(
                "max_sessions must hold the control session and one call, got {}",
                self.max_sessions
            )));
        }
        if self.id_pool_size == 0 {
            return Err(Error::config("id_pool_size must be non-zero"));
        }
        if self.id_pool_size.checked_mul(2).is_none() {
            return Err(Error::config("id_pool_size is too large"));
        }
        if self.port_count == 0 {
            return Err(Error::config("port_count must be non-zero"));
        }
        if u32::from(self.port_base) + u32::from(self.port_count) - 1 > u32::from(u16::MAX) {
            return Err(Error::config(format!(
                "port range {}+{} exceeds 65535",
                self.port_base, self.port_count
            )));
        }
        if self.port_base == 0 {
            return Err(Error::config("port_base must be non-zero"));
        }
        if self.buffer_size < faxgw_sig_core::MAX_MESSAGE_LEN {
            return Err(Error::config(format!(
                "buffer_size must be at least {} bytes",
                faxgw_sig_core::MAX_MESSAGE_LEN
            )));
        }
        self.engine.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.control_port, 23232);
        assert_eq!(config.max_sessions, 80);
        assert_eq!(config.poll_timeout(), Duration::from_millis(40));
        assert_eq!(config.bridge_interval(), Duration::from_millis(2));
    }

    #[test]
    fn test_validation() {
        assert!(GatewayConfig::default().with_max_sessions(2).validate().is_err());
        assert!(GatewayConfig::default().with_port_range(65500, 100).validate().is_err());
        assert!(GatewayConfig::default().with_port_range(65436, 100).validate().is_ok());
        assert!(GatewayConfig::default().with_port_range(37000, 0).validate().is_err());

        let mut config = GatewayConfig::default();
        config.id_pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: GatewayConfig = faxgw_infra_common::config::from_toml_str(
            r#"
            control_port = 24000
            media_ip = "192.168.1.10"

            [engine]
            frame_samples = 80
            "#,
        )
        .unwrap();
        assert_eq!(config.control_port, 24000);
        assert_eq!(config.media_ip, Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
        assert_eq!(config.engine.frame_samples, 80);
        assert!(config.engine.t38.ecm);
    }
}
