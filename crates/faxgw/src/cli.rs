//! Command line interface of the `faxgw` binary

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;

use faxgw_gateway_core::{GatewayConfig, Result};
use faxgw_infra_common::{logging::parse_log_level, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "faxgw")]
#[command(version, about = "FAX-over-IP gateway control plane")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address the control socket binds to
    #[arg(long)]
    pub control_ip: Option<Ipv4Addr>,

    /// Control UDP port
    #[arg(short = 'p', long)]
    pub control_port: Option<u16>,

    /// Address media sockets bind to and advertise
    #[arg(long)]
    pub media_ip: Option<Ipv4Addr>,

    /// Take the media address from this network interface
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Session table capacity, control session included
    #[arg(long)]
    pub max_sessions: Option<usize>,

    /// Log level (err, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// Configuration file (or defaults) with command line overrides applied
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::from_file(path)?,
            None => GatewayConfig::default(),
        };

        if let Some(ip) = self.control_ip {
            config.control_ip = ip;
        }
        if let Some(port) = self.control_port {
            config.control_port = port;
        }
        if let Some(ip) = self.media_ip {
            config.media_ip = ip;
        }
        if let Some(interface) = &self.interface {
            config.interface = Some(interface.clone());
        }
        if let Some(max) = self.max_sessions {
            config.max_sessions = max;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn logging_config(&self) -> faxgw_infra_common::Result<LoggingConfig> {
        let level = parse_log_level(&self.log_level)?;
        let config = LoggingConfig::new(level, "faxgw");
        Ok(if self.json_logs { config.with_json() } else { config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["faxgw"]).unwrap();
        let config = cli.gateway_config().unwrap();
        assert_eq!(config.control_port, 23232);
        assert_eq!(config.max_sessions, 80);
        assert!(!cli.logging_config().unwrap().json);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "faxgw",
            "-p",
            "24000",
            "--media-ip",
            "192.168.7.2",
            "--max-sessions",
            "20",
            "--log-level",
            "debg",
            "--json-logs",
        ])
        .unwrap();
        let config = cli.gateway_config().unwrap();
        assert_eq!(config.control_port, 24000);
        assert_eq!(config.media_ip, Ipv4Addr::new(192, 168, 7, 2));
        assert_eq!(config.max_sessions, 20);

        let logging = cli.logging_config().unwrap();
        assert_eq!(logging.level, tracing::Level::DEBUG);
        assert!(logging.json);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let cli = Cli::try_parse_from(["faxgw", "--max-sessions", "1"]).unwrap();
        assert!(cli.gateway_config().is_err());
        assert!(Cli::try_parse_from(["faxgw", "--media-ip", "not-an-ip"]).is_err());
    }
}
