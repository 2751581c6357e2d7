//! xUA configuration

use crate::errors::XuaError;
use crate::telemetry::TelemetryConfig;
use crate::types::{ProtocolClass, TrafficModeType};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Complete xUA configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XuaConfig {
    /// Association configuration
    pub transport: TransportConfig,
    /// ASP identity and traffic handling
    pub asp: AspConfig,
    /// Protocol timers
    pub timers: TimerConfig,
    /// SCCP connectionless defaults
    pub sccp: SccpConfig,
    /// Logging
    pub telemetry: TelemetryConfig,
}

/// Association configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Local bind address (optional)
    pub local_address: Option<String>,
    /// Signalling Gateway address
    pub remote_address: String,
    /// Port (default 14001 for SUA)
    pub port: u16,
    /// Stream used for xUA traffic
    pub stream_id: u16,
    /// Payload protocol identifier
    pub ppid: u32,
}

/// ASP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AspConfig {
    /// Routing contexts sent in ASPAC and CLDT
    pub routing_context: Vec<u32>,
    /// Traffic mode requested in ASPAC
    pub traffic_mode: TrafficModeType,
    /// ASP identifier sent in ASPUP
    pub asp_identifier: Option<u32>,
    /// Info string sent in ASPUP
    pub info_string: Option<String>,
    /// Event queue capacity
    pub event_queue_capacity: usize,
    /// Consecutive undecodable frames tolerated before aborting
    pub max_decode_failures: u32,
}

/// Protocol timers (milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub ta: u64,
    pub tr: u64,
    /// Response timer for ASPUP/ASPAC/ASPDN
    pub tack: u64,
    pub tair: u64,
    /// Heartbeat interval
    pub tbeat: u64,
    /// Send BEAT every `tbeat` while active
    pub heartbeat: bool,
}

/// SCCP connectionless configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SccpConfig {
    /// Protocol class (0-3)
    pub protocol_class: u8,
    /// Request CLDR on delivery failure
    pub return_on_error: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            local_address: None,
            remote_address: "127.0.0.1".to_string(),
            port: crate::DEFAULT_SUA_PORT,
            stream_id: 0,
            ppid: crate::ppid::SUA,
        }
    }
}

impl Default for AspConfig {
    fn default() -> Self {
        Self {
            routing_context: Vec::new(),
            traffic_mode: TrafficModeType::Loadshare,
            asp_identifier: None,
            info_string: None,
            event_queue_capacity: 1024,
            max_decode_failures: 16,
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            ta: 2000,
            tr: 2000,
            tack: 2000,
            tair: 15 * 60 * 1000,
            tbeat: 30000,
            heartbeat: false,
        }
    }
}

impl Default for SccpConfig {
    fn default() -> Self {
        Self {
            protocol_class: 0,
            return_on_error: false,
        }
    }
}

impl XuaConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &str) -> Result<Self, XuaError> {
        let content = std::fs::read_to_string(path).map_err(|e| XuaError::Config(e.to_string()))?;

        let config: Self = serde_json::from_str(&content).map_err(|e| XuaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file layered with `XUA__*` environment overrides
    pub fn load(path: &str) -> Result<Self, XuaError> {
        let config: Self = ::config::Config::builder()
            .add_source(::config::File::with_name(path).required(false))
            .add_source(
                ::config::Environment::with_prefix("XUA")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("asp.routing_context"),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| XuaError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), XuaError> {
        if self.asp.event_queue_capacity == 0 {
            return Err(XuaError::Config("event_queue_capacity must be positive".to_string()));
        }
        if self.timers.tack == 0 {
            return Err(XuaError::Config("tack must be positive".to_string()));
        }
        if self.timers.heartbeat && self.timers.tbeat == 0 {
            return Err(XuaError::Config("tbeat must be positive when heartbeat is enabled".to_string()));
        }
        if self.sccp.protocol_class > 3 {
            return Err(XuaError::Config(format!(
                "protocol_class {} out of range",
                self.sccp.protocol_class
            )));
        }
        Ok(())
    }

    /// Signalling Gateway socket address
    pub fn remote_addr(&self) -> Result<SocketAddr, XuaError> {
        format!("{}:{}", self.transport.remote_address, self.transport.port)
            .parse()
            .map_err(|e| XuaError::Config(format!("Invalid remote address: {}", e)))
    }

    /// Local socket address, when one is configured
    pub fn local_addr(&self) -> Result<Option<SocketAddr>, XuaError> {
        self.transport
            .local_address
            .as_ref()
            .map(|addr| {
                format!("{}:0", addr)
                    .parse()
                    .map_err(|e| XuaError::Config(format!("Invalid local address: {}", e)))
            })
            .transpose()
    }

    /// Protocol class used for outbound CLDT
    pub fn protocol_class(&self) -> ProtocolClass {
        ProtocolClass {
            class: self.sccp.protocol_class,
            return_on_error: self.sccp.return_on_error,
        }
    }

    /// Get response timer as Duration
    pub fn tack(&self) -> Duration {
        Duration::from_millis(self.timers.tack)
    }

    /// Get heartbeat interval as Duration
    pub fn tbeat(&self) -> Duration {
        Duration::from_millis(self.timers.tbeat)
    }

    pub fn ta(&self) -> Duration {
        Duration::from_millis(self.timers.ta)
    }

    pub fn tr(&self) -> Duration {
        Duration::from_millis(self.timers.tr)
    }

    pub fn tair(&self) -> Duration {
        Duration::from_millis(self.timers.tair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = XuaConfig::default();
        assert_eq!(config.asp.traffic_mode, TrafficModeType::Loadshare);
        assert_eq!(config.asp.event_queue_capacity, 1024);
        assert_eq!(config.tack(), Duration::from_secs(2));
        assert_eq!(config.tbeat(), Duration::from_secs(30));
        assert_eq!(config.tair(), Duration::from_secs(900));
        assert_eq!(config.transport.port, 14001);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{ "asp": { "routing_context": [101], "traffic_mode": "override" } }"#;
        let config: XuaConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.asp.routing_context, vec![101]);
        assert_eq!(config.asp.traffic_mode, TrafficModeType::Override);
        assert_eq!(config.timers.tack, 2000);
    }

    #[test]
    fn test_validate_rejects_bad_protocol_class() {
        let mut config = XuaConfig::default();
        config.sccp.protocol_class = 4;
        assert!(matches!(config.validate(), Err(XuaError::Config(_))));
    }

    #[test]
    fn test_addresses() {
        let mut config = XuaConfig::default();
        config.transport.local_address = Some("10.0.0.1".to_string());
        assert_eq!(config.remote_addr().unwrap().port(), 14001);
        assert_eq!(config.local_addr().unwrap().map(|a| a.port()), Some(0));

        config.transport.remote_address = "not an address".to_string();
        assert!(config.remote_addr().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = XuaConfig::load("does-not-exist-xua").unwrap();
        assert_eq!(config.asp.max_decode_failures, 16);
    }
}
