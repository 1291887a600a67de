//! Tracing configuration types.

use serde::Deserialize;

/// Configuration for the tracing subsystem.
#[derive(Debug, Clone, Deserialize)]
pub struct TracingConfig {
    /// Service name attached to exported spans.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// OTLP collector endpoint (e.g. "http://collector:4317").
    /// When `None`, spans are only written through the fmt layer.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    #[serde(default)]
    pub protocol: OtlpProtocol,

    /// Log level filter (e.g. "info", "routed_mappers=debug,info").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit fmt output as JSON lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

/// OTLP transport protocol.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    Http,
}

fn default_service_name() -> String {
    "mapper-demo".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            otlp_endpoint: None,
            protocol: OtlpProtocol::default(),
            log_level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_disable_otlp() {
        let config = TracingConfig::default();
        assert_eq!(config.service_name, "mapper-demo");
        assert!(config.otlp_endpoint.is_none());
        assert_eq!(config.protocol, OtlpProtocol::Grpc);
        assert_eq!(config.log_level, "info");
        assert!(!config.json);
    }
}
