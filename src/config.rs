//! Configuration types for kallax.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::DnsError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    #[serde(default)]
    pub dns: DnsConfig,

    /// Docker Swarm control plane configuration.
    #[serde(default)]
    pub docker: DockerConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Reject configurations the resolver cannot serve with.
    pub fn validate(&self) -> Result<(), DnsError> {
        if self.dns.base_domain.trim_matches('.').is_empty() {
            return Err(DnsError::Config("dns.base_domain must not be empty".into()));
        }
        if self.dns.label_prefix.is_empty() {
            return Err(DnsError::Config("dns.label_prefix must not be empty".into()));
        }
        let host = &self.docker.host;
        let supported = ["unix://", "http://", "https://"];
        if !supported.iter().any(|scheme| host.starts_with(scheme)) {
            return Err(DnsError::Config(format!(
                "docker.host must be a unix://, http:// or https:// URL, got {host:?}"
            )));
        }
        if host.strip_prefix("unix://") == Some("") {
            return Err(DnsError::Config("docker.host names no socket path".into()));
        }
        Ok(())
    }
}

/// Which historical label/name schema the resolver speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// Network-qualified names, `{"port": .., "network": ..}` label payloads.
    #[default]
    Current,
    /// No network token, `{"<endpoint>": <port>}` label payloads, raw node ids.
    Legacy,
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for the DNS server to listen on (UDP).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Zone this resolver is authoritative for (e.g., "kallax.local").
    #[serde(default = "default_base_domain")]
    pub base_domain: String,

    /// Prefix of the discovery label; the full key is `<prefix>.<group>`.
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,

    /// Label payload and name grammar version.
    #[serde(default)]
    pub schema: SchemaVersion,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            base_domain: default_base_domain(),
            label_prefix: default_label_prefix(),
            schema: SchemaVersion::default(),
        }
    }
}

/// Docker Engine API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Docker Engine API endpoint: a socket ("unix:///var/run/docker.sock")
    /// or a base URL ("http://127.0.0.1:2375").
    #[serde(default = "default_docker_host")]
    pub host: String,

    /// Optional API version path prefix (e.g., "v1.41").
    #[serde(default)]
    pub api_version: Option<String>,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            host: default_docker_host(),
            api_version: None,
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "kallax=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Force debug logging regardless of `log_level`.
    #[serde(default)]
    pub debug: bool,

    /// Prometheus metrics exporter address.
    #[serde(default = "default_prometheus_addr")]
    pub prometheus_addr: Option<SocketAddr>,
}

impl TelemetryConfig {
    /// The filter directive actually applied.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            debug: false,
            prometheus_addr: default_prometheus_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5454))
}

fn default_base_domain() -> String {
    "kallax.local".to_string()
}

fn default_label_prefix() -> String {
    "kallax.group".to_string()
}

fn default_docker_host() -> String {
    "unix:///var/run/docker.sock".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_prometheus_addr() -> Option<SocketAddr> {
    Some(SocketAddr::from(([0, 0, 0, 0], 9010)))
}
