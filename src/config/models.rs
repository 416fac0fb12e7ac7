//! Configuration data structures for trellis.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files and
//! `TRELLIS__*` environment overrides. Every field has a default so that a
//! service only needs to state what differs.
use serde::{Deserialize, Serialize};

use crate::core::audit::BodyLimits;

/// Default function for the request body buffering limit (2 MiB)
fn default_body_buffer_limit() -> usize {
    2 * 1024 * 1024
}

/// Output format for log lines
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human friendly multi-line output for development
    Pretty,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name, attached to every log line
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Skip the audit log line entirely
    pub no_logging: bool,
    /// Answer CORS requests permissively
    pub allow_cors: bool,
    /// Maximum logged length of request bodies (`0` logs nothing, unset is unlimited)
    pub request_body_max_logging_len: Option<usize>,
    /// Maximum logged length of response bodies (`0` logs nothing, unset is unlimited)
    pub response_body_max_logging_len: Option<usize>,
    /// Largest request body buffered for logging, in bytes
    #[serde(default = "default_body_buffer_limit")]
    pub body_buffer_limit: usize,
    /// Seconds to wait for in-flight requests on shutdown
    pub shutdown_timeout_secs: u64,
    pub log: LogConfig,
}

impl ServiceConfig {
    /// Create a new service configuration builder
    pub fn builder(name: impl Into<String>) -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: ServiceConfig {
                name: name.into(),
                ..ServiceConfig::default()
            },
        }
    }

    /// `host:port` string the server binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn body_limits(&self) -> BodyLimits {
        BodyLimits {
            request: self.request_body_max_logging_len,
            response: self.response_body_max_logging_len,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "service".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            no_logging: false,
            allow_cors: false,
            request_body_max_logging_len: None,
            response_body_max_logging_len: None,
            body_buffer_limit: default_body_buffer_limit(),
            shutdown_timeout_secs: 30,
            log: LogConfig::default(),
        }
    }
}

/// Builder for ServiceConfig to allow for cleaner configuration creation
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn no_logging(mut self, no_logging: bool) -> Self {
        self.config.no_logging = no_logging;
        self
    }

    pub fn allow_cors(mut self, allow_cors: bool) -> Self {
        self.config.allow_cors = allow_cors;
        self
    }

    pub fn request_body_max_logging_len(mut self, len: usize) -> Self {
        self.config.request_body_max_logging_len = Some(len);
        self
    }

    pub fn response_body_max_logging_len(mut self, len: usize) -> Self {
        self.config.response_body_max_logging_len = Some(len);
        self
    }

    pub fn body_buffer_limit(mut self, bytes: usize) -> Self {
        self.config.body_buffer_limit = bytes;
        self
    }

    pub fn log(mut self, log: LogConfig) -> Self {
        self.config.log = log;
        self
    }

    pub fn build(self) -> ServiceConfig {
        self.config
    }
}
