/// Engine configuration
///
/// TOML-backed settings for the listener. Everything except the port has a
/// default, so a minimal file is just `bind_port = 8080`.
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ProxyError, Result};

/// Bytes per read/write on every socket
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Pending-connection queue depth for the listening socket
pub const DEFAULT_BACKLOG: u32 = 10;

/// Proxy engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Listen address
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    /// Listen port
    pub bind_port: u16,
    /// Bytes per read/write
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Pending-connection queue depth
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_backlog() -> u32 {
    DEFAULT_BACKLOG
}

impl ProxyConfig {
    /// Create a configuration with defaults for everything but the address
    pub fn new(bind_host: impl Into<String>, bind_port: u16) -> Self {
        Self {
            bind_host: bind_host.into(),
            bind_port,
            buffer_size: DEFAULT_BUFFER_SIZE,
            backlog: DEFAULT_BACKLOG,
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ProxyConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bind_host.trim().is_empty() {
            return Err(ProxyError::config("bind_host must not be empty"));
        }
        if self.bind_port == 0 {
            return Err(ProxyError::config("bind_port must be in 1-65535"));
        }
        if self.buffer_size == 0 {
            return Err(ProxyError::config("buffer_size must be greater than 0"));
        }
        if self.backlog == 0 {
            return Err(ProxyError::config("backlog must be greater than 0"));
        }
        Ok(())
    }

    /// Listen address as `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }

    /// Start building a configuration
    pub fn builder() -> ProxyConfigBuilder {
        ProxyConfigBuilder::default()
    }

    /// Commented example configuration in TOML
    pub fn template() -> &'static str {
        r#"# proxy-relay configuration

# Listen address (default: 127.0.0.1)
bind_host = "127.0.0.1"

# Listen port (required, 1-65535)
bind_port = 8080

# Bytes per read/write (default: 8192)
#buffer_size = 8192

# Pending-connection queue depth (default: 10)
#backlog = 10
"#
    }
}

/// Builder for [`ProxyConfig`]
#[derive(Debug, Default)]
pub struct ProxyConfigBuilder {
    bind_host: Option<String>,
    bind_port: Option<u16>,
    buffer_size: Option<usize>,
    backlog: Option<u32>,
}

impl ProxyConfigBuilder {
    pub fn bind_host(mut self, host: impl Into<String>) -> Self {
        self.bind_host = Some(host.into());
        self
    }

    pub fn bind_port(mut self, port: u16) -> Self {
        self.bind_port = Some(port);
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    pub fn backlog(mut self, backlog: u32) -> Self {
        self.backlog = Some(backlog);
        self
    }

    pub fn build(self) -> Result<ProxyConfig> {
        let config = ProxyConfig {
            bind_host: self.bind_host.unwrap_or_else(default_bind_host),
            bind_port: self
                .bind_port
                .ok_or_else(|| ProxyError::config("bind_port is required"))?,
            buffer_size: self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
            backlog: self.backlog.unwrap_or(DEFAULT_BACKLOG),
        };
        config.validate()?;
        Ok(config)
    }
}
