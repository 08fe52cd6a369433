use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::http::connection::ConnectionLimits;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub backlog: i32,
    pub max_connections: usize,
    pub max_request_bytes: usize,
    pub read_chunk_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9999,
            backlog: 128,
            max_connections: 1024,
            max_request_bytes: 16 * 1024,
            read_chunk_bytes: 4096,
        }
    }
}

impl Config {
    /// Defaults overridden by `LISTEN_HOST` / `LISTEN_PORT`.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Reads a YAML file, then applies environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut cfg = Self::from_yaml(&raw)
            .with_context(|| format!("invalid config {}", path.display()))?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        // An empty document deserializes to unit, not a mapping.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(raw)?;
        cfg.server.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(host) = std::env::var("LISTEN_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("LISTEN_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("LISTEN_PORT is not a port number: {port}"))?;
        }
        Ok(())
    }
}

impl ServerConfig {
    /// Resolves `host:port` to the first matching socket address.
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("cannot resolve {}:{}", self.host, self.port))?
            .next()
            .with_context(|| format!("no address for {}:{}", self.host, self.port))
    }

    pub fn limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            read_chunk: self.read_chunk_bytes,
            max_request: self.max_request_bytes,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.backlog > 0, "backlog must be positive");
        anyhow::ensure!(self.max_connections > 0, "max_connections must be positive");
        anyhow::ensure!(self.read_chunk_bytes > 0, "read_chunk_bytes must be positive");
        anyhow::ensure!(
            self.max_request_bytes >= self.read_chunk_bytes,
            "max_request_bytes must be at least read_chunk_bytes"
        );
        Ok(())
    }
}
