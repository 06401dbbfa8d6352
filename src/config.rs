//! Configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! [server]
//! addr = "0.0.0.0:8080"
//! shutdown_timeout = 10      # seconds
//!
//! [log]
//! filter = "info"
//!
//! [middleware]
//! recover = true
//! access_log = true
//!
//! [middleware.cors]          # omit the table to disable CORS
//! allow_credentials = true
//! allow_methods = "POST, GET, OPTIONS, PATCH, PUT, DELETE"
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;
use crate::handler::Middleware;
use crate::middleware::{self, CorsConfig};

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub middleware: MiddlewareConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Grace period for in-flight requests after a shutdown signal, in
    /// seconds.
    pub shutdown_timeout: u64,
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            shutdown_timeout: 10,
        }
    }
}

/// Read by binaries when installing a subscriber; the library itself never
/// does.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// An `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { filter: "info".to_owned() }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct MiddlewareConfig {
    pub recover: bool,
    pub access_log: bool,
    pub cors: Option<CorsConfig>,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self { recover: true, access_log: true, cors: None }
    }
}

impl Config {
    pub fn from_toml(src: &str) -> Result<Self, Error> {
        Ok(toml::from_str(src)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let src = std::fs::read_to_string(path)?;
        Self::from_toml(&src)
    }

    /// The root middleware list this configuration asks for, in
    /// `recover, access_log, cors` order.
    pub fn middleware(&self) -> Vec<Middleware> {
        let mw = &self.middleware;
        let mut list = Vec::new();
        if mw.recover {
            list.push(middleware::recover());
        }
        if mw.access_log {
            list.push(middleware::access_log());
        }
        if let Some(cors) = &mw.cors {
            list.push(middleware::cors(cors.clone()));
        }
        list
    }
}
