// crates/server/src/config.rs
//! Server configuration, read from the environment at startup.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47910;

/// Default per-request timeout for the extraction service.
pub const DEFAULT_EXTRACTOR_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// `None` means the default cache location.
    pub db_path: Option<PathBuf>,
    /// Base URL of the external extraction service.
    pub extractor_url: String,
    pub extractor_timeout: Duration,
    /// Extract single images inline unless the request says otherwise.
    pub image_fast_path: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("LARDER_PORT").or_else(|| var("PORT")) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "LARDER_PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let bind = match var("LARDER_BIND") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "LARDER_BIND",
                value: raw,
            })?,
            None => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };

        let extractor_url = var("LARDER_EXTRACTOR_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .ok_or(ConfigError::Missing("LARDER_EXTRACTOR_URL"))?;

        let extractor_timeout = match var("LARDER_EXTRACTOR_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid {
                    name: "LARDER_EXTRACTOR_TIMEOUT_SECS",
                    value: raw,
                })?,
            None => DEFAULT_EXTRACTOR_TIMEOUT,
        };

        let image_fast_path = match var("LARDER_IMAGE_FAST_PATH") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::Invalid {
                name: "LARDER_IMAGE_FAST_PATH",
                value: raw,
            })?,
            None => false,
        };

        Ok(Self {
            bind,
            port,
            db_path: var("LARDER_DB_PATH").map(PathBuf::from),
            extractor_url,
            extractor_timeout,
            image_fast_path,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// `true`/`1`/`yes`/`on` and their negatives, case-insensitive.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
