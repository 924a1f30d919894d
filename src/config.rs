//! Configuration management for Fanout
//!
//! This module defines the main `Config` struct and its sub-structs. It uses
//! the `figment` crate to layer built-in defaults, an optional TOML file,
//! `FANOUT_` environment variables and command-line flags, in that order.

use crate::cli::Cli;
use crate::recipients::DEFAULT_ADMIN_PAGE_SIZE;
use anyhow::{ensure, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level, used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Log a summary of the collected metrics before exiting.
    #[serde(default)]
    pub log_metrics: bool,
    /// HTTP client settings for webhook delivery.
    pub http: HttpConfig,
    /// Recipient resolution settings.
    pub resolution: ResolutionConfig,
}

/// HTTP client settings for webhook delivery.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HttpConfig {
    /// Maximum time to establish a connection, in seconds.
    pub connect_timeout_seconds: u64,
    /// Maximum time to wait on a read from the endpoint, in seconds.
    pub read_timeout_seconds: u64,
}

/// Recipient resolution settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ResolutionConfig {
    /// Number of administrators fetched per page.
    pub admin_page_size: usize,
}

impl Config {
    /// Loads the configuration for a command-line invocation.
    ///
    /// Sources are merged in order of increasing precedence: defaults, the
    /// `--config` TOML file, environment variables (e.g.
    /// `FANOUT_HTTP__READ_TIMEOUT_SECONDS=30`) and command-line flags.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config: Config = Self::figment(cli.config.as_deref())?
            .merge(cli.clone())
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from defaults, an optional file and the environment.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let config: Config = Self::figment(config_path)?.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = config_path {
            ensure!(path.exists(), "configuration file not found at {:?}", path);
            figment = figment.merge(Toml::file(path));
        }
        Ok(figment.merge(Env::prefixed("FANOUT_").split("__")))
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.http.connect_timeout_seconds > 0,
            "http.connect_timeout_seconds must be positive"
        );
        ensure!(
            self.http.read_timeout_seconds > 0,
            "http.read_timeout_seconds must be positive"
        );
        ensure!(
            self.resolution.admin_page_size > 0,
            "resolution.admin_page_size must be positive"
        );
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_metrics: false,
            http: HttpConfig {
                connect_timeout_seconds: 10,
                read_timeout_seconds: 12,
            },
            resolution: ResolutionConfig {
                admin_page_size: DEFAULT_ADMIN_PAGE_SIZE,
            },
        }
    }
}
