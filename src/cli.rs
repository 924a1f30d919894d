//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. Global flags are merged over the TOML file and environment
//! variables when the configuration is loaded.

use crate::core::ChannelType;
use clap::{Parser, Subcommand};
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;
use uuid::Uuid;

/// Resolve notification recipients and deliver change events to them.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level used when RUST_LOG is not set.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Connect timeout for webhook requests, in seconds.
    #[arg(long, value_name = "SECONDS", global = true)]
    pub connect_timeout: Option<u64>,

    /// Read timeout for webhook requests, in seconds.
    #[arg(long, value_name = "SECONDS", global = true)]
    pub read_timeout: Option<u64>,

    /// Number of administrators fetched per page.
    #[arg(long, value_name = "COUNT", global = true)]
    pub admin_page_size: Option<u64>,

    /// Log a summary of the collected metrics before exiting.
    #[arg(long, global = true)]
    pub log_metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the addresses the scenario's action resolves to.
    Resolve {
        /// Path to the scenario JSON file.
        scenario: PathBuf,
        /// The channel to resolve addresses for.
        #[arg(long, value_enum)]
        channel: ChannelType,
    },
    /// Print the persons the scenario's task assignees expand to.
    Assignees {
        /// Path to the scenario JSON file.
        scenario: PathBuf,
    },
    /// Deliver a payload to every webhook target of the scenario's event.
    Dispatch {
        /// Path to the scenario JSON file.
        scenario: PathBuf,
        /// The webhook channel to deliver through.
        #[arg(long, value_enum)]
        channel: ChannelType,
        /// JSON payload to post; defaults to the event itself.
        #[arg(long, value_name = "FILE")]
        payload: Option<PathBuf>,
        /// Destination id to record health under; overrides the scenario.
        #[arg(long, value_name = "UUID")]
        destination: Option<Uuid>,
    },
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        // `--log-metrics` can only switch the summary on.
        if self.log_metrics {
            dict.insert("log_metrics".into(), Value::from(true));
        }

        let mut http = Dict::new();
        if let Some(seconds) = self.connect_timeout {
            http.insert("connect_timeout_seconds".into(), Value::from(seconds));
        }
        if let Some(seconds) = self.read_timeout {
            http.insert("read_timeout_seconds".into(), Value::from(seconds));
        }
        if !http.is_empty() {
            dict.insert("http".into(), Value::from(http));
        }

        if let Some(size) = self.admin_page_size {
            let mut resolution = Dict::new();
            resolution.insert("admin_page_size".into(), Value::from(size));
            dict.insert("resolution".into(), Value::from(resolution));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_given_flags_are_provided() {
        let cli = Cli::parse_from(["fanout", "--read-timeout", "30", "assignees", "s.json"]);

        let data = cli.data().unwrap();
        let dict = &data[&Profile::Default];

        assert_eq!(dict.len(), 1);
        let http = dict["http"].as_dict().unwrap();
        assert_eq!(http.len(), 1);
        assert_eq!(http["read_timeout_seconds"].to_u128(), Some(30));
    }

    #[test]
    fn test_channel_parses_kebab_case() {
        let cli = Cli::parse_from(["fanout", "resolve", "s.json", "--channel", "ms-teams"]);

        match cli.command {
            Command::Resolve { channel, .. } => assert_eq!(channel, ChannelType::MsTeams),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
