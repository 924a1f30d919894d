//! Fanout - Event notification fan-out
//!
//! Resolves the recipients of a change event described by a scenario file and
//! delivers the notification to their webhooks.

use anyhow::{Context, Result};
use clap::Parser;
use fanout::{
    cli::{Cli, Command},
    config::Config,
    delivery::{DeliveryDispatcher, DestinationRegistry, WebhookClient},
    internal_metrics::{self, LoggingRecorder},
    recipients::RecipientResolver,
    scenario::Scenario,
};
use serde_json::{json, Value};
use std::{path::Path, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let summary = if config.log_metrics {
        let (recorder, summary) = LoggingRecorder::new();
        metrics::set_global_recorder(recorder)
            .map_err(|_| anyhow::anyhow!("a metrics recorder is already installed"))?;
        Some(summary)
    } else {
        None
    };
    internal_metrics::describe();

    info!(
        connect_timeout_seconds = config.http.connect_timeout_seconds,
        read_timeout_seconds = config.http.read_timeout_seconds,
        admin_page_size = config.resolution.admin_page_size,
        "Fanout starting"
    );

    let result = run(cli.command, &config).await;

    if let Some(summary) = summary {
        summary.log();
    }
    result
}

async fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Resolve { scenario, channel } => {
            let scenario = Scenario::load(&scenario)?;
            let resolver = resolver_for(&scenario, config);
            let receivers = resolver
                .build_receiver_list(
                    &scenario.action,
                    channel,
                    scenario.event.entity_id,
                    &scenario.event.entity_type,
                )
                .await;
            if !receivers.faults.is_empty() {
                warn!(
                    faults = receivers.faults.len(),
                    "Some recipient categories could not be resolved"
                );
            }
            for address in receivers.sorted() {
                println!("{address}");
            }
        }
        Command::Assignees { scenario } => {
            let scenario = Scenario::load(&scenario)?;
            let resolver = resolver_for(&scenario, config);
            let mut persons: Vec<Uuid> = resolver
                .task_assignees(&scenario.task_assignees)
                .await
                .into_iter()
                .collect();
            persons.sort();
            for person in persons {
                println!("{person}");
            }
        }
        Command::Dispatch {
            scenario,
            channel,
            payload,
            destination,
        } => {
            let scenario = Scenario::load(&scenario)?;
            let payload = match payload {
                Some(path) => read_payload(&path)?,
                None => serde_json::to_value(&scenario.event)?,
            };
            let client = Arc::new(WebhookClient::from_config(&config.http)?);
            let dispatcher = DeliveryDispatcher::new(resolver_for(&scenario, config), client);

            let registry = DestinationRegistry::new();
            let destination_id = destination
                .or(scenario.destination)
                .unwrap_or_else(Uuid::new_v4);
            let destination = registry.register(destination_id);

            let report = dispatcher
                .dispatch(&destination, &scenario.action, channel, &scenario.event, &payload)
                .await?;
            let output = json!({
                "report": report,
                "health": destination.snapshot(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn resolver_for(scenario: &Scenario, config: &Config) -> RecipientResolver {
    let directory = Arc::new(scenario.directory());
    RecipientResolver::new(directory.clone(), directory)
        .with_admin_page_size(config.resolution.admin_page_size)
}

fn read_payload(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read payload {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON payload {:?}", path))
}
