// Copyright (c) 2025 - Cowboy AI, Inc.
//! Discovery Replay Tool
//!
//! Re-ingests stored discovery logs without querying any device. Logs are
//! read from the NATS JetStream log bucket, copied into memory and replayed
//! into an in-memory topology, so the persistent store is never modified.
//! The batch report and the resulting topology are printed as JSON.
//!
//! Run with: cargo run --bin discovery-replay
//!
//! Environment:
//! - `NATS_URL` (default `nats://localhost:4222`)
//! - `DISCOVERY_LOG_BUCKET` (default `DISCOVERY_LOGS`)
//! - `REPLAY_ADDRESSES` comma-separated host addresses
//! - `REPLAY_LOG_IDS` comma-separated log ids
//! - `REPLAY_COMMAND` single command
//! - `REPLAY_FORCE` re-ingest logs already ingested
//! - `REPLAY_CONTINUE_ON_ERROR` keep going after a failed log
//!
//! Exits non-zero when the batch halted on a failure.

use anyhow::{Context, Result};
use cim_discovery::{
    domain::{CredentialRef, Discoverable, DiscoveryStatus},
    log_store::{LogId, LogStore, NatsLogStoreConfig},
    DiscoveryConfig, DiscoverableRepository, InMemoryDiscoverableRepository, InMemoryLogStore,
    InMemoryTopologyStore, IngestDispatcher, IngestorRegistry, NatsLogStore, ReplayOptions,
    ReplaySelection, Replayer, StateTracker, TopologyStore,
};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration for the replay tool
#[derive(Debug, Clone)]
struct ReplayConfig {
    /// NATS server URL
    nats_url: String,
    /// Key-value bucket holding the logs
    bucket: String,
    /// Which logs to replay
    selection: ReplaySelection,
    /// Halt at the first failing log
    stop_on_error: bool,
}

fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_flag(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => anyhow::bail!("{} must be a boolean, got '{}'", name, other),
        },
        Err(_) => Ok(default),
    }
}

impl ReplayConfig {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let nats_url =
            std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let bucket =
            std::env::var("DISCOVERY_LOG_BUCKET").unwrap_or_else(|_| "DISCOVERY_LOGS".to_string());

        let addresses = env_list("REPLAY_ADDRESSES")
            .iter()
            .map(|a| a.parse::<IpAddr>().with_context(|| format!("Invalid address '{}'", a)))
            .collect::<Result<Vec<_>>>()?;

        let log_ids = env_list("REPLAY_LOG_IDS")
            .iter()
            .map(|id| id.parse::<LogId>().with_context(|| format!("Invalid log id '{}'", id)))
            .collect::<Result<Vec<_>>>()?;

        let mut selection = ReplaySelection::all().addresses(addresses).log_ids(log_ids);
        if let Ok(command) = std::env::var("REPLAY_COMMAND") {
            if !command.trim().is_empty() {
                selection = selection.command(command.trim());
            }
        }
        if env_flag("REPLAY_FORCE", false)? {
            selection = selection.force();
        }

        let defaults = DiscoveryConfig::from_env().context("Invalid discovery configuration")?;
        let continue_on_error = env_flag("REPLAY_CONTINUE_ON_ERROR", !defaults.stop_on_error)?;

        Ok(Self {
            nats_url,
            bucket,
            selection,
            stop_on_error: !continue_on_error,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("🚀 Starting discovery replay");

    // Load configuration
    let config = ReplayConfig::from_env()?;
    info!("📋 Configuration loaded:");
    info!("  - NATS URL: {}", config.nats_url);
    info!("  - Bucket: {}", config.bucket);
    info!("  - Addresses: {:?}", config.selection.addresses);
    info!("  - Log ids: {}", config.selection.log_ids.len());
    info!("  - Command: {:?}", config.selection.command);
    info!("  - Force: {}", config.selection.force);
    info!("  - Stop on error: {}", config.stop_on_error);

    // Connect to the log store
    info!("🔌 Connecting to NATS at {}", config.nats_url);
    let source = NatsLogStore::connect(NatsLogStoreConfig {
        url: config.nats_url.clone(),
        bucket: config.bucket.clone(),
        ..Default::default()
    })
    .await
    .context("Failed to open discovery log store")?;
    info!("✅ Connected to NATS");

    // Copy the selection into memory so the replay leaves the bucket untouched
    let logs = source
        .list(&config.selection.filter())
        .await
        .context("Failed to list discovery logs")?;
    info!("📥 Loaded {} logs", logs.len());

    let log_store = Arc::new(InMemoryLogStore::new());
    let repository = Arc::new(InMemoryDiscoverableRepository::new());
    let mut seen = HashSet::new();

    for log in logs {
        if seen.insert(log.discoverable_id) {
            let mut discoverable =
                Discoverable::new(log.address, log.platform, CredentialRef::new("replay"));
            discoverable.id = log.discoverable_id;
            discoverable.status = DiscoveryStatus::Discovered;
            if let Err(e) = repository.register(discoverable).await {
                warn!("⚠️  Skipping discoverable {}: {}", log.address, e);
            }
        }
        log_store.insert(log).await;
    }

    let topology = Arc::new(InMemoryTopologyStore::new());
    let dispatcher = IngestDispatcher::new(
        Arc::new(IngestorRegistry::with_builtins()),
        log_store.clone(),
        topology.clone(),
        StateTracker::new(repository),
    );
    let replayer = Replayer::new(log_store, dispatcher);

    let report = replayer
        .replay(
            &config.selection,
            ReplayOptions {
                stop_on_error: config.stop_on_error,
            },
        )
        .await
        .context("Replay failed")?;

    let snapshot = topology.snapshot().await.context("Failed to read topology")?;

    let output = serde_json::json!({
        "report": report,
        "topology": snapshot,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if let Some(log_id) = report.halted_at {
        anyhow::bail!("Replay halted at log {}", log_id);
    }

    info!(
        "✅ Replay finished: {} ingested, {} skipped, {} failed",
        report.succeeded,
        report.skipped,
        report.failed()
    );
    Ok(())
}
