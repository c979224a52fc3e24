// Copyright (c) 2025 - Cowboy AI, Inc.
//! Service Layer for Discovery
//!
//! Wires the pipeline stages behind one facade.
//!
//! # Architecture
//!
//! ```text
//! discoverables
//!     ↓
//! Orchestrator ──append──▶ LogStore
//!     ↓                       ↓
//! StateTracker           ParseStage (parse_pending)
//!                             ↓
//!                        IngestDispatcher (ingest_pending) ──▶ TopologyStore
//! ```
//!
//! # Transaction Semantics
//!
//! Every stage is its own unit of work over the log store:
//! 1. `discover` appends logs and updates host status
//! 2. `parse_pending` parses what is not parsed yet
//! 3. `ingest_pending` ingests what is parsed but not ingested
//!
//! A failed log in one stage stays eligible for the next pass of that stage.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::batch::BatchReport;
use crate::config::DiscoveryConfig;
use crate::domain::{Discoverable, DiscoverableId};
use crate::errors::{DiscoveryResult, LogStoreError, ParseError, RepositoryError};
use crate::ingest::{IngestDispatcher, IngestMode, IngestorRegistry};
use crate::log_store::{DiscoveryLog, LogFilter, LogStore};
use crate::orchestrator::{CancelHandle, Orchestrator, ProfileRegistry, RunReport};
use crate::parse::{ParseStage, TemplateRegistry};
use crate::query::{CapabilityRegistry, CredentialResolver};
use crate::replay::Replayer;
use crate::topology::TopologyStore;
use crate::tracker::{DiscoverableRepository, StateTracker};

/// Outcome of a full discover → parse → ingest cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub run: RunReport,
    pub parse: BatchReport,
    pub ingest: BatchReport,
    pub finished_at: DateTime<Utc>,
}

/// Registries the service is built from
#[derive(Clone)]
pub struct Registries {
    pub profiles: ProfileRegistry,
    pub capabilities: CapabilityRegistry,
    pub templates: TemplateRegistry,
    pub ingestors: IngestorRegistry,
}

impl Registries {
    /// Built-in profiles, templates and ingestors around the given capabilities
    pub fn with_builtins(capabilities: CapabilityRegistry) -> Self {
        Self {
            profiles: ProfileRegistry::with_builtins(),
            capabilities,
            templates: TemplateRegistry::with_builtins(),
            ingestors: IngestorRegistry::with_builtins(),
        }
    }
}

/// Discovery pipeline facade
#[derive(Clone)]
pub struct DiscoveryService {
    config: DiscoveryConfig,
    log_store: Arc<dyn LogStore>,
    tracker: StateTracker,
    orchestrator: Orchestrator,
    parser: ParseStage,
    dispatcher: IngestDispatcher,
}

impl DiscoveryService {
    pub fn new(
        config: DiscoveryConfig,
        registries: Registries,
        credentials: Arc<dyn CredentialResolver>,
        log_store: Arc<dyn LogStore>,
        topology: Arc<dyn TopologyStore>,
        repository: Arc<dyn DiscoverableRepository>,
    ) -> Self {
        let tracker = StateTracker::new(repository);
        let orchestrator = Orchestrator::new(
            &config,
            registries.profiles,
            registries.capabilities,
            credentials,
            Arc::clone(&log_store),
            tracker.clone(),
        );
        let parser = ParseStage::new(Arc::new(registries.templates), Arc::clone(&log_store));
        let dispatcher = IngestDispatcher::new(
            Arc::new(registries.ingestors),
            Arc::clone(&log_store),
            topology,
            tracker.clone(),
        );

        Self {
            config,
            log_store,
            tracker,
            orchestrator,
            parser,
            dispatcher,
        }
    }

    /// Service with every built-in profile, template and ingestor registered
    pub fn with_builtins(
        config: DiscoveryConfig,
        capabilities: CapabilityRegistry,
        credentials: Arc<dyn CredentialResolver>,
        log_store: Arc<dyn LogStore>,
        topology: Arc<dyn TopologyStore>,
        repository: Arc<dyn DiscoverableRepository>,
    ) -> Self {
        Self::new(
            config,
            Registries::with_builtins(capabilities),
            credentials,
            log_store,
            topology,
            repository,
        )
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    pub fn dispatcher(&self) -> &IngestDispatcher {
        &self.dispatcher
    }

    pub fn topology(&self) -> &Arc<dyn TopologyStore> {
        self.dispatcher.topology()
    }

    pub fn replayer(&self) -> Replayer {
        Replayer::new(Arc::clone(&self.log_store), self.dispatcher.clone())
    }

    pub async fn discover(&self, discoverables: Vec<Discoverable>) -> RunReport {
        self.orchestrator.run(discoverables).await
    }

    pub async fn discover_with_cancel(
        &self,
        discoverables: Vec<Discoverable>,
        cancel: CancelHandle,
    ) -> RunReport {
        self.orchestrator.run_with_cancel(discoverables, cancel).await
    }

    /// Discover every registered discoverable
    pub async fn discover_registered(&self) -> Result<RunReport, RepositoryError> {
        let discoverables = self.tracker.repository().list().await?;
        Ok(self.discover(discoverables).await)
    }

    pub async fn parse_pending(&self) -> Result<BatchReport, ParseError> {
        self.parser.parse_pending(LogFilter::new()).await
    }

    /// Ingest every parsed, not yet ingested log
    ///
    /// Hosts run concurrently up to `ingest_concurrency`; the logs of one
    /// host are ingested in replay order. Failures never stop the batch.
    pub async fn ingest_pending(&self) -> Result<BatchReport, LogStoreError> {
        let logs = self
            .log_store
            .list(&LogFilter::new().parsed(true).ingested(false))
            .await?;
        let hosts = group_by_discoverable(logs);
        let host_count = hosts.len();

        let reports: Vec<BatchReport> = stream::iter(hosts)
            .map(|(_, logs)| {
                let dispatcher = self.dispatcher.clone();
                async move {
                    dispatcher
                        .ingest_sequence(&logs, IngestMode::Pending, false)
                        .await
                }
            })
            .buffer_unordered(self.config.ingest_concurrency.max(1))
            .collect()
            .await;

        let mut report = BatchReport::new();
        for host in reports {
            report.merge(host);
        }

        info!(
            hosts = host_count,
            attempted = report.attempted,
            ingested = report.succeeded,
            skipped = report.skipped,
            failed = report.failed(),
            "Ingest pass finished"
        );
        Ok(report)
    }

    /// Discover, then parse and ingest everything pending
    pub async fn discover_and_ingest(
        &self,
        discoverables: Vec<Discoverable>,
    ) -> DiscoveryResult<CycleReport> {
        let run = self.discover(discoverables).await;
        let parse = self.parse_pending().await?;
        let ingest = self.ingest_pending().await?;

        Ok(CycleReport {
            run,
            parse,
            ingest,
            finished_at: Utc::now(),
        })
    }
}

/// Split logs per discoverable, keeping replay order inside each group
fn group_by_discoverable(logs: Vec<DiscoveryLog>) -> Vec<(DiscoverableId, Vec<DiscoveryLog>)> {
    let mut groups: Vec<(DiscoverableId, Vec<DiscoveryLog>)> = Vec::new();
    for log in logs {
        match groups.iter_mut().find(|(id, _)| *id == log.discoverable_id) {
            Some((_, group)) => group.push(log),
            None => groups.push((log.discoverable_id, vec![log])),
        }
    }
    groups
}
