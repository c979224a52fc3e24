// Copyright (c) 2025 - Cowboy AI, Inc.
//! Log Replay
//!
//! Re-runs ingestion over already-parsed logs without querying any device.
//! Selection narrows by host address set, then log id set, then command;
//! every criterion left empty matches everything. Logs are processed in
//! replay order `(order, created_at, id)`.
//!
//! By default the first failure halts the batch so the operator can fix
//! the ingestor and replay again from the same point.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::batch::BatchReport;
use crate::errors::LogStoreError;
use crate::ingest::{IngestDispatcher, IngestMode};
use crate::log_store::{LogFilter, LogId, LogStore};

/// Which logs to replay
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySelection {
    #[serde(default)]
    pub addresses: Vec<IpAddr>,
    #[serde(default)]
    pub log_ids: Vec<LogId>,
    #[serde(default)]
    pub command: Option<String>,
    /// Re-ingest logs already marked ingested
    #[serde(default)]
    pub force: bool,
}

impl ReplaySelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn addresses(mut self, addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        self.addresses.extend(addresses);
        self
    }

    pub fn log_ids(mut self, ids: impl IntoIterator<Item = LogId>) -> Self {
        self.log_ids.extend(ids);
        self
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Log filter for this selection; only parsed logs are replayable
    pub fn filter(&self) -> LogFilter {
        let mut filter = LogFilter::new().parsed(true);
        if !self.addresses.is_empty() {
            filter = filter.addresses(self.addresses.iter().copied());
        }
        if !self.log_ids.is_empty() {
            filter = filter.ids(self.log_ids.iter().copied());
        }
        if let Some(command) = &self.command {
            filter = filter.command(command.clone());
        }
        if !self.force {
            filter = filter.ingested(false);
        }
        filter
    }

    pub fn mode(&self) -> IngestMode {
        if self.force {
            IngestMode::Force
        } else {
            IngestMode::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayOptions {
    pub stop_on_error: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            stop_on_error: true,
        }
    }
}

/// Ingestion replay over stored logs
#[derive(Clone)]
pub struct Replayer {
    log_store: Arc<dyn LogStore>,
    dispatcher: IngestDispatcher,
}

impl Replayer {
    pub fn new(log_store: Arc<dyn LogStore>, dispatcher: IngestDispatcher) -> Self {
        Self {
            log_store,
            dispatcher,
        }
    }

    pub async fn replay(
        &self,
        selection: &ReplaySelection,
        options: ReplayOptions,
    ) -> Result<BatchReport, LogStoreError> {
        let logs = self.log_store.list(&selection.filter()).await?;
        info!(
            logs = logs.len(),
            force = selection.force,
            stop_on_error = options.stop_on_error,
            "Replaying discovery logs"
        );

        let report = self
            .dispatcher
            .ingest_sequence(&logs, selection.mode(), options.stop_on_error)
            .await;

        match report.halted_at {
            Some(log_id) => warn!(%log_id, "Replay halted on failure"),
            None => info!(
                attempted = report.attempted,
                ingested = report.succeeded,
                skipped = report.skipped,
                failed = report.failed(),
                "Replay finished"
            ),
        }
        Ok(report)
    }
}
