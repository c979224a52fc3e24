// Copyright (c) 2025 - Cowboy AI, Inc.
//! Discovery Log Store
//!
//! Every query attempt against a target becomes one [`DiscoveryLog`]. Logs
//! are the system of record: parsing and ingestion read from them, and any
//! subset can be replayed later without touching the devices again.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator ──append──▶ LogStore ──list/get──▶ ParseStage ──mark_parsed──▶ LogStore
//!                              │
//!                              └──list/get──▶ IngestDispatcher ──mark_ingested──▶ LogStore
//! ```
//!
//! # Store Requirements
//!
//! 1. **Append-Only**: logs are never deleted; re-running discovery appends
//! 2. **Immutable Payload**: only `parsed`, `parsed_output` and `ingested` change
//! 3. **Flag Ordering**: `ingested` implies `parsed`
//! 4. **Replay Order**: listings come back ordered by `(order, created_at, id)`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::domain::{DiscoverableId, EntityId, Platform};
use crate::errors::{LogStoreError, QueryError};

pub mod memory;
pub mod nats;

pub use memory::InMemoryLogStore;
pub use nats::{NatsLogStore, NatsLogStoreConfig};

/// Discovery log identity
pub type LogId = EntityId<DiscoveryLog>;

/// One structured record produced by a template
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Order assigned to steps without an explicit priority
pub const DEFAULT_ORDER: u32 = 128;

/// Raw query payload
///
/// Opaque to everything except the template registered for the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawOutput {
    /// Free-text CLI output
    Text(String),
    /// Structured API output
    Json(serde_json::Value),
    /// The query itself failed
    Failed(QueryError),
}

impl RawOutput {
    pub fn is_success(&self) -> bool {
        !matches!(self, RawOutput::Failed(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawOutput::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&QueryError> {
        match self {
            RawOutput::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Per-log execution details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDetails {
    /// Whether the target platform supports the command
    #[serde(default = "default_supported")]
    pub supported: bool,

    /// Output is a configuration dump
    #[serde(default)]
    pub configuration: bool,

    /// VRF the command was scoped to
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vrf: Option<String>,

    /// Certificate verification used by API platforms
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub verify_cert: Option<bool>,
}

fn default_supported() -> bool {
    true
}

impl Default for LogDetails {
    fn default() -> Self {
        Self {
            supported: true,
            configuration: false,
            vrf: None,
            verify_cert: None,
        }
    }
}

/// Immutable record of one query attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryLog {
    pub id: LogId,
    pub discoverable_id: DiscoverableId,
    pub address: IpAddr,
    pub platform: Platform,
    pub command: String,
    /// Template (and ingestor) identifier; usually the command itself
    pub template: String,
    /// Execution position within one host run
    pub order: u32,
    pub raw_output: RawOutput,
    #[serde(default)]
    pub details: LogDetails,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parsed_output: Option<Vec<Record>>,
    #[serde(default)]
    pub parsed: bool,
    #[serde(default)]
    pub ingested: bool,
    pub created_at: DateTime<Utc>,
}

impl DiscoveryLog {
    pub fn is_success(&self) -> bool {
        self.raw_output.is_success()
    }

    /// Sort key used for replay and ingestion
    pub fn replay_key(&self) -> (u32, DateTime<Utc>, LogId) {
        (self.order, self.created_at, self.id)
    }
}

/// Sort logs into replay order
pub fn sort_for_replay(logs: &mut [DiscoveryLog]) {
    logs.sort_by_key(DiscoveryLog::replay_key);
}

/// Log to be appended; the store assigns id and timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDiscoveryLog {
    pub discoverable_id: DiscoverableId,
    pub address: IpAddr,
    pub platform: Platform,
    pub command: String,
    pub template: String,
    pub order: u32,
    pub raw_output: RawOutput,
    pub details: LogDetails,
}

impl NewDiscoveryLog {
    pub fn into_log(self, id: LogId, created_at: DateTime<Utc>) -> DiscoveryLog {
        DiscoveryLog {
            id,
            discoverable_id: self.discoverable_id,
            address: self.address,
            platform: self.platform,
            command: self.command,
            template: self.template,
            order: self.order,
            raw_output: self.raw_output,
            details: self.details,
            parsed_output: None,
            parsed: false,
            ingested: false,
            created_at,
        }
    }
}

/// Log selection; empty collections and `None` mean "any"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub addresses: Vec<IpAddr>,
    pub ids: Vec<LogId>,
    pub command: Option<String>,
    pub discoverable: Option<DiscoverableId>,
    pub parsed: Option<bool>,
    pub ingested: Option<bool>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn addresses(mut self, addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        self.addresses = addresses.into_iter().collect();
        self
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = LogId>) -> Self {
        self.ids = ids.into_iter().collect();
        self
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn discoverable(mut self, id: DiscoverableId) -> Self {
        self.discoverable = Some(id);
        self
    }

    pub fn parsed(mut self, parsed: bool) -> Self {
        self.parsed = Some(parsed);
        self
    }

    pub fn ingested(mut self, ingested: bool) -> Self {
        self.ingested = Some(ingested);
        self
    }

    pub fn matches(&self, log: &DiscoveryLog) -> bool {
        (self.addresses.is_empty() || self.addresses.contains(&log.address))
            && (self.ids.is_empty() || self.ids.contains(&log.id))
            && self.command.as_deref().map_or(true, |c| c == log.command)
            && self.discoverable.map_or(true, |d| d == log.discoverable_id)
            && self.parsed.map_or(true, |p| p == log.parsed)
            && self.ingested.map_or(true, |i| i == log.ingested)
    }
}

/// Discovery log persistence
///
/// Implementations must keep the flag invariants: `mark_ingested` on an
/// unparsed log fails with [`LogStoreError::NotParsed`], and neither flag
/// ever goes back to `false`.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append a new log; it starts unparsed and un-ingested
    async fn append(&self, log: NewDiscoveryLog) -> Result<DiscoveryLog, LogStoreError>;

    async fn get(&self, id: LogId) -> Result<DiscoveryLog, LogStoreError>;

    /// Matching logs in replay order
    async fn list(&self, filter: &LogFilter) -> Result<Vec<DiscoveryLog>, LogStoreError>;

    /// Store parsed output and set `parsed`
    ///
    /// A log that is already parsed keeps its first parsed output.
    async fn mark_parsed(
        &self,
        id: LogId,
        parsed_output: Vec<Record>,
    ) -> Result<DiscoveryLog, LogStoreError>;

    /// Set `ingested`
    async fn mark_ingested(&self, id: LogId) -> Result<DiscoveryLog, LogStoreError>;
}

/// Apply `mark_parsed` to a log value
pub(crate) fn apply_parsed(log: &mut DiscoveryLog, parsed_output: Vec<Record>) -> bool {
    if log.parsed {
        return false;
    }
    log.parsed_output = Some(parsed_output);
    log.parsed = true;
    true
}

/// Apply `mark_ingested` to a log value
pub(crate) fn apply_ingested(log: &mut DiscoveryLog) -> Result<bool, LogStoreError> {
    if !log.parsed {
        return Err(LogStoreError::NotParsed(log.id));
    }
    if log.ingested {
        return Ok(false);
    }
    log.ingested = true;
    Ok(true)
}
