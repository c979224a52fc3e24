// Copyright (c) 2025 - Cowboy AI, Inc.
//! Ingestor Dispatcher
//!
//! Reconciles parsed discovery logs into the topology. Ingestors are pure
//! functions from records to a [`ChangeSet`]; the dispatcher owns every side
//! effect around them:
//!
//! 1. check the log is parsed (and not yet ingested, unless forced)
//! 2. pick the ingestor registered for `(platform, template)`
//! 3. apply the change set to the topology store in one unit
//! 4. bind the discoverable to the device its output resolved to
//! 5. mark the log ingested
//!
//! A failure at any step leaves the log un-ingested so a later pass can
//! retry it.

pub mod device;
pub mod hostname;
pub mod interfaces;
pub mod routes;
pub mod vlans;
pub mod vsphere;

pub use device::InventoryIngestor;
pub use hostname::HostnameIngestor;
pub use interfaces::IpInterfaceIngestor;
pub use routes::RouteIngestor;
pub use vlans::VlanBriefIngestor;
pub use vsphere::VsphereIngestor;

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::batch::{BatchReport, Stage};
use crate::domain::{Discoverable, Platform};
use crate::errors::{IngestError, RepositoryError};
use crate::log_store::{DiscoveryLog, LogId, LogStore, Record};
use crate::topology::{AppliedChanges, ApplyContext, ChangeSet, TopologyStore};
use crate::tracker::StateTracker;

/// What an ingestor sees besides the records
#[derive(Debug, Clone, Copy)]
pub struct IngestContext<'a> {
    pub discoverable: &'a Discoverable,
    pub log: &'a DiscoveryLog,
}

/// Records → topology upserts
pub trait Ingestor: Send + Sync {
    /// Template identifier this ingestor consumes
    fn template(&self) -> &str;

    fn ingest(&self, records: &[Record], context: &IngestContext<'_>)
        -> Result<ChangeSet, IngestError>;
}

/// Ingestors keyed by platform and template identifier
#[derive(Clone, Default)]
pub struct IngestorRegistry {
    ingestors: HashMap<(Platform, String), Arc<dyn Ingestor>>,
}

impl IngestorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        for platform in [Platform::CiscoIos, Platform::CiscoNxos, Platform::CiscoXr] {
            registry.register(platform, Arc::new(HostnameIngestor));
            registry.register(platform, Arc::new(InventoryIngestor));
        }
        for platform in [Platform::CiscoIos, Platform::CiscoNxos] {
            registry.register(platform, Arc::new(VlanBriefIngestor));
            registry.register(platform, Arc::new(RouteIngestor::new(RouteIngestor::IOS)));
        }
        registry.register(
            Platform::CiscoXr,
            Arc::new(RouteIngestor::new(RouteIngestor::XR)),
        );
        registry.register(Platform::CiscoIos, Arc::new(IpInterfaceIngestor));
        registry.register(Platform::VmwareVsphere, Arc::new(VsphereIngestor));

        registry
    }

    pub fn register(&mut self, platform: Platform, ingestor: Arc<dyn Ingestor>) {
        self.ingestors
            .insert((platform, ingestor.template().to_string()), ingestor);
    }

    pub fn lookup(&self, platform: Platform, template: &str) -> Result<Arc<dyn Ingestor>, IngestError> {
        self.ingestors
            .get(&(platform, template.to_string()))
            .cloned()
            .ok_or_else(|| IngestError::IngestorNotFound {
                platform,
                command: template.to_string(),
            })
    }
}

/// Whether already-ingested logs are processed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    #[default]
    Pending,
    Force,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestSkip {
    NoIngestor,
}

impl fmt::Display for IngestSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestSkip::NoIngestor => write!(f, "no ingestor"),
        }
    }
}

/// Outcome of ingesting one log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Ingested(AppliedChanges),
    AlreadyIngested,
    Skipped(IngestSkip),
}

/// Records-to-topology driver
#[derive(Clone)]
pub struct IngestDispatcher {
    ingestors: Arc<IngestorRegistry>,
    log_store: Arc<dyn LogStore>,
    topology: Arc<dyn TopologyStore>,
    tracker: StateTracker,
}

impl IngestDispatcher {
    pub fn new(
        ingestors: Arc<IngestorRegistry>,
        log_store: Arc<dyn LogStore>,
        topology: Arc<dyn TopologyStore>,
        tracker: StateTracker,
    ) -> Self {
        Self {
            ingestors,
            log_store,
            topology,
            tracker,
        }
    }

    pub fn topology(&self) -> &Arc<dyn TopologyStore> {
        &self.topology
    }

    pub async fn ingest(&self, id: LogId, mode: IngestMode) -> Result<IngestOutcome, IngestError> {
        let log = self.log_store.get(id).await?;
        self.ingest_log(&log, mode).await
    }

    pub async fn ingest_log(
        &self,
        log: &DiscoveryLog,
        mode: IngestMode,
    ) -> Result<IngestOutcome, IngestError> {
        if !log.parsed {
            return Err(IngestError::NotParsed(log.id));
        }
        if log.ingested && mode == IngestMode::Pending {
            return Ok(IngestOutcome::AlreadyIngested);
        }

        let ingestor = match self.ingestors.lookup(log.platform, &log.template) {
            Ok(ingestor) => ingestor,
            Err(IngestError::IngestorNotFound { .. }) => {
                debug!(log_id = %log.id, template = %log.template, "No ingestor registered");
                return Ok(IngestOutcome::Skipped(IngestSkip::NoIngestor));
            }
            Err(e) => return Err(e),
        };

        let discoverable = self
            .tracker
            .repository()
            .get(log.discoverable_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(id) => IngestError::DiscoverableNotFound(id),
                other => IngestError::Repository(other),
            })?;

        let records = log.parsed_output.as_deref().unwrap_or_default();
        let context = IngestContext {
            discoverable: &discoverable,
            log,
        };
        let changes = ingestor.ingest(records, &context)?;

        let applied = self
            .topology
            .apply(
                &changes,
                &ApplyContext {
                    discoverable_id: discoverable.id,
                    address: discoverable.address,
                    device: discoverable.device,
                },
            )
            .await?;

        if let Some(device) = applied.bound_device {
            if discoverable.device != Some(device) {
                self.tracker.bind_device(discoverable.id, device).await?;
                info!(discoverable = %discoverable, device = %device, "Bound discoverable to device");
            }
        }

        self.log_store.mark_ingested(log.id).await?;

        debug!(
            log_id = %log.id,
            command = %log.command,
            created = applied.created,
            updated = applied.updated,
            "Ingested log"
        );
        Ok(IngestOutcome::Ingested(applied))
    }

    /// Ingest `logs` one after another in the given order
    ///
    /// With `stop_on_error` the first failure ends the batch and is recorded
    /// as `halted_at`.
    pub async fn ingest_sequence(
        &self,
        logs: &[DiscoveryLog],
        mode: IngestMode,
        stop_on_error: bool,
    ) -> BatchReport {
        let mut report = BatchReport::new();

        for log in logs {
            match self.ingest_log(log, mode).await {
                Ok(IngestOutcome::Ingested(_)) => report.record_success(),
                Ok(_) => report.record_skip(),
                Err(e) => {
                    warn!(
                        log_id = %log.id,
                        address = %log.address,
                        command = %log.command,
                        error = %e,
                        "Ingest failed"
                    );
                    report.record_failure(log, Stage::Ingest, e);
                    if stop_on_error {
                        report.halted_at = Some(log.id);
                        break;
                    }
                }
            }
        }

        report
    }
}

/// String field of a record; empty strings count as absent
pub(crate) fn str_field<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub(crate) fn require_str<'a>(
    record: &'a Record,
    field: &str,
    context: &str,
) -> Result<&'a str, IngestError> {
    str_field(record, field).ok_or_else(|| IngestError::MissingField {
        field: field.to_string(),
        context: context.to_string(),
    })
}

/// String list field of a record; a missing field is an empty list
pub(crate) fn str_list<'a>(record: &'a Record, field: &str) -> Vec<&'a str> {
    match record.get(field) {
        Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(value)) if !value.is_empty() => vec![value.as_str()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::CredentialRef;
    use crate::log_store::{LogDetails, NewDiscoveryLog, RawOutput};
    use serde_json::json;

    pub fn discoverable(platform: Platform) -> Discoverable {
        Discoverable::new("10.0.0.1".parse().unwrap(), platform, CredentialRef::new("lab"))
    }

    pub fn log_for(discoverable: &Discoverable, template: &str) -> DiscoveryLog {
        NewDiscoveryLog {
            discoverable_id: discoverable.id,
            address: discoverable.address,
            platform: discoverable.platform,
            command: template.to_string(),
            template: template.to_string(),
            order: 0,
            raw_output: RawOutput::Text(String::new()),
            details: LogDetails::default(),
        }
        .into_log(LogId::new(), chrono::Utc::now())
    }

    pub fn records(value: Value) -> Vec<Record> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            Value::Object(map) => vec![map],
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_records_helper() {
        assert_eq!(records(json!([{"a": 1}, 2])).len(), 1);
    }
}
