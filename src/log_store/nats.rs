// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS JetStream Log Store Implementation
//!
//! Persists discovery logs in a JetStream key-value bucket, one key per log:
//!
//! ```text
//! DISCOVERY_LOGS
//!   log.<uuid>  →  DiscoveryLog (JSON)
//! ```
//!
//! Flag updates read the entry, apply the change and write it back with the
//! entry revision as an optimistic concurrency check, retrying when another
//! writer got there first.

use async_nats::jetstream::{self, kv, stream::StorageType};
use async_nats::ConnectOptions;
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    apply_ingested, apply_parsed, sort_for_replay, DiscoveryLog, LogFilter, LogId, LogStore,
    NewDiscoveryLog, Record,
};
use crate::errors::LogStoreError;

const KEY_PREFIX: &str = "log.";
const MAX_UPDATE_ATTEMPTS: usize = 5;

/// Configuration for the JetStream-backed log store
#[derive(Debug, Clone)]
pub struct NatsLogStoreConfig {
    /// NATS server URL
    pub url: String,
    /// Client name
    pub name: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Key-value bucket holding the logs
    pub bucket: String,
    /// Revisions kept per key
    pub history: i64,
    /// Storage type (file survives restarts)
    pub storage: StorageType,
}

impl Default for NatsLogStoreConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            name: "cim-discovery".to_string(),
            connect_timeout: Duration::from_secs(10),
            bucket: "DISCOVERY_LOGS".to_string(),
            history: 5,
            storage: StorageType::File,
        }
    }
}

/// JetStream key-value backed log store
///
/// # Example
///
/// ```rust,no_run
/// use cim_discovery::log_store::{NatsLogStore, NatsLogStoreConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = NatsLogStore::connect(NatsLogStoreConfig::default()).await?;
///     // Use store...
///     Ok(())
/// }
/// ```
pub struct NatsLogStore {
    kv: kv::Store,
}

impl NatsLogStore {
    /// Connect to NATS and open (or create) the log bucket
    pub async fn connect(config: NatsLogStoreConfig) -> Result<Self, LogStoreError> {
        let options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout);

        let client = async_nats::connect_with_options(config.url.as_str(), options)
            .await
            .map_err(|e| LogStoreError::Connection(e.to_string()))?;

        info!("Connected to NATS at {}", config.url);

        Self::open(jetstream::new(client), &config).await
    }

    /// Open the log bucket on an existing JetStream context
    pub async fn open(
        jetstream: jetstream::Context,
        config: &NatsLogStoreConfig,
    ) -> Result<Self, LogStoreError> {
        let kv = match jetstream.get_key_value(&config.bucket).await {
            Ok(kv) => {
                debug!("Found existing log bucket: {}", config.bucket);
                kv
            }
            Err(_) => {
                info!("Log bucket '{}' not found, creating...", config.bucket);
                jetstream
                    .create_key_value(kv::Config {
                        bucket: config.bucket.clone(),
                        history: config.history,
                        storage: config.storage,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| LogStoreError::Backend(e.to_string()))?
            }
        };

        Ok(Self { kv })
    }

    fn key(id: LogId) -> String {
        format!("{}{}", KEY_PREFIX, id)
    }

    async fn read(&self, id: LogId) -> Result<Option<(DiscoveryLog, u64)>, LogStoreError> {
        let entry = self
            .kv
            .entry(Self::key(id))
            .await
            .map_err(|e| LogStoreError::Backend(e.to_string()))?;

        match entry {
            Some(entry) if !entry.value.is_empty() => {
                let log: DiscoveryLog = serde_json::from_slice(&entry.value)?;
                Ok(Some((log, entry.revision)))
            }
            _ => Ok(None),
        }
    }

    /// Read-modify-write with revision check
    ///
    /// `change` returns whether it modified the log; unmodified logs are not
    /// written back.
    async fn update<F>(&self, id: LogId, mut change: F) -> Result<DiscoveryLog, LogStoreError>
    where
        F: FnMut(&mut DiscoveryLog) -> Result<bool, LogStoreError> + Send,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let (mut log, revision) = self.read(id).await?.ok_or(LogStoreError::NotFound(id))?;

            if !change(&mut log)? {
                return Ok(log);
            }

            let payload = serde_json::to_vec(&log)?;
            match self.kv.update(Self::key(id), payload.into(), revision).await {
                Ok(_) => return Ok(log),
                Err(e) => {
                    // Only a moved revision is worth retrying
                    let current = self.read(id).await?.map(|(_, rev)| rev);
                    if current == Some(revision) {
                        return Err(LogStoreError::Backend(e.to_string()));
                    }
                    warn!(log_id = %id, attempt, "Concurrent log update, retrying");
                }
            }
        }

        Err(LogStoreError::Conflict(id))
    }
}

#[async_trait]
impl LogStore for NatsLogStore {
    async fn append(&self, log: NewDiscoveryLog) -> Result<DiscoveryLog, LogStoreError> {
        let log = log.into_log(LogId::new(), Utc::now());
        let payload = serde_json::to_vec(&log)?;

        // Expected revision 0: the key must not exist yet
        self.kv
            .update(Self::key(log.id), payload.into(), 0)
            .await
            .map_err(|e| LogStoreError::Backend(e.to_string()))?;

        debug!(log_id = %log.id, command = %log.command, "Appended discovery log");
        Ok(log)
    }

    async fn get(&self, id: LogId) -> Result<DiscoveryLog, LogStoreError> {
        self.read(id)
            .await?
            .map(|(log, _)| log)
            .ok_or(LogStoreError::NotFound(id))
    }

    async fn list(&self, filter: &LogFilter) -> Result<Vec<DiscoveryLog>, LogStoreError> {
        let mut logs = Vec::new();

        if !filter.ids.is_empty() {
            for id in &filter.ids {
                if let Some((log, _)) = self.read(*id).await? {
                    if filter.matches(&log) {
                        logs.push(log);
                    }
                }
            }
        } else {
            let keys = self
                .kv
                .keys()
                .await
                .map_err(|e| LogStoreError::Backend(e.to_string()))?;
            tokio::pin!(keys);

            while let Some(key) = keys.next().await {
                let key = key.map_err(|e| LogStoreError::Backend(e.to_string()))?;
                if !key.starts_with(KEY_PREFIX) {
                    continue;
                }

                let value = self
                    .kv
                    .get(&key)
                    .await
                    .map_err(|e| LogStoreError::Backend(e.to_string()))?;

                if let Some(value) = value.filter(|v| !v.is_empty()) {
                    let log: DiscoveryLog = serde_json::from_slice(&value)?;
                    if filter.matches(&log) {
                        logs.push(log);
                    }
                }
            }
        }

        sort_for_replay(&mut logs);
        Ok(logs)
    }

    async fn mark_parsed(
        &self,
        id: LogId,
        parsed_output: Vec<Record>,
    ) -> Result<DiscoveryLog, LogStoreError> {
        self.update(id, |log| Ok(apply_parsed(log, parsed_output.clone())))
            .await
    }

    async fn mark_ingested(&self, id: LogId) -> Result<DiscoveryLog, LogStoreError> {
        self.update(id, apply_ingested).await
    }
}
