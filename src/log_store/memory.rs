// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory discovery log store

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{
    apply_ingested, apply_parsed, sort_for_replay, DiscoveryLog, LogFilter, LogId, LogStore,
    NewDiscoveryLog, Record,
};
use crate::errors::LogStoreError;

/// Log store held in process memory
///
/// Cloning shares the underlying storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLogStore {
    logs: Arc<RwLock<HashMap<LogId, DiscoveryLog>>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed log, e.g. one imported from another store
    pub async fn insert(&self, log: DiscoveryLog) {
        self.logs.write().await.insert(log.id, log);
    }

    pub async fn len(&self) -> usize {
        self.logs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.logs.read().await.is_empty()
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn append(&self, log: NewDiscoveryLog) -> Result<DiscoveryLog, LogStoreError> {
        let log = log.into_log(LogId::new(), Utc::now());
        self.logs.write().await.insert(log.id, log.clone());
        Ok(log)
    }

    async fn get(&self, id: LogId) -> Result<DiscoveryLog, LogStoreError> {
        self.logs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(LogStoreError::NotFound(id))
    }

    async fn list(&self, filter: &LogFilter) -> Result<Vec<DiscoveryLog>, LogStoreError> {
        let mut logs: Vec<DiscoveryLog> = self
            .logs
            .read()
            .await
            .values()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect();
        sort_for_replay(&mut logs);
        Ok(logs)
    }

    async fn mark_parsed(
        &self,
        id: LogId,
        parsed_output: Vec<Record>,
    ) -> Result<DiscoveryLog, LogStoreError> {
        let mut logs = self.logs.write().await;
        let log = logs.get_mut(&id).ok_or(LogStoreError::NotFound(id))?;
        apply_parsed(log, parsed_output);
        Ok(log.clone())
    }

    async fn mark_ingested(&self, id: LogId) -> Result<DiscoveryLog, LogStoreError> {
        let mut logs = self.logs.write().await;
        let log = logs.get_mut(&id).ok_or(LogStoreError::NotFound(id))?;
        apply_ingested(log)?;
        Ok(log.clone())
    }
}
