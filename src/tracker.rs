// Copyright (c) 2025 - Cowboy AI, Inc.
//! Discoverable State Tracker
//!
//! Discoverables live in an external repository. The tracker is the only
//! writer the pipeline uses: it moves host status through the
//! [`DiscoveryStatus`] state machine after a run and binds each discoverable
//! to the device its output resolved to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::{DeviceId, Discoverable, DiscoverableId, DiscoveryStatus, Platform};
use crate::errors::RepositoryError;
use crate::state_machine::discovery_status::DiscoveryOutcome;
use crate::state_machine::StateMachine;

/// In-place change applied under the repository's write lock
pub type DiscoverableChange =
    Box<dyn FnOnce(&mut Discoverable) -> Result<(), RepositoryError> + Send>;

/// Discoverable persistence
#[async_trait]
pub trait DiscoverableRepository: Send + Sync {
    /// Register a new discoverable; `(address, platform)` must be unique
    async fn register(&self, discoverable: Discoverable) -> Result<Discoverable, RepositoryError>;

    async fn get(&self, id: DiscoverableId) -> Result<Discoverable, RepositoryError>;

    async fn find(
        &self,
        address: IpAddr,
        platform: Platform,
    ) -> Result<Option<Discoverable>, RepositoryError>;

    async fn list(&self) -> Result<Vec<Discoverable>, RepositoryError>;

    /// Atomically modify one discoverable
    async fn update(
        &self,
        id: DiscoverableId,
        change: DiscoverableChange,
    ) -> Result<Discoverable, RepositoryError>;
}

/// Discoverables held in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryDiscoverableRepository {
    discoverables: Arc<RwLock<HashMap<DiscoverableId, Discoverable>>>,
}

impl InMemoryDiscoverableRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiscoverableRepository for InMemoryDiscoverableRepository {
    async fn register(&self, discoverable: Discoverable) -> Result<Discoverable, RepositoryError> {
        let mut discoverables = self.discoverables.write().await;

        let duplicate = discoverables.values().any(|existing| {
            existing.address == discoverable.address && existing.platform == discoverable.platform
        });
        if duplicate {
            return Err(RepositoryError::Duplicate(discoverable.to_string()));
        }

        discoverables.insert(discoverable.id, discoverable.clone());
        Ok(discoverable)
    }

    async fn get(&self, id: DiscoverableId) -> Result<Discoverable, RepositoryError> {
        self.discoverables
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn find(
        &self,
        address: IpAddr,
        platform: Platform,
    ) -> Result<Option<Discoverable>, RepositoryError> {
        Ok(self
            .discoverables
            .read()
            .await
            .values()
            .find(|d| d.address == address && d.platform == platform)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Discoverable>, RepositoryError> {
        let mut discoverables: Vec<Discoverable> =
            self.discoverables.read().await.values().cloned().collect();
        discoverables.sort_by_key(|d| (d.address, d.platform));
        Ok(discoverables)
    }

    async fn update(
        &self,
        id: DiscoverableId,
        change: DiscoverableChange,
    ) -> Result<Discoverable, RepositoryError> {
        let mut discoverables = self.discoverables.write().await;
        let current = discoverables
            .get(&id)
            .ok_or(RepositoryError::NotFound(id))?;

        // Apply to a copy so a rejected change leaves the record untouched
        let mut updated = current.clone();
        change(&mut updated)?;
        discoverables.insert(id, updated.clone());
        Ok(updated)
    }
}

/// Host status bookkeeping
#[derive(Clone)]
pub struct StateTracker {
    repository: Arc<dyn DiscoverableRepository>,
}

impl StateTracker {
    pub fn new(repository: Arc<dyn DiscoverableRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn DiscoverableRepository> {
        &self.repository
    }

    /// Record the outcome of one orchestration run for a host
    pub async fn record_run(
        &self,
        id: DiscoverableId,
        outcome: DiscoveryOutcome,
        finished_at: DateTime<Utc>,
    ) -> Result<Discoverable, RepositoryError> {
        let updated = self
            .repository
            .update(
                id,
                Box::new(move |discoverable| {
                    let (status, change) = discoverable.status.transition(&outcome)?;
                    for warning in change.warnings {
                        warn!(discoverable = %discoverable, "{}", warning);
                    }
                    discoverable.status = status;
                    discoverable.last_discovered_at = Some(finished_at);
                    Ok(())
                }),
            )
            .await?;

        info!(
            discoverable = %updated,
            status = %updated.status,
            "Recorded discovery outcome"
        );
        Ok(updated)
    }

    /// Send a host back to pending
    pub async fn requeue(&self, id: DiscoverableId) -> Result<Discoverable, RepositoryError> {
        self.repository
            .update(
                id,
                Box::new(|discoverable| {
                    let (status, _) = discoverable.status.transition(&DiscoveryOutcome::Requeue)?;
                    discoverable.status = status;
                    Ok(())
                }),
            )
            .await
    }

    /// Point a discoverable at the device its output resolved to
    pub async fn bind_device(
        &self,
        id: DiscoverableId,
        device: DeviceId,
    ) -> Result<Discoverable, RepositoryError> {
        self.repository
            .update(
                id,
                Box::new(move |discoverable| {
                    discoverable.device = Some(device);
                    Ok(())
                }),
            )
            .await
    }

    pub async fn status(&self, id: DiscoverableId) -> Result<DiscoveryStatus, RepositoryError> {
        Ok(self.repository.get(id).await?.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CredentialRef;

    async fn tracker_with_host() -> (StateTracker, DiscoverableId) {
        let repository = Arc::new(InMemoryDiscoverableRepository::new());
        let discoverable = repository
            .register(Discoverable::new(
                "10.0.0.1".parse().unwrap(),
                Platform::CiscoIos,
                CredentialRef::new("lab"),
            ))
            .await
            .unwrap();
        (StateTracker::new(repository), discoverable.id)
    }

    #[tokio::test]
    async fn test_record_run_moves_status() {
        let (tracker, id) = tracker_with_host().await;
        let now = Utc::now();

        let updated = tracker
            .record_run(id, DiscoveryOutcome::Succeeded, now)
            .await
            .unwrap();
        assert_eq!(updated.status, DiscoveryStatus::Discovered);
        assert_eq!(updated.last_discovered_at, Some(now));

        let updated = tracker
            .record_run(id, DiscoveryOutcome::Failed, now)
            .await
            .unwrap();
        assert_eq!(updated.status, DiscoveryStatus::Failed);
    }

    #[tokio::test]
    async fn test_requeue_pending_is_rejected() {
        let (tracker, id) = tracker_with_host().await;

        let result = tracker.requeue(id).await;
        assert!(matches!(result, Err(RepositoryError::Transition(_))));
        assert_eq!(tracker.status(id).await.unwrap(), DiscoveryStatus::Pending);
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let repository = InMemoryDiscoverableRepository::new();
        let address = "10.0.0.1".parse().unwrap();

        repository
            .register(Discoverable::new(address, Platform::CiscoIos, CredentialRef::new("a")))
            .await
            .unwrap();

        // Same address through another platform is a different discoverable
        repository
            .register(Discoverable::new(address, Platform::CiscoNxos, CredentialRef::new("a")))
            .await
            .unwrap();

        let result = repository
            .register(Discoverable::new(address, Platform::CiscoIos, CredentialRef::new("b")))
            .await;
        assert!(matches!(result, Err(RepositoryError::Duplicate(_))));
    }
}
