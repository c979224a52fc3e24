// Copyright (c) 2025 - Cowboy AI, Inc.
//! Task Orchestrator
//!
//! Runs the query pipeline of many hosts concurrently and records every
//! attempt as a discovery log.
//!
//! # Architecture
//!
//! ```text
//!                   ┌──────────── global host semaphore ────────────┐
//! discoverables ──▶ │ host A: step 0 → step 1 → … → follow-ups      │ ──▶ LogStore
//!                   │ host B: step 0 → step 1 → …                   │
//!                   └──────── per-capability semaphore (opt.) ──────┘
//!                                          │
//!                                          ▼
//!                                   StateTracker (after all hosts)
//! ```
//!
//! Within one host, queries run strictly one after another and a failing
//! query never stops the next one. Every attempt is logged, with the query
//! error as payload when it failed, and log `order` values are strictly
//! increasing per host. Cancellation is observed at host boundaries only.

pub mod pipeline;
pub mod report;

pub use pipeline::{
    CiscoProfile, CompletedStep, PipelineProfile, PipelineStep, ProfileRegistry, VsphereProfile,
};
pub use report::{HostReport, QueryFailure, QueryOutcome, RunReport, SkipReason};

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::DiscoveryConfig;
use crate::domain::{Discoverable, Platform};
use crate::errors::{OrchestrationError, QueryError};
use crate::log_store::{LogStore, NewDiscoveryLog, RawOutput};
use crate::query::{
    CapabilityRegistry, CredentialResolver, Credentials, QueryCapability, QueryOptions, QueryTarget,
};
use crate::state_machine::discovery_status::DiscoveryOutcome;
use crate::tracker::StateTracker;

/// Cooperative cancellation for a run
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hosts not yet started are skipped; running pipelines finish
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Everything a host task needs, cheap to clone into a spawned task
#[derive(Clone)]
struct HostRunner {
    profiles: ProfileRegistry,
    capabilities: CapabilityRegistry,
    credentials: Arc<dyn CredentialResolver>,
    log_store: Arc<dyn LogStore>,
    query_timeout: Duration,
}

impl HostRunner {
    async fn run(&self, discoverable: Discoverable) -> HostReport {
        let mut report = HostReport::new(
            discoverable.id,
            discoverable.address,
            discoverable.platform,
        );

        let result = self.run_pipeline(&discoverable, &mut report).await;
        if let Err(e) = result {
            error!(discoverable = %discoverable, error = %e, "Host pipeline aborted");
            report = report.fail(e);
        }

        report
    }

    async fn run_pipeline(
        &self,
        discoverable: &Discoverable,
        report: &mut HostReport,
    ) -> Result<(), OrchestrationError> {
        let profile = self
            .profiles
            .get(discoverable.platform)
            .ok_or(OrchestrationError::NoProfile(discoverable.platform))?;
        let capability = self
            .capabilities
            .get(discoverable.platform)
            .ok_or(OrchestrationError::NoCapability(discoverable.platform))?;
        let credentials = self
            .credentials
            .resolve(&discoverable.credential)
            .await
            .map_err(|e| OrchestrationError::Credentials {
                credential: discoverable.credential.to_string(),
                reason: e.to_string(),
            })?;

        let target = QueryTarget {
            discoverable_id: discoverable.id,
            address: discoverable.address,
            platform: discoverable.platform,
        };

        info!(discoverable = %discoverable, "Starting host pipeline");

        let mut order = 0u32;
        let mut completed: Vec<(PipelineStep, RawOutput)> = Vec::new();

        for step in pipeline::execution_order(profile.base_steps(discoverable)) {
            let output = self
                .execute(
                    discoverable,
                    &target,
                    capability.as_ref(),
                    &credentials,
                    &step,
                    order,
                    report,
                )
                .await?;
            order += 1;
            completed.push((step, output));
        }

        let follow_ups = {
            let done: Vec<CompletedStep<'_>> = completed
                .iter()
                .map(|(step, output)| CompletedStep { step, output })
                .collect();
            pipeline::execution_order(profile.follow_up_steps(&done))
        };

        for step in follow_ups {
            self.execute(
                discoverable,
                &target,
                capability.as_ref(),
                &credentials,
                &step,
                order,
                report,
            )
            .await?;
            order += 1;
        }

        info!(
            discoverable = %discoverable,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Host pipeline finished"
        );
        Ok(())
    }

    /// Run one step and log it; only a log store failure is fatal
    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        discoverable: &Discoverable,
        target: &QueryTarget,
        capability: &dyn QueryCapability,
        credentials: &Credentials,
        step: &PipelineStep,
        order: u32,
        report: &mut HostReport,
    ) -> Result<RawOutput, OrchestrationError> {
        let options = QueryOptions {
            verify_cert: discoverable.options.verify_cert,
            vrf: step.vrf.clone(),
        };

        debug!(address = %target.address, command = %step.command, order, "Running query");

        let result = tokio::time::timeout(
            self.query_timeout,
            capability.query(target, &step.command, credentials, &options),
        )
        .await
        .unwrap_or_else(|_| Err(QueryError::Timeout(self.query_timeout.as_secs())));

        let raw_output = match result {
            Ok(output) => RawOutput::from(output),
            Err(e) => {
                warn!(
                    address = %target.address,
                    command = %step.command,
                    error = %e,
                    "Query failed"
                );
                RawOutput::Failed(e)
            }
        };

        let log = self
            .log_store
            .append(NewDiscoveryLog {
                discoverable_id: discoverable.id,
                address: discoverable.address,
                platform: discoverable.platform,
                command: step.command.clone(),
                template: step.template.clone(),
                order,
                raw_output: raw_output.clone(),
                details: step.details(discoverable),
            })
            .await?;

        report.queries.push(QueryOutcome {
            log_id: log.id,
            order,
            command: step.command.clone(),
            error: raw_output.error().cloned(),
        });

        Ok(raw_output)
    }
}

/// Concurrent multi-host discovery runner
#[derive(Clone)]
pub struct Orchestrator {
    runner: HostRunner,
    tracker: StateTracker,
    max_concurrent_hosts: usize,
}

impl Orchestrator {
    pub fn new(
        config: &DiscoveryConfig,
        profiles: ProfileRegistry,
        capabilities: CapabilityRegistry,
        credentials: Arc<dyn CredentialResolver>,
        log_store: Arc<dyn LogStore>,
        tracker: StateTracker,
    ) -> Self {
        Self {
            runner: HostRunner {
                profiles,
                capabilities,
                credentials,
                log_store,
                query_timeout: config.query_timeout(),
            },
            tracker,
            max_concurrent_hosts: config.max_concurrent_hosts.max(1),
        }
    }

    /// Run discovery for every host
    pub async fn run(&self, discoverables: Vec<Discoverable>) -> RunReport {
        self.run_with_cancel(discoverables, CancelHandle::new())
            .await
    }

    /// Run discovery, skipping hosts not yet started once `cancel` fires
    pub async fn run_with_cancel(
        &self,
        discoverables: Vec<Discoverable>,
        cancel: CancelHandle,
    ) -> RunReport {
        let started_at = Utc::now();
        let host_count = discoverables.len();
        info!(hosts = host_count, "Starting discovery run");

        let global = Arc::new(Semaphore::new(self.max_concurrent_hosts));
        let per_platform = self.capability_limits(&discoverables);

        let mut reports: Vec<Option<HostReport>> = vec![None; host_count];
        let mut tasks = JoinSet::new();
        // Slot and identity of every spawned host, so a panicked task still reports
        let mut spawned: HashMap<task::Id, (usize, HostReport)> = HashMap::new();

        for (index, discoverable) in discoverables.into_iter().enumerate() {
            if !discoverable.enabled {
                debug!(discoverable = %discoverable, "Skipping disabled discoverable");
                reports[index] = Some(
                    HostReport::new(discoverable.id, discoverable.address, discoverable.platform)
                        .skip(SkipReason::Disabled),
                );
                continue;
            }

            let base = HostReport::new(discoverable.id, discoverable.address, discoverable.platform);
            let runner = self.runner.clone();
            let global = Arc::clone(&global);
            let platform_limit = per_platform.get(&discoverable.platform).cloned();
            let cancel = cancel.clone();

            let handle = tasks.spawn(async move {
                let skipped = |d: &Discoverable| {
                    HostReport::new(d.id, d.address, d.platform).skip(SkipReason::Cancelled)
                };

                let Ok(_global_permit) = global.acquire_owned().await else {
                    return (index, skipped(&discoverable));
                };
                let _platform_permit = match platform_limit {
                    Some(limit) => match limit.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => return (index, skipped(&discoverable)),
                    },
                    None => None,
                };

                if cancel.is_cancelled() {
                    debug!(discoverable = %discoverable, "Run cancelled, skipping host");
                    return (index, skipped(&discoverable));
                }

                (index, runner.run(discoverable).await)
            });
            spawned.insert(handle.id(), (index, base));
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, (index, report))) => {
                    spawned.remove(&id);
                    reports[index] = Some(report);
                }
                Err(e) => {
                    let Some((index, base)) = spawned.remove(&e.id()) else {
                        error!(error = %e, "Untracked host task failed");
                        continue;
                    };
                    error!(address = %base.address, error = %e, "Host task panicked");
                    reports[index] = Some(base.fail(format!("host task failed: {}", e)));
                }
            }
        }

        let mut hosts: Vec<HostReport> = reports.into_iter().flatten().collect();
        let finished_at = Utc::now();

        for host in hosts.iter_mut().filter(|h| h.skipped.is_none()) {
            let outcome = if host.is_discovered() {
                DiscoveryOutcome::Succeeded
            } else {
                DiscoveryOutcome::Failed
            };

            match self
                .tracker
                .record_run(host.discoverable_id, outcome, finished_at)
                .await
            {
                Ok(updated) => host.status = Some(updated.status),
                Err(e) => error!(
                    address = %host.address,
                    error = %e,
                    "Failed to record discovery status"
                ),
            }
        }

        let report = RunReport {
            started_at,
            finished_at,
            hosts,
            cancelled: cancel.is_cancelled(),
        };

        info!(
            hosts = host_count,
            attempted = report.attempted(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Discovery run finished"
        );
        report
    }

    fn capability_limits(
        &self,
        discoverables: &[Discoverable],
    ) -> HashMap<Platform, Arc<Semaphore>> {
        let mut limits = HashMap::new();
        for discoverable in discoverables {
            if limits.contains_key(&discoverable.platform) {
                continue;
            }
            let limit = self
                .runner
                .capabilities
                .get(discoverable.platform)
                .and_then(|capability| capability.max_concurrency());
            if let Some(limit) = limit {
                limits.insert(discoverable.platform, Arc::new(Semaphore::new(limit.max(1))));
            }
        }
        limits
    }
}
