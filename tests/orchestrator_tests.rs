// Copyright (c) 2025 - Cowboy AI, Inc.
//! Integration tests for multi-host discovery runs
//!
//! These tests verify the orchestration guarantees:
//! 1. Every query attempt becomes a log, failed or not
//! 2. Log order within a host is strictly increasing
//! 3. One host's failures never affect another host
//! 4. Cancellation and disabled hosts skip whole hosts
//! 5. Host status follows the outcome of the run

mod fixtures;

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

use cim_discovery::domain::{Discoverable, DiscoveryStatus, Platform};
use cim_discovery::errors::QueryError;
use cim_discovery::orchestrator::{
    CancelHandle, PipelineProfile, PipelineStep, ProfileRegistry, SkipReason,
};
use cim_discovery::{
    CapabilityRegistry, DiscoverableRepository, DiscoveryConfig, IngestorRegistry, LogFilter,
    LogStore, Registries, TemplateRegistry,
};

use fixtures::*;

/// Three plain steps at increasing priority
struct ThreeStepProfile;

impl PipelineProfile for ThreeStepProfile {
    fn platform(&self) -> Platform {
        Platform::CiscoIos
    }

    fn base_steps(&self, _discoverable: &Discoverable) -> Vec<PipelineStep> {
        vec![
            PipelineStep::new("show clock").priority(2),
            PipelineStep::new("show version").priority(0),
            PipelineStep::new("show users").priority(1),
        ]
    }
}

fn three_step_capability() -> ScriptedCapability {
    ScriptedCapability::new()
        .text("show version", "Cisco IOS Software")
        .fail("show users", QueryError::Timeout(60))
        .text("show clock", "12:00:00.000 UTC Mon Jan 19 2026")
}

/// Harness running [`ThreeStepProfile`] for IOS hosts
fn three_step_harness(config: DiscoveryConfig, capability: Arc<ScriptedCapability>) -> ServiceHarness {
    let mut profiles = ProfileRegistry::new();
    profiles.register(Arc::new(ThreeStepProfile));

    ServiceHarness::with_registries(
        config,
        Registries {
            profiles,
            capabilities: CapabilityRegistry::new().with(Platform::CiscoIos, capability),
            templates: TemplateRegistry::with_builtins(),
            ingestors: IngestorRegistry::with_builtins(),
        },
    )
}

/// Test: a failing middle query is logged and the next query still runs
#[tokio::test]
async fn test_failed_query_does_not_stop_pipeline() {
    let capability = Arc::new(three_step_capability());
    let harness = three_step_harness(DiscoveryConfig::default(), capability.clone());
    let hosts = harness
        .register(vec![discoverable(SWITCH_A, Platform::CiscoIos)])
        .await;

    let report = harness.service.discover(hosts.clone()).await;

    let logs = harness
        .log_store
        .list(&LogFilter::new().discoverable(hosts[0].id))
        .await
        .unwrap();

    let orders: Vec<u32> = logs.iter().map(|l| l.order).collect();
    assert_eq!(orders, vec![0, 1, 2]);

    let commands: Vec<&str> = logs.iter().map(|l| l.command.as_str()).collect();
    assert_eq!(commands, vec!["show version", "show users", "show clock"]);

    assert!(logs[0].is_success());
    assert_eq!(logs[1].raw_output.error(), Some(&QueryError::Timeout(60)));
    assert!(logs[2].is_success());
    assert!(logs.iter().all(|l| !l.parsed && !l.ingested));

    assert_eq!(report.attempted(), 3);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failures()[0].command, "show users");
    assert_eq!(capability.calls().len(), 3);
}

/// Test: one unreachable host does not change what another host logs
#[tokio::test]
async fn test_hosts_are_isolated() {
    let capability = Arc::new(
        three_step_capability()
            .fail_host(SWITCH_B, "show version", QueryError::Connection("refused".into()))
            .fail_host(SWITCH_B, "show clock", QueryError::Connection("refused".into())),
    );
    let harness = three_step_harness(DiscoveryConfig::default(), capability);
    let hosts = harness
        .register(vec![
            discoverable(SWITCH_A, Platform::CiscoIos),
            discoverable(SWITCH_B, Platform::CiscoIos),
        ])
        .await;

    let report = harness.service.discover(hosts.clone()).await;

    let healthy = report.host(address(SWITCH_A)).unwrap();
    assert_eq!(healthy.succeeded(), 2);
    assert_eq!(healthy.status, Some(DiscoveryStatus::Discovered));

    let broken = report.host(address(SWITCH_B)).unwrap();
    assert_eq!(broken.succeeded(), 0);
    assert_eq!(broken.failed(), 3);
    assert_eq!(broken.status, Some(DiscoveryStatus::Failed));

    for host in &hosts {
        let logs = harness
            .log_store
            .list(&LogFilter::new().discoverable(host.id))
            .await
            .unwrap();
        assert_eq!(logs.len(), 3);
    }
}

/// Test: host status and timestamp are recorded in the repository
#[tokio::test]
async fn test_status_is_recorded() {
    let capability = Arc::new(
        three_step_capability()
            .fail_host(SWITCH_B, "show version", QueryError::Authentication("bad".into()))
            .fail_host(SWITCH_B, "show clock", QueryError::Authentication("bad".into())),
    );
    let harness = three_step_harness(DiscoveryConfig::default(), capability);
    let hosts = harness
        .register(vec![
            discoverable(SWITCH_A, Platform::CiscoIos),
            discoverable(SWITCH_B, Platform::CiscoIos),
        ])
        .await;

    harness.service.discover(hosts.clone()).await;

    let discovered = harness.repository.get(hosts[0].id).await.unwrap();
    assert_eq!(discovered.status, DiscoveryStatus::Discovered);
    assert!(discovered.last_discovered_at.is_some());

    let failed = harness.repository.get(hosts[1].id).await.unwrap();
    assert_eq!(failed.status, DiscoveryStatus::Failed);
}

/// Test: a host whose task panics is reported and recorded as failed
#[tokio::test]
async fn test_panicking_host_is_reported_failed() {
    let capability = Arc::new(three_step_capability().panic_host(SWITCH_B));
    let harness = three_step_harness(DiscoveryConfig::default(), capability);
    let hosts = harness
        .register(vec![
            discoverable(SWITCH_A, Platform::CiscoIos),
            discoverable(SWITCH_B, Platform::CiscoIos),
        ])
        .await;

    let report = harness.service.discover(hosts.clone()).await;

    assert_eq!(report.hosts.len(), 2);
    let healthy = report.host(address(SWITCH_A)).unwrap();
    assert_eq!(healthy.status, Some(DiscoveryStatus::Discovered));

    let crashed = report.host(address(SWITCH_B)).unwrap();
    assert_eq!(crashed.discoverable_id, hosts[1].id);
    assert!(crashed.error.as_deref().unwrap().contains("panicked"));
    assert_eq!(crashed.status, Some(DiscoveryStatus::Failed));

    let recorded = harness.repository.get(hosts[1].id).await.unwrap();
    assert_eq!(recorded.status, DiscoveryStatus::Failed);
    assert!(recorded.last_discovered_at.is_some());
}

/// Test: disabled hosts are reported and never queried
#[tokio::test]
async fn test_disabled_host_is_skipped() {
    let capability = Arc::new(three_step_capability());
    let harness = three_step_harness(DiscoveryConfig::default(), capability.clone());
    let hosts = harness
        .register(vec![
            discoverable(SWITCH_A, Platform::CiscoIos),
            discoverable(SWITCH_B, Platform::CiscoIos).disabled(),
        ])
        .await;

    let report = harness.service.discover(hosts.clone()).await;

    let disabled = report.host(address(SWITCH_B)).unwrap();
    assert_eq!(disabled.skipped, Some(SkipReason::Disabled));
    assert!(disabled.queries.is_empty());
    assert_eq!(report.hosts_skipped(), 1);

    assert!(capability
        .calls()
        .iter()
        .all(|(host, _)| *host == address(SWITCH_A)));

    let untouched = harness.repository.get(hosts[1].id).await.unwrap();
    assert_eq!(untouched.status, DiscoveryStatus::Pending);
}

/// Test: cancelling mid-run lets the running host finish and skips the rest
#[tokio::test]
async fn test_cancel_skips_hosts_not_started() {
    let cancel = CancelHandle::new();
    let capability = Arc::new(three_step_capability().cancel_on_query(cancel.clone()));
    let config = DiscoveryConfig {
        max_concurrent_hosts: 1,
        ..Default::default()
    };
    let harness = three_step_harness(config, capability.clone());
    let hosts = harness
        .register(vec![
            discoverable(SWITCH_A, Platform::CiscoIos),
            discoverable(SWITCH_B, Platform::CiscoIos),
            discoverable(SWITCH_C, Platform::CiscoIos),
        ])
        .await;

    let report = harness.service.discover_with_cancel(hosts, cancel).await;

    assert!(report.cancelled);
    assert_eq!(report.hosts.len(), 3);
    assert_eq!(report.hosts_discovered(), 1);

    let cancelled: Vec<_> = report
        .hosts
        .iter()
        .filter(|h| h.skipped == Some(SkipReason::Cancelled))
        .collect();
    assert_eq!(cancelled.len(), 2);
    assert!(cancelled.iter().all(|h| h.queries.is_empty()));

    // The host that started ran its whole pipeline
    assert_eq!(capability.calls().len(), 3);
    assert_eq!(harness.log_store.len().await, 3);
}

/// Test: a capability limit caps concurrent hosts below the global limit
#[tokio::test]
async fn test_capability_concurrency_limit() {
    let capability = Arc::new(
        three_step_capability()
            .delay(Duration::from_millis(5))
            .max_concurrency(1),
    );
    let harness = three_step_harness(DiscoveryConfig::default(), capability.clone());
    let hosts = harness
        .register(vec![
            discoverable(SWITCH_A, Platform::CiscoIos),
            discoverable(SWITCH_B, Platform::CiscoIos),
            discoverable(SWITCH_C, Platform::CiscoIos),
        ])
        .await;

    let report = harness.service.discover(hosts).await;

    assert_eq!(report.attempted(), 9);
    assert_eq!(capability.peak_concurrency(), 1);
}

/// Test: a host without a capability fails without logging anything
#[tokio::test]
async fn test_missing_capability_fails_host() {
    let harness = ServiceHarness::new(DiscoveryConfig::default(), CapabilityRegistry::new());
    let hosts = harness
        .register(vec![discoverable(SWITCH_A, Platform::CiscoNxos)])
        .await;

    let report = harness.service.discover(hosts.clone()).await;

    let host = report.host(address(SWITCH_A)).unwrap();
    assert!(host.error.is_some());
    assert_eq!(host.status, Some(DiscoveryStatus::Failed));
    assert!(harness.log_store.is_empty().await);
}

/// Test: the built-in Cisco pipeline logs the hostname lookup first
#[tokio::test]
async fn test_builtin_cisco_pipeline_order() {
    let capability = Arc::new(cisco_capability());
    let harness = ServiceHarness::new(
        DiscoveryConfig::default(),
        CapabilityRegistry::new().with(Platform::CiscoIos, capability),
    );
    let hosts = harness
        .register(vec![discoverable(SWITCH_A, Platform::CiscoIos)])
        .await;

    harness.service.discover(hosts).await;

    let logs = harness.log_store.list(&LogFilter::new()).await.unwrap();
    assert_eq!(logs[0].command, HOSTNAME_COMMAND);
    assert_eq!(logs[0].template, "HOSTNAME");
    assert!(logs.windows(2).all(|w| w[0].order < w[1].order));

    let unsupported: Vec<_> = logs.iter().filter(|l| !l.details.supported).collect();
    assert!(!unsupported.is_empty());
    let first_unsupported = logs.iter().position(|l| !l.details.supported).unwrap();
    let inventory = logs
        .iter()
        .position(|l| l.command == "show inventory")
        .unwrap();
    assert!(inventory < first_unsupported);
}
