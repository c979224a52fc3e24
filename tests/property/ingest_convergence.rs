// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Ingestion Convergence
//!
//! For any hostname, serial number and VLAN table:
//! - ingesting the logs once and force-replaying them yields the same topology
//! - the topology holds exactly one device and one VLAN per VLAN id
//! - a second address reporting the same serial never adds a device, even
//!   when it reports another hostname

use proptest::prelude::*;
use std::collections::BTreeSet;

use cim_discovery::domain::Platform;
use cim_discovery::{IngestMode, LogFilter, LogStore, ReplayOptions, ReplaySelection, TopologyStore};

use crate::fixtures::*;

// ============================================================================
// Strategies
// ============================================================================

fn hostname() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{2,12}"
}

fn serial() -> impl Strategy<Value = String> {
    "[A-Z]{3}[0-9A-Z]{5,8}"
}

fn vlan_table() -> impl Strategy<Value = BTreeSet<u16>> {
    prop::collection::btree_set(1u16..=4094, 0..12)
}

/// Hostname, VLAN and inventory logs for one switch, ingested in replay order
async fn ingest_switch(
    harness: &IngestHarness,
    raw_address: &str,
    name: &str,
    serial: &str,
    vids: &[u16],
) {
    let switch = harness.register(raw_address, Platform::CiscoIos).await;
    harness
        .parsed_log(&switch, "HOSTNAME", 0, hostname_records(name))
        .await;
    harness
        .parsed_log(&switch, "show vlan brief", 10, vlan_records(vids))
        .await;
    harness
        .parsed_log(&switch, "show inventory", 128, inventory_records(serial, "WS-C1"))
        .await;

    let logs = harness
        .log_store
        .list(&LogFilter::new().discoverable(switch.id))
        .await
        .unwrap();
    let report = harness
        .dispatcher
        .ingest_sequence(&logs, IngestMode::Pending, true)
        .await;
    assert!(report.is_clean(), "ingest failed: {:?}", report.failures);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: force replay over ingested logs changes nothing
    #[test]
    fn prop_force_replay_is_idempotent(
        name in hostname(),
        serial in serial(),
        vids in vlan_table(),
    ) {
        let vids: Vec<u16> = vids.into_iter().collect();

        let (before, after) = tokio_test::block_on(async {
            let harness = IngestHarness::new();
            ingest_switch(&harness, SWITCH_A, &name, &serial, &vids).await;
            let before = harness.topology.snapshot().await.unwrap();

            let report = harness
                .replayer
                .replay(&ReplaySelection::all().force(), ReplayOptions::default())
                .await
                .unwrap();
            assert_eq!(report.succeeded, 3);

            let after = harness.topology.snapshot().await.unwrap();
            (before, after)
        });

        prop_assert_eq!(&before, &after);
        prop_assert_eq!(after.devices.len(), 1);
        prop_assert_eq!(after.vlans.len(), vids.len());
        prop_assert_eq!(after.devices[0].serial.as_deref(), Some(serial.as_str()));
        prop_assert_eq!(after.devices[0].name.as_deref(), Some(name.as_str()));
    }

    /// Property: one serial reported through two addresses is one device
    #[test]
    fn prop_serial_identifies_one_device(
        name in hostname(),
        second_name in hostname(),
        serial in serial(),
        first_vids in vlan_table(),
        second_vids in vlan_table(),
    ) {
        let first_vids: Vec<u16> = first_vids.into_iter().collect();
        let second_vids: Vec<u16> = second_vids.into_iter().collect();

        let (snapshot, expected_vlans) = tokio_test::block_on(async {
            let harness = IngestHarness::new();
            ingest_switch(&harness, SWITCH_A, &name, &serial, &first_vids).await;
            ingest_switch(&harness, SWITCH_B, &second_name, &serial, &second_vids).await;

            let expected: BTreeSet<u16> =
                first_vids.iter().chain(second_vids.iter()).copied().collect();
            (harness.topology.snapshot().await.unwrap(), expected.len())
        });

        prop_assert_eq!(snapshot.devices.len(), 1);
        prop_assert_eq!(snapshot.vlans.len(), expected_vlans);
        prop_assert_eq!(snapshot.devices[0].name.as_deref(), Some(name.as_str()));
    }
}
