// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-discovery
//!
//! Deterministic device outputs, a scripted query capability and a small
//! harness wiring the in-memory stores together.
//!
//! # Design Principles
//! - Device output is fixed text, never generated
//! - Capabilities never touch the network
//! - Every store is in memory and owned by the test

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cim_discovery::domain::{CredentialRef, Discoverable, Platform};
use cim_discovery::errors::QueryError;
use cim_discovery::log_store::{DiscoveryLog, LogDetails, NewDiscoveryLog, RawOutput, Record};
use cim_discovery::orchestrator::CancelHandle;
use cim_discovery::query::{QueryOptions, QueryOutput, QueryTarget, StaticCredentials};
use cim_discovery::{
    CapabilityRegistry, Credentials, DiscoverableRepository, DiscoveryConfig, DiscoveryService,
    InMemoryDiscoverableRepository, InMemoryLogStore, InMemoryTopologyStore, IngestDispatcher,
    IngestorRegistry, LogStore, QueryCapability, Registries, Replayer, StateTracker,
};

pub const CREDENTIAL: &str = "lab";

pub const SWITCH_A: &str = "10.0.0.1";
pub const SWITCH_B: &str = "10.0.0.2";
pub const SWITCH_C: &str = "10.0.0.3";
pub const SWITCH_D: &str = "10.0.0.4";
pub const VCENTER: &str = "10.0.10.5";

pub const HOSTNAME_COMMAND: &str = "show running-config | include hostname";

pub const HOSTNAME_OUTPUT: &str = "hostname core-sw1\n";

pub const INVENTORY_OUTPUT: &str = r#"NAME: "Chassis", DESCR: "Cisco Catalyst Chassis"
PID: WS-C1             , VID: V01  , SN: ABC123

NAME: "Power Supply 1", DESCR: "AC Power Supply"
PID: PWR-1             , VID: V02  , SN: PSU001

NAME: "Fan Tray", DESCR: "Fan Tray"
PID: FAN-1             , VID: V01  , SN: FAN001
"#;

pub const VLAN_OUTPUT: &str = "\
VLAN Name                             Status    Ports
---- -------------------------------- --------- -------------------------------
1    default                          active    Gi0/1, Gi0/2
10   USERS                            active    Gi0/3
";

pub const IP_INTERFACE_OUTPUT: &str = "\
GigabitEthernet0/0 is up, line protocol is up
  Internet address is 10.0.0.1/24
Vlan10 is administratively down, line protocol is down
  Internet protocol processing disabled
";

pub fn address(raw: &str) -> IpAddr {
    raw.parse().expect("Invalid address in test fixture")
}

pub fn discoverable(raw_address: &str, platform: Platform) -> Discoverable {
    Discoverable::new(address(raw_address), platform, CredentialRef::new(CREDENTIAL))
}

pub fn credentials() -> Arc<StaticCredentials> {
    Arc::new(StaticCredentials::new().with(CREDENTIAL, Credentials::new("admin", "admin")))
}

/// Records from a JSON array (or a single object)
pub fn records(value: Value) -> Vec<Record> {
    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

/// vSphere inventory: one host, two standard vSwitches with one port group
/// each and one VM attached to the first port group
pub fn vsphere_inventory() -> Value {
    json!({
        "hosts": {
            "host-10": {
                "name": "esx1.lab",
                "vendor": "Dell Inc.",
                "model": "PowerEdge R640",
                "vswitches": {
                    "key-vim.host.VirtualSwitch-vSwitch0": {
                        "name": "vSwitch0",
                        "nics": ["vmnic0"],
                        "portgroups": ["key-vim.host.PortGroup-VM Network"],
                    },
                    "key-vim.host.VirtualSwitch-vSwitch1": {
                        "name": "vSwitch1",
                        "nics": ["vmnic1"],
                        "portgroups": ["key-vim.host.PortGroup-Storage"],
                    },
                },
                "portgroups": {
                    "key-vim.host.PortGroup-VM Network": {
                        "name": "VM Network",
                        "vswitch_id": "key-vim.host.VirtualSwitch-vSwitch0",
                        "vlan": 0,
                    },
                    "key-vim.host.PortGroup-Storage": {
                        "name": "Storage",
                        "vswitch_id": "key-vim.host.VirtualSwitch-vSwitch1",
                        "vlan": 20,
                    },
                },
                "vms": {
                    "vm-101": {
                        "name": "web01",
                        "status": "green",
                        "power_state": "poweredOn",
                        "nics": [{
                            "mac_address": "00:50:56:aa:bb:01",
                            "label": "Network adapter 1",
                            "connected": "True",
                            "switch_type": "vswitch",
                            "portgroup_id": "network-12",
                            "portgroup_name": "VM Network",
                            "port": null,
                        }],
                        "guest": {
                            "type_id": "ubuntu64Guest",
                            "hostname": "web01",
                            "guest_address": "10.0.20.11",
                        },
                    },
                },
            },
        },
        "dvswitches": {},
    })
}

/// Same inventory with the VM attached to a distributed port group
pub fn vsphere_dvswitch_inventory() -> Value {
    json!({
        "hosts": {
            "host-10": {
                "name": "esx1.lab",
                "vms": {
                    "vm-101": {
                        "name": "web01",
                        "nics": [{
                            "mac_address": "00:50:56:aa:bb:01",
                            "connected": "False",
                            "switch_type": "dvswitch",
                            "portgroup_id": "dvportgroup-23",
                            "portgroup_name": null,
                            "port": "12",
                        }],
                    },
                },
            },
        },
        "dvswitches": {
            "dvs-5": {
                "name": "DSwitch-Prod",
                "portgroups": {
                    "'vim.dvs.DistributedVirtualPortgroup:dvportgroup-23'": {
                        "name": "Prod-100",
                        "vlan": 100,
                    },
                },
            },
        },
    })
}

/// Query capability answering from a fixed script
///
/// Unscripted commands fail as unsupported. Host-specific answers win over
/// answers for any host.
#[derive(Default)]
pub struct ScriptedCapability {
    answers: HashMap<String, Result<QueryOutput, QueryError>>,
    host_answers: HashMap<(IpAddr, String), Result<QueryOutput, QueryError>>,
    delay: Option<Duration>,
    max_concurrency: Option<usize>,
    cancel_on_query: Option<CancelHandle>,
    panic_host: Option<IpAddr>,
    calls: Mutex<Vec<(IpAddr, String)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedCapability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, command: &str, output: &str) -> Self {
        self.answers
            .insert(command.to_string(), Ok(QueryOutput::Text(output.to_string())));
        self
    }

    pub fn json(mut self, command: &str, output: Value) -> Self {
        self.answers
            .insert(command.to_string(), Ok(QueryOutput::Json(output)));
        self
    }

    pub fn fail(mut self, command: &str, error: QueryError) -> Self {
        self.answers.insert(command.to_string(), Err(error));
        self
    }

    pub fn text_host(mut self, host: &str, command: &str, output: &str) -> Self {
        self.host_answers.insert(
            (address(host), command.to_string()),
            Ok(QueryOutput::Text(output.to_string())),
        );
        self
    }

    pub fn fail_host(mut self, host: &str, command: &str, error: QueryError) -> Self {
        self.host_answers
            .insert((address(host), command.to_string()), Err(error));
        self
    }

    /// Panic inside any query against `host`
    pub fn panic_host(mut self, host: &str) -> Self {
        self.panic_host = Some(address(host));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    /// Fire `cancel` as soon as the first query arrives
    pub fn cancel_on_query(mut self, cancel: CancelHandle) -> Self {
        self.cancel_on_query = Some(cancel);
        self
    }

    pub fn calls(&self) -> Vec<(IpAddr, String)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Highest number of queries seen running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryCapability for ScriptedCapability {
    async fn query(
        &self,
        target: &QueryTarget,
        command: &str,
        _credentials: &Credentials,
        _options: &QueryOptions,
    ) -> Result<QueryOutput, QueryError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((target.address, command.to_string()));
        }
        if let Some(cancel) = &self.cancel_on_query {
            cancel.cancel();
        }
        if self.panic_host == Some(target.address) {
            panic!("scripted capability crashed on {}", target.address);
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.host_answers
            .get(&(target.address, command.to_string()))
            .or_else(|| self.answers.get(command))
            .cloned()
            .unwrap_or_else(|| Err(QueryError::Unsupported(command.to_string())))
    }

    fn max_concurrency(&self) -> Option<usize> {
        self.max_concurrency
    }
}

/// Capability answering the built-in Cisco pipeline
pub fn cisco_capability() -> ScriptedCapability {
    ScriptedCapability::new()
        .text(HOSTNAME_COMMAND, HOSTNAME_OUTPUT)
        .text("show inventory", INVENTORY_OUTPUT)
        .text("show vlan brief", VLAN_OUTPUT)
        .text("show ip interface", IP_INTERFACE_OUTPUT)
}

/// Service over fresh in-memory stores
pub struct ServiceHarness {
    pub service: DiscoveryService,
    pub log_store: Arc<InMemoryLogStore>,
    pub topology: Arc<InMemoryTopologyStore>,
    pub repository: Arc<InMemoryDiscoverableRepository>,
}

impl ServiceHarness {
    pub fn new(config: DiscoveryConfig, capabilities: CapabilityRegistry) -> Self {
        Self::with_registries(config, Registries::with_builtins(capabilities))
    }

    pub fn with_registries(config: DiscoveryConfig, registries: Registries) -> Self {
        let log_store = Arc::new(InMemoryLogStore::new());
        let topology = Arc::new(InMemoryTopologyStore::new());
        let repository = Arc::new(InMemoryDiscoverableRepository::new());
        let service = DiscoveryService::new(
            config,
            registries,
            credentials(),
            log_store.clone(),
            topology.clone(),
            repository.clone(),
        );

        Self {
            service,
            log_store,
            topology,
            repository,
        }
    }

    /// Register and return discoverables
    pub async fn register(&self, discoverables: Vec<Discoverable>) -> Vec<Discoverable> {
        let mut registered = Vec::new();
        for discoverable in discoverables {
            registered.push(
                self.repository
                    .register(discoverable)
                    .await
                    .expect("Failed to register discoverable"),
            );
        }
        registered
    }
}

/// Dispatcher and replayer over fresh in-memory stores
pub struct IngestHarness {
    pub dispatcher: IngestDispatcher,
    pub replayer: Replayer,
    pub log_store: Arc<InMemoryLogStore>,
    pub topology: Arc<InMemoryTopologyStore>,
    pub repository: Arc<InMemoryDiscoverableRepository>,
}

impl IngestHarness {
    pub fn new() -> Self {
        let log_store = Arc::new(InMemoryLogStore::new());
        let topology = Arc::new(InMemoryTopologyStore::new());
        let repository = Arc::new(InMemoryDiscoverableRepository::new());
        let dispatcher = IngestDispatcher::new(
            Arc::new(IngestorRegistry::with_builtins()),
            log_store.clone(),
            topology.clone(),
            StateTracker::new(repository.clone()),
        );
        let replayer = Replayer::new(log_store.clone(), dispatcher.clone());

        Self {
            dispatcher,
            replayer,
            log_store,
            topology,
            repository,
        }
    }

    pub async fn register(&self, raw_address: &str, platform: Platform) -> Discoverable {
        self.repository
            .register(discoverable(raw_address, platform))
            .await
            .expect("Failed to register discoverable")
    }

    /// Append a log that is already parsed into `parsed`
    pub async fn parsed_log(
        &self,
        discoverable: &Discoverable,
        template: &str,
        order: u32,
        parsed: Value,
    ) -> DiscoveryLog {
        self.parsed_log_with(discoverable, template, order, LogDetails::default(), parsed)
            .await
    }

    pub async fn parsed_log_with(
        &self,
        discoverable: &Discoverable,
        template: &str,
        order: u32,
        details: LogDetails,
        parsed: Value,
    ) -> DiscoveryLog {
        let log = self
            .log_store
            .append(NewDiscoveryLog {
                discoverable_id: discoverable.id,
                address: discoverable.address,
                platform: discoverable.platform,
                command: template.to_string(),
                template: template.to_string(),
                order,
                raw_output: RawOutput::Text(String::new()),
                details,
            })
            .await
            .expect("Failed to append log");

        self.log_store
            .mark_parsed(log.id, records(parsed))
            .await
            .expect("Failed to mark log parsed")
    }

    pub async fn bound_device(
        &self,
        discoverable: &Discoverable,
    ) -> Option<cim_discovery::domain::DeviceId> {
        self.repository
            .get(discoverable.id)
            .await
            .expect("Discoverable disappeared")
            .device
    }
}

pub fn hostname_records(name: &str) -> Value {
    json!([{ "hostname": name }])
}

pub fn inventory_records(serial: &str, model: &str) -> Value {
    json!([
        { "name": "Chassis", "descr": "Chassis", "pid": model, "vid": "V01", "sn": serial },
        { "name": "Power Supply 1", "descr": "PSU", "pid": "PWR-1", "vid": "V02", "sn": "PSU001" },
    ])
}

pub fn route_records() -> Value {
    json!([
        {
            "protocol": "C", "network": "10.0.0.0", "prefix_length": "24",
            "distance": "", "metric": "", "nexthop_ip": "", "nexthop_if": "Gi0/0",
        },
        {
            "protocol": "O", "network": "10.1.0.0", "prefix_length": "16",
            "distance": "110", "metric": "20", "nexthop_ip": "10.0.0.2", "nexthop_if": "Gi0/0",
        },
        {
            "protocol": "B", "network": "10.9.0.0", "prefix_length": "16",
            "distance": "20", "metric": "0", "nexthop_ip": "", "nexthop_if": "",
        },
    ])
}

pub fn vlan_records(vids: &[u16]) -> Value {
    Value::Array(
        vids.iter()
            .map(|vid| {
                json!({
                    "vlan_id": vid.to_string(),
                    "name": format!("VLAN{:04}", vid),
                    "status": "active",
                    "interfaces": [],
                })
            })
            .collect(),
    )
}
