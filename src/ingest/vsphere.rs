// Copyright (c) 2025 - Cowboy AI, Inc.
//! vSphere inventory → hypervisor hosts, virtual switches, port groups and VMs
//!
//! One `pyVmomi` record holds the whole inventory seen by a manager:
//!
//! ```text
//! hosts.<id>
//!   ├── nics.<key>        physical NICs        → Interface (keyed by MAC)
//!   ├── vswitches.<key>   standard vSwitches   → VirtualSwitch (host scope)
//!   ├── portgroups.<key>  vSwitch port groups  → PortGroup
//!   └── vms.<id>          virtual machines     → VirtualMachine + NICs
//! dvswitches.<id>         distributed switches → VirtualSwitch (manager scope)
//!   └── portgroups.<id>                        → PortGroup
//! ```
//!
//! Everything lands in a single change set so a host and its VMs appear
//! together or not at all.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::IpAddr;

use super::{IngestContext, Ingestor};
use crate::domain::{
    DeviceAttributes, GuestInfo, InterfaceAttributes, InterfaceKey, InterfaceName, MacAddress,
    NicBacking, PortGroupAttributes, VirtualMachineAttributes, VirtualSwitchAttributes, VlanId,
};
use crate::errors::IngestError;
use crate::log_store::Record;
use crate::orchestrator::pipeline::VSPHERE_COMMAND;
use crate::topology::{
    ChangeSet, DeviceRef, PortGroupRef, SwitchRef, TopologyUpsert, VmNicUpsert,
};

/// Booleans arrive either as JSON booleans or as `"True"` / `"False"`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    fn value(&self) -> Option<bool> {
        match self {
            Flag::Bool(value) => Some(*value),
            Flag::Text(text) => match text.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }
}

/// Identifiers that may be numbers or strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(i64),
    Text(String),
}

impl Scalar {
    fn as_string(&self) -> String {
        match self {
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Inventory {
    #[serde(default)]
    hosts: BTreeMap<String, HostRecord>,
    #[serde(default)]
    dvswitches: BTreeMap<String, DvSwitchRecord>,
}

#[derive(Debug, Deserialize)]
struct HostRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    vendor: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    vswitches: BTreeMap<String, VSwitchRecord>,
    #[serde(default)]
    portgroups: BTreeMap<String, PortGroupRecord>,
    #[serde(default)]
    vms: BTreeMap<String, VmRecord>,
    #[serde(default)]
    nics: BTreeMap<String, PhysicalNicRecord>,
}

#[derive(Debug, Deserialize)]
struct VSwitchRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    nics: Vec<String>,
    #[serde(default)]
    portgroups: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PortGroupRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    vswitch_id: Option<String>,
    #[serde(default)]
    vswitch_name: Option<String>,
    #[serde(default)]
    vlan: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PhysicalNicRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    mac_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VmRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    power_state: Option<String>,
    #[serde(default)]
    nics: Vec<VmNicRecord>,
    #[serde(default)]
    guest: Option<GuestRecord>,
}

#[derive(Debug, Deserialize)]
struct VmNicRecord {
    mac_address: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    connected: Option<Flag>,
    #[serde(default)]
    switch_type: Option<String>,
    #[serde(default)]
    portgroup_id: Option<Scalar>,
    #[serde(default)]
    portgroup_name: Option<String>,
    #[serde(default)]
    port: Option<Scalar>,
}

#[derive(Debug, Deserialize)]
struct GuestRecord {
    #[serde(default)]
    type_id: Option<String>,
    #[serde(default)]
    type_name: Option<String>,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    guest_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DvSwitchRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    portgroups: BTreeMap<String, DvPortGroupRecord>,
}

#[derive(Debug, Deserialize)]
struct DvPortGroupRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    vlan: Option<Value>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn port_group_vlan(vlan: &Option<Value>) -> Option<VlanId> {
    vlan.as_ref()
        .and_then(Value::as_i64)
        .and_then(VlanId::from_port_group_tag)
}

fn mac(raw: &str, context: &str) -> Result<MacAddress, IngestError> {
    MacAddress::new(raw).map_err(|e| IngestError::InvalidField {
        field: "mac_address".to_string(),
        value: raw.to_string(),
        reason: format!("{} ({})", e, context),
    })
}

impl TryFrom<&VmNicRecord> for NicBacking {
    type Error = IngestError;

    fn try_from(nic: &VmNicRecord) -> Result<Self, Self::Error> {
        let missing = |field: &str| IngestError::MissingField {
            field: field.to_string(),
            context: format!("vNIC {}", nic.mac_address),
        };

        match nic.switch_type.as_deref() {
            Some("dvswitch") => {
                let portgroup_id = nic
                    .portgroup_id
                    .as_ref()
                    .map(Scalar::as_string)
                    .ok_or_else(|| missing("portgroup_id"))?;
                let raw_port = nic
                    .port
                    .as_ref()
                    .map(Scalar::as_string)
                    .ok_or_else(|| missing("port"))?;
                let port = raw_port.trim().parse::<u32>().map_err(|e| {
                    IngestError::InvalidField {
                        field: "port".to_string(),
                        value: raw_port.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(NicBacking::DvSwitch { portgroup_id, port })
            }
            Some("vswitch") => Ok(NicBacking::VSwitch {
                portgroup_name: non_empty(&nic.portgroup_name)
                    .ok_or_else(|| missing("portgroup_name"))?,
                network: nic.portgroup_id.as_ref().map(Scalar::as_string),
            }),
            Some(other) => Err(IngestError::InvalidField {
                field: "switch_type".to_string(),
                value: other.to_string(),
                reason: "expected vswitch or dvswitch".to_string(),
            }),
            None => Err(missing("switch_type")),
        }
    }
}

/// Distributed port group ids look like
/// `'vim.dvs.DistributedVirtualPortgroup:dvportgroup-23'` while NIC backings
/// carry only the key `dvportgroup-23`
fn dv_port_group_matches(id: &str, key: &str) -> bool {
    let id = id.trim_matches('\'');
    id == key || id.rsplit(':').next() == Some(key)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VsphereIngestor;

impl VsphereIngestor {
    fn host_changes(
        changes: &mut ChangeSet,
        host_id: &str,
        host: &HostRecord,
        manager: &str,
        dvswitches: &BTreeMap<String, DvSwitchRecord>,
    ) -> Result<(), IngestError> {
        let name = non_empty(&host.name).ok_or_else(|| IngestError::MissingField {
            field: "name".to_string(),
            context: format!("host {}", host_id),
        })?;
        let device = DeviceRef::hostname(name.clone());

        changes.push(TopologyUpsert::Device {
            target: device.clone(),
            attributes: DeviceAttributes {
                name: Some(name),
                manufacturer: non_empty(&host.vendor),
                model: non_empty(&host.model),
                ..Default::default()
            },
        });

        for (key, nic) in &host.nics {
            let Some(raw_mac) = nic.mac_address.as_deref() else {
                continue;
            };
            changes.push(TopologyUpsert::Interface {
                device: device.clone(),
                key: InterfaceKey::Mac(mac(raw_mac, key)?),
                vrf: None,
                attributes: InterfaceAttributes {
                    name: non_empty(&nic.name).map(InterfaceName::normalize),
                    ..Default::default()
                },
            });
        }

        for (key, vswitch) in &host.vswitches {
            changes.push(TopologyUpsert::VirtualSwitch {
                switch: SwitchRef::host(device.clone(), key.clone()),
                attributes: VirtualSwitchAttributes {
                    name: non_empty(&vswitch.name),
                    uplinks: Some(vswitch.nics.clone()),
                },
            });
        }

        let mut port_group_refs: BTreeMap<&str, PortGroupRef> = BTreeMap::new();
        for (key, port_group) in &host.portgroups {
            let switch_key = host
                .vswitches
                .iter()
                .find(|(_, vswitch)| vswitch.portgroups.iter().any(|pg| pg == key))
                .map(|(switch_key, _)| switch_key.clone())
                .or_else(|| port_group.vswitch_id.clone())
                .ok_or_else(|| IngestError::MissingField {
                    field: "vswitch_id".to_string(),
                    context: format!("port group {} on host {}", key, host_id),
                })?;

            // Port group on a switch the inventory did not list
            if !host.vswitches.contains_key(&switch_key) {
                changes.push(TopologyUpsert::VirtualSwitch {
                    switch: SwitchRef::host(device.clone(), switch_key.clone()),
                    attributes: VirtualSwitchAttributes {
                        name: non_empty(&port_group.vswitch_name),
                        uplinks: None,
                    },
                });
            }

            let reference = PortGroupRef::new(SwitchRef::host(device.clone(), switch_key), key.clone());
            changes.push(TopologyUpsert::PortGroup {
                port_group: reference.clone(),
                attributes: PortGroupAttributes {
                    name: non_empty(&port_group.name),
                    vlan: port_group_vlan(&port_group.vlan),
                },
            });
            if let Some(name) = port_group.name.as_deref() {
                port_group_refs.insert(name, reference);
            }
        }

        for (moid, vm) in &host.vms {
            let nics = vm
                .nics
                .iter()
                .map(|nic| -> Result<VmNicUpsert, IngestError> {
                    let backing = NicBacking::try_from(nic)?;
                    let port_group = match &backing {
                        NicBacking::VSwitch { portgroup_name, .. } => {
                            port_group_refs.get(portgroup_name.as_str()).cloned()
                        }
                        NicBacking::DvSwitch { portgroup_id, .. } => dvswitches
                            .iter()
                            .find_map(|(switch_id, dvswitch)| {
                                dvswitch
                                    .portgroups
                                    .keys()
                                    .find(|id| dv_port_group_matches(id, portgroup_id))
                                    .map(|id| {
                                        PortGroupRef::new(
                                            SwitchRef::distributed(manager, switch_id.clone()),
                                            id.clone(),
                                        )
                                    })
                            }),
                    };
                    Ok(VmNicUpsert {
                        mac_address: mac(&nic.mac_address, moid)?,
                        label: non_empty(&nic.label),
                        connected: nic.connected.as_ref().and_then(Flag::value),
                        backing,
                        port_group,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let guest = vm.guest.as_ref().map(|guest| GuestInfo {
                type_id: non_empty(&guest.type_id),
                type_name: non_empty(&guest.type_name),
                hostname: non_empty(&guest.hostname),
                address: guest
                    .guest_address
                    .as_deref()
                    .and_then(|a| a.trim().parse::<IpAddr>().ok()),
            });

            changes.push(TopologyUpsert::VirtualMachine {
                manager: manager.to_string(),
                moid: moid.clone(),
                host: Some(device.clone()),
                attributes: VirtualMachineAttributes {
                    name: non_empty(&vm.name),
                    status: non_empty(&vm.status),
                    power_state: non_empty(&vm.power_state),
                    guest,
                },
                nics: Some(nics),
            });
        }

        Ok(())
    }
}

impl Ingestor for VsphereIngestor {
    fn template(&self) -> &str {
        VSPHERE_COMMAND
    }

    fn ingest(
        &self,
        records: &[Record],
        context: &IngestContext<'_>,
    ) -> Result<ChangeSet, IngestError> {
        let manager = context.discoverable.address.to_string();
        let mut changes = ChangeSet::new();

        for record in records {
            let inventory: Inventory =
                serde_json::from_value(Value::Object(record.clone()))?;

            // Distributed switches first: VM NICs on any host may reference them
            for (switch_id, dvswitch) in &inventory.dvswitches {
                let switch = SwitchRef::distributed(manager.clone(), switch_id.clone());
                changes.push(TopologyUpsert::VirtualSwitch {
                    switch: switch.clone(),
                    attributes: VirtualSwitchAttributes {
                        name: non_empty(&dvswitch.name),
                        uplinks: None,
                    },
                });
                for (id, port_group) in &dvswitch.portgroups {
                    changes.push(TopologyUpsert::PortGroup {
                        port_group: PortGroupRef::new(switch.clone(), id.clone()),
                        attributes: PortGroupAttributes {
                            name: non_empty(&port_group.name),
                            vlan: port_group_vlan(&port_group.vlan),
                        },
                    });
                }
            }

            for (host_id, host) in &inventory.hosts {
                Self::host_changes(&mut changes, host_id, host, &manager, &inventory.dvswitches)?;
            }
        }

        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Platform;
    use crate::ingest::test_support::*;
    use serde_json::json;

    fn ingest(inventory: Value) -> Result<ChangeSet, IngestError> {
        let discoverable = discoverable(Platform::VmwareVsphere);
        let log = log_for(&discoverable, VSPHERE_COMMAND);
        let context = IngestContext {
            discoverable: &discoverable,
            log: &log,
        };
        VsphereIngestor.ingest(&records(inventory), &context)
    }

    fn vm_nics(changes: &ChangeSet) -> Vec<VmNicUpsert> {
        changes
            .upserts()
            .iter()
            .filter_map(|upsert| match upsert {
                TopologyUpsert::VirtualMachine { nics, .. } => nics.clone(),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn test_dvswitch_nic_resolves_distributed_port_group() {
        let changes = ingest(json!({
            "hosts": {
                "host-1": {
                    "name": "esx1.lab",
                    "vms": {
                        "vm-1": {
                            "name": "web",
                            "nics": [{
                                "mac_address": "00:50:56:aa:bb:01",
                                "connected": "True",
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
                "dvs-1": {
                    "name": "DSwitch",
                    "portgroups": {
                        "'vim.dvs.DistributedVirtualPortgroup:dvportgroup-23'": {
                            "name": "Prod",
                            "vlan": 100,
                        },
                    },
                },
            },
        }))
        .unwrap();

        let nics = vm_nics(&changes);
        assert_eq!(nics.len(), 1);
        assert_eq!(
            nics[0].backing,
            NicBacking::DvSwitch {
                portgroup_id: "dvportgroup-23".to_string(),
                port: 12,
            }
        );
        assert_eq!(nics[0].backing.portgroup_name(), None);
        assert_eq!(nics[0].connected, Some(true));
        assert_eq!(
            nics[0].port_group.as_ref().map(|pg| pg.switch.key.as_str()),
            Some("dvs-1")
        );
    }

    #[test]
    fn test_dvswitch_nic_without_port_is_rejected() {
        let result = ingest(json!({
            "hosts": {
                "host-1": {
                    "name": "esx1.lab",
                    "vms": {
                        "vm-1": {
                            "nics": [{
                                "mac_address": "00:50:56:aa:bb:01",
                                "switch_type": "dvswitch",
                                "portgroup_id": "dvportgroup-23",
                            }],
                        },
                    },
                },
            },
        }));
        assert!(matches!(result, Err(IngestError::MissingField { ref field, .. }) if field == "port"));
    }

    #[test]
    fn test_host_without_name() {
        let result = ingest(json!({"hosts": {"host-1": {"vendor": "Dell Inc."}}}));
        assert!(matches!(result, Err(IngestError::MissingField { .. })));
    }

    #[test]
    fn test_port_group_match() {
        assert!(dv_port_group_matches(
            "'vim.dvs.DistributedVirtualPortgroup:dvportgroup-23'",
            "dvportgroup-23"
        ));
        assert!(dv_port_group_matches("dvportgroup-23", "dvportgroup-23"));
        assert!(!dv_port_group_matches(
            "'vim.dvs.DistributedVirtualPortgroup:dvportgroup-230'",
            "dvportgroup-23"
        ));
    }
}
