// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Store
//!
//! Ingestors are pure: they turn parsed records into a [`ChangeSet`], a list
//! of upserts expressed against natural keys. The store resolves those keys
//! to stored entities and applies the whole set atomically.
//!
//! # Architecture
//!
//! ```text
//! Ingestor (pure)               TopologyStore (single writer)
//! ───────────────               ─────────────────────────────
//!
//! records + context                    ChangeSet
//!      │                                   │
//!      ▼                                   ▼
//! ┌────────────┐   ChangeSet   ┌──────────────────────────┐
//! │  ingest()  │ ────────────▶ │ apply(): resolve refs,   │
//! └────────────┘               │ upsert by identity,      │
//!                              │ commit all or nothing    │
//!                              └──────────────────────────┘
//! ```
//!
//! References inside a change set may point at entities created earlier in
//! the same set, so upsert order matters: devices before their interfaces,
//! VRFs before the interfaces and routes in them, next-hop interfaces before
//! their routes, switches before their port groups, port groups before the
//! NICs that use them.

pub mod memory;

pub use memory::InMemoryTopologyStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::domain::{
    Device, DeviceAttributes, DeviceId, DeviceIdentity, DiscoverableId, Interface,
    InterfaceAttributes, InterfaceKey, IpAddressWithCidr, MacAddress, NicBacking, PortGroup,
    PortGroupAttributes, Route, RouteAttributes, RouteProtocol, VirtualMachine,
    VirtualMachineAttributes, VirtualSwitch, VirtualSwitchAttributes, Vlan, VlanAttributes,
    VlanId, Vrf,
};
use crate::errors::TopologyError;

/// How an upsert names a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum DeviceRef {
    /// The device behind the discoverable that produced the log
    Discoverable,
    /// A device known by natural identity
    Identity { identity: DeviceIdentity },
    /// A stored device
    Id { id: DeviceId },
}

impl DeviceRef {
    pub fn identity(identity: DeviceIdentity) -> Self {
        DeviceRef::Identity { identity }
    }

    pub fn hostname(name: impl Into<String>) -> Self {
        DeviceRef::Identity {
            identity: DeviceIdentity::Hostname { name: name.into() },
        }
    }
}

/// Scope of a virtual switch as seen by an ingestor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SwitchScopeRef {
    Host { device: DeviceRef },
    Distributed { manager: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRef {
    pub scope: SwitchScopeRef,
    pub key: String,
}

impl SwitchRef {
    pub fn host(device: DeviceRef, key: impl Into<String>) -> Self {
        Self {
            scope: SwitchScopeRef::Host { device },
            key: key.into(),
        }
    }

    pub fn distributed(manager: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scope: SwitchScopeRef::Distributed {
                manager: manager.into(),
            },
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortGroupRef {
    pub switch: SwitchRef,
    pub key: String,
}

impl PortGroupRef {
    pub fn new(switch: SwitchRef, key: impl Into<String>) -> Self {
        Self {
            switch,
            key: key.into(),
        }
    }
}

/// Virtual NIC as produced by an ingestor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmNicUpsert {
    pub mac_address: MacAddress,
    pub label: Option<String>,
    pub connected: Option<bool>,
    pub backing: NicBacking,
    pub port_group: Option<PortGroupRef>,
}

/// One upsert-by-identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum TopologyUpsert {
    Device {
        target: DeviceRef,
        attributes: DeviceAttributes,
    },
    Interface {
        device: DeviceRef,
        key: InterfaceKey,
        /// VRF membership by name; the VRF must already exist
        vrf: Option<String>,
        attributes: InterfaceAttributes,
    },
    Vlan {
        device: DeviceRef,
        vid: VlanId,
        attributes: VlanAttributes,
    },
    Vrf {
        name: String,
    },
    Route {
        device: DeviceRef,
        vrf: Option<String>,
        destination: IpAddressWithCidr,
        protocol: RouteProtocol,
        nexthop_ip: Option<IpAddr>,
        /// Interface on the same device; must already exist
        nexthop_interface: Option<InterfaceKey>,
        attributes: RouteAttributes,
    },
    VirtualSwitch {
        switch: SwitchRef,
        attributes: VirtualSwitchAttributes,
    },
    PortGroup {
        port_group: PortGroupRef,
        attributes: PortGroupAttributes,
    },
    VirtualMachine {
        manager: String,
        moid: String,
        host: Option<DeviceRef>,
        attributes: VirtualMachineAttributes,
        /// Replaces the NIC list when present
        nics: Option<Vec<VmNicUpsert>>,
    },
}

/// Ordered upserts applied as one unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    upserts: Vec<TopologyUpsert>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, upsert: TopologyUpsert) {
        self.upserts.push(upsert);
    }

    pub fn with(mut self, upsert: TopologyUpsert) -> Self {
        self.push(upsert);
        self
    }

    pub fn extend(&mut self, other: ChangeSet) {
        self.upserts.extend(other.upserts);
    }

    pub fn upserts(&self) -> &[TopologyUpsert] {
        &self.upserts
    }

    pub fn len(&self) -> usize {
        self.upserts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty()
    }
}

/// Who is applying a change set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyContext {
    pub discoverable_id: DiscoverableId,
    pub address: IpAddr,
    /// Device the discoverable is already bound to
    pub device: Option<DeviceId>,
}

/// Counts of what one apply did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedChanges {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Device that [`DeviceRef::Discoverable`] resolved to, if used
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bound_device: Option<DeviceId>,
}

impl AppliedChanges {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0
    }
}

/// Full copy of the topology, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub devices: Vec<Device>,
    pub interfaces: Vec<Interface>,
    pub vlans: Vec<Vlan>,
    pub vrfs: Vec<Vrf>,
    pub routes: Vec<Route>,
    pub virtual_switches: Vec<VirtualSwitch>,
    pub port_groups: Vec<PortGroup>,
    pub virtual_machines: Vec<VirtualMachine>,
    /// Devices merged into another once a shared serial number showed they
    /// were the same, as (retired, surviving)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub merged_devices: Vec<(DeviceId, DeviceId)>,
}

impl TopologySnapshot {
    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn interfaces_of(&self, device: DeviceId) -> impl Iterator<Item = &Interface> {
        self.interfaces.iter().filter(move |i| i.device == device)
    }

    pub fn routes_of(&self, device: DeviceId) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(move |r| r.device == device)
    }

    pub fn vrf(&self, name: &str) -> Option<&Vrf> {
        self.vrfs.iter().find(|v| v.name == name)
    }

    pub fn entity_count(&self) -> usize {
        self.devices.len()
            + self.interfaces.len()
            + self.vlans.len()
            + self.vrfs.len()
            + self.routes.len()
            + self.virtual_switches.len()
            + self.port_groups.len()
            + self.virtual_machines.len()
    }
}

/// Identity-keyed topology persistence
///
/// Implementations serialize `apply` calls and commit each change set all
/// or nothing.
#[async_trait]
pub trait TopologyStore: Send + Sync {
    async fn apply(
        &self,
        changes: &ChangeSet,
        context: &ApplyContext,
    ) -> Result<AppliedChanges, TopologyError>;

    async fn snapshot(&self) -> Result<TopologySnapshot, TopologyError>;

    async fn device(&self, id: DeviceId) -> Result<Option<Device>, TopologyError>;

    /// Device answering to `identity`; more than one match is an error
    async fn find_device(&self, identity: &DeviceIdentity)
        -> Result<Option<Device>, TopologyError>;
}
