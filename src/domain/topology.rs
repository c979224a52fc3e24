// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Entities
//!
//! The normalized inventory model that ingestors reconcile device output
//! into. Every entity has a surrogate id plus a natural key:
//!
//! | Entity           | Natural key                                      |
//! |------------------|--------------------------------------------------|
//! | Device           | serial + manufacturer, else hostname             |
//! | Interface        | device + name, or device + MAC                   |
//! | Vlan             | device + VLAN id                                 |
//! | Vrf              | name                                             |
//! | Route            | device + VRF + destination + protocol + next hop |
//! | VirtualSwitch    | host + key, or manager + key (distributed)       |
//! | PortGroup        | switch + key                                     |
//! | VirtualMachine   | manager + managed object id                      |
//!
//! Updates are merge-only: an attribute present in the source replaces the
//! stored value, an absent attribute leaves it untouched. Nothing here ever
//! removes an entity.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use super::{EntityId, InterfaceName, IpAddressWithCidr, MacAddress, Platform, VlanId};

pub type DeviceId = EntityId<Device>;
pub type InterfaceId = EntityId<Interface>;
pub type VirtualSwitchId = EntityId<VirtualSwitch>;
pub type PortGroupId = EntityId<PortGroup>;
pub type VirtualMachineId = EntityId<VirtualMachine>;
pub type VrfId = EntityId<Vrf>;
pub type RouteId = EntityId<Route>;

/// Replace `field` with `value` when the source provided one
///
/// Returns whether the stored value changed.
fn merge_field<T: PartialEq + Clone>(field: &mut Option<T>, value: &Option<T>) -> bool {
    match value {
        Some(new) if field.as_ref() != Some(new) => {
            *field = Some(new.clone());
            true
        }
        _ => false,
    }
}

/// Natural identity of a device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceIdentity {
    /// Hardware identity, authoritative when known
    Serial {
        manufacturer: String,
        serial: String,
    },
    /// Fallback when no serial number has been observed
    Hostname { name: String },
}

impl DeviceIdentity {
    /// Pick the strongest identity available
    pub fn from_parts(
        manufacturer: Option<&str>,
        serial: Option<&str>,
        name: Option<&str>,
    ) -> Option<Self> {
        fn non_empty(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|v| !v.is_empty())
        }

        match (non_empty(manufacturer), non_empty(serial)) {
            (Some(manufacturer), Some(serial)) => Some(DeviceIdentity::Serial {
                manufacturer: manufacturer.to_string(),
                serial: serial.to_string(),
            }),
            _ => non_empty(name).map(|name| DeviceIdentity::Hostname {
                name: name.to_string(),
            }),
        }
    }
}

/// Physical or virtual network element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub management_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub platform: Option<Platform>,
}

/// Device attributes carried by an upsert; `None` means "not observed"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAttributes {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub management_ip: Option<IpAddr>,
    pub platform: Option<Platform>,
}

impl DeviceAttributes {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Device {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            name: None,
            manufacturer: None,
            model: None,
            serial: None,
            management_ip: None,
            platform: None,
        }
    }

    /// Merge observed attributes; returns whether anything changed
    pub fn merge(&mut self, attributes: &DeviceAttributes) -> bool {
        let mut changed = merge_field(&mut self.name, &attributes.name);
        changed |= merge_field(&mut self.manufacturer, &attributes.manufacturer);
        changed |= merge_field(&mut self.model, &attributes.model);
        changed |= merge_field(&mut self.serial, &attributes.serial);
        changed |= merge_field(&mut self.management_ip, &attributes.management_ip);
        changed |= merge_field(&mut self.platform, &attributes.platform);
        changed
    }

    /// Take over fields this device has not observed from a device it
    /// turned out to be the same as
    pub fn absorb(&mut self, other: &Device) -> bool {
        fn fill<T: Clone>(field: &mut Option<T>, value: &Option<T>) -> bool {
            match (field.is_none(), value) {
                (true, Some(value)) => {
                    *field = Some(value.clone());
                    true
                }
                _ => false,
            }
        }

        let mut changed = fill(&mut self.name, &other.name);
        changed |= fill(&mut self.manufacturer, &other.manufacturer);
        changed |= fill(&mut self.model, &other.model);
        changed |= fill(&mut self.serial, &other.serial);
        changed |= fill(&mut self.management_ip, &other.management_ip);
        changed |= fill(&mut self.platform, &other.platform);
        changed
    }

    pub fn identity(&self) -> Option<DeviceIdentity> {
        DeviceIdentity::from_parts(
            self.manufacturer.as_deref(),
            self.serial.as_deref(),
            self.name.as_deref(),
        )
    }

    /// Whether this device answers to `identity`
    pub fn matches(&self, identity: &DeviceIdentity) -> bool {
        match identity {
            DeviceIdentity::Serial {
                manufacturer,
                serial,
            } => {
                self.manufacturer.as_deref() == Some(manufacturer.as_str())
                    && self.serial.as_deref() == Some(serial.as_str())
            }
            DeviceIdentity::Hostname { name } => self.name.as_deref() == Some(name.as_str()),
        }
    }
}

/// Device-scoped interface key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum InterfaceKey {
    Name(InterfaceName),
    Mac(MacAddress),
}

/// Network interface on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub id: InterfaceId,
    pub device: DeviceId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<InterfaceName>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mac_address: Option<MacAddress>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vrf: Option<VrfId>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub addresses: Vec<IpAddressWithCidr>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAttributes {
    pub name: Option<InterfaceName>,
    pub mac_address: Option<MacAddress>,
    pub description: Option<String>,
    pub vrf: Option<VrfId>,
    /// Replaces the address list when present
    pub addresses: Option<Vec<IpAddressWithCidr>>,
    pub enabled: Option<bool>,
}

impl Interface {
    /// New interface carrying only its key
    pub fn new(id: InterfaceId, device: DeviceId, key: &InterfaceKey) -> Self {
        let (name, mac_address) = match key {
            InterfaceKey::Name(name) => (Some(name.clone()), None),
            InterfaceKey::Mac(mac) => (None, Some(*mac)),
        };
        Self {
            id,
            device,
            name,
            mac_address,
            description: None,
            vrf: None,
            addresses: Vec::new(),
            enabled: None,
        }
    }

    /// Key this interface is found by, name first
    pub fn key(&self) -> Option<InterfaceKey> {
        match (&self.name, self.mac_address) {
            (Some(name), _) => Some(InterfaceKey::Name(name.clone())),
            (None, Some(mac)) => Some(InterfaceKey::Mac(mac)),
            (None, None) => None,
        }
    }

    pub fn matches(&self, device: DeviceId, key: &InterfaceKey) -> bool {
        self.device == device
            && match key {
                InterfaceKey::Name(name) => self.name.as_ref() == Some(name),
                InterfaceKey::Mac(mac) => self.mac_address.as_ref() == Some(mac),
            }
    }

    pub fn merge(&mut self, attributes: &InterfaceAttributes) -> bool {
        let mut changed = merge_field(&mut self.name, &attributes.name);
        changed |= merge_field(&mut self.mac_address, &attributes.mac_address);
        changed |= merge_field(&mut self.description, &attributes.description);
        changed |= merge_field(&mut self.vrf, &attributes.vrf);
        changed |= merge_field(&mut self.enabled, &attributes.enabled);
        if let Some(addresses) = &attributes.addresses {
            let mut addresses = addresses.clone();
            addresses.sort();
            addresses.dedup();
            if self.addresses != addresses {
                self.addresses = addresses;
                changed = true;
            }
        }
        changed
    }
}

/// VLAN defined on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vlan {
    pub id: EntityId<Vlan>,
    pub device: DeviceId,
    pub vid: VlanId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanAttributes {
    pub name: Option<String>,
    pub status: Option<String>,
}

impl Vlan {
    pub fn new(id: EntityId<Vlan>, device: DeviceId, vid: VlanId) -> Self {
        Self {
            id,
            device,
            vid,
            name: None,
            status: None,
        }
    }

    pub fn merge(&mut self, attributes: &VlanAttributes) -> bool {
        let mut changed = merge_field(&mut self.name, &attributes.name);
        changed |= merge_field(&mut self.status, &attributes.status);
        changed
    }
}

/// Routing instance; VRFs are shared by name across devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vrf {
    pub id: VrfId,
    pub name: String,
}

impl Vrf {
    pub fn new(id: VrfId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Source of a routing table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteProtocol {
    Unknown,
    Connected,
    Local,
    Static,
    Rip,
    Bgp,
    Eigrp,
    EigrpExternal,
    Ospf,
    OspfInterArea,
    OspfNssaExternal1,
    OspfNssaExternal2,
    OspfExternal1,
    OspfExternal2,
    Isis,
    IsisSummary,
    IsisLevel1,
    IsisLevel2,
}

impl RouteProtocol {
    /// Route code as printed by IOS/XR (`O E2`, `D EX`, `i L1`) or a
    /// protocol name as printed by NX-OS (`ospf-1`, `bgp-65000`, `direct`)
    pub fn from_code(code: &str) -> Self {
        let code = code.trim().trim_end_matches('*');
        let words: Vec<&str> = code.split_whitespace().collect();

        match words.as_slice() {
            ["C"] => RouteProtocol::Connected,
            ["L"] => RouteProtocol::Local,
            ["S"] => RouteProtocol::Static,
            ["R"] => RouteProtocol::Rip,
            ["B"] => RouteProtocol::Bgp,
            ["D"] => RouteProtocol::Eigrp,
            ["D", "EX"] | ["EX"] => RouteProtocol::EigrpExternal,
            ["O"] => RouteProtocol::Ospf,
            ["O", "IA"] | ["IA"] => RouteProtocol::OspfInterArea,
            ["O", "N1"] | ["N1"] => RouteProtocol::OspfNssaExternal1,
            ["O", "N2"] | ["N2"] => RouteProtocol::OspfNssaExternal2,
            ["O", "E1"] | ["E1"] => RouteProtocol::OspfExternal1,
            ["O", "E2"] | ["E2"] => RouteProtocol::OspfExternal2,
            ["i"] | ["i", "ia"] => RouteProtocol::Isis,
            ["i", "su"] => RouteProtocol::IsisSummary,
            ["i", "L1"] => RouteProtocol::IsisLevel1,
            ["i", "L2"] => RouteProtocol::IsisLevel2,
            _ => {
                let name = code.to_ascii_lowercase();
                let name = name.split('-').next().unwrap_or_default();
                match name {
                    "direct" | "connected" => RouteProtocol::Connected,
                    "local" | "hsrp" | "vrrp" => RouteProtocol::Local,
                    "static" | "am" => RouteProtocol::Static,
                    "rip" => RouteProtocol::Rip,
                    "bgp" => RouteProtocol::Bgp,
                    "eigrp" => RouteProtocol::Eigrp,
                    "ospf" => RouteProtocol::Ospf,
                    "isis" => RouteProtocol::Isis,
                    _ => RouteProtocol::Unknown,
                }
            }
        }
    }
}

/// Routing table entry of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub device: DeviceId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vrf: Option<VrfId>,
    pub destination: IpAddressWithCidr,
    pub protocol: RouteProtocol,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nexthop_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nexthop_interface: Option<InterfaceId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub distance: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metric: Option<u64>,
}

/// Natural key of a route once its references are resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub device: DeviceId,
    pub vrf: Option<VrfId>,
    pub destination: IpAddressWithCidr,
    pub protocol: RouteProtocol,
    pub nexthop_ip: Option<IpAddr>,
    pub nexthop_interface: Option<InterfaceId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAttributes {
    pub distance: Option<u32>,
    pub metric: Option<u64>,
}

impl Route {
    pub fn new(id: RouteId, key: RouteKey) -> Self {
        Self {
            id,
            device: key.device,
            vrf: key.vrf,
            destination: key.destination,
            protocol: key.protocol,
            nexthop_ip: key.nexthop_ip,
            nexthop_interface: key.nexthop_interface,
            distance: None,
            metric: None,
        }
    }

    pub fn key(&self) -> RouteKey {
        RouteKey {
            device: self.device,
            vrf: self.vrf,
            destination: self.destination.clone(),
            protocol: self.protocol,
            nexthop_ip: self.nexthop_ip,
            nexthop_interface: self.nexthop_interface,
        }
    }

    pub fn matches(&self, key: &RouteKey) -> bool {
        self.device == key.device
            && self.vrf == key.vrf
            && self.destination == key.destination
            && self.protocol == key.protocol
            && self.nexthop_ip == key.nexthop_ip
            && self.nexthop_interface == key.nexthop_interface
    }

    pub fn merge(&mut self, attributes: &RouteAttributes) -> bool {
        let mut changed = merge_field(&mut self.distance, &attributes.distance);
        changed |= merge_field(&mut self.metric, &attributes.metric);
        changed
    }
}

/// Where a virtual switch lives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SwitchScope {
    /// Standard vSwitch local to one hypervisor host
    Host { device: DeviceId },
    /// Distributed switch spanning a cluster, scoped to its manager
    Distributed { manager: String },
}

/// Standard or distributed virtual switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualSwitch {
    pub id: VirtualSwitchId,
    pub scope: SwitchScope,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    /// Physical uplink keys
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub uplinks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualSwitchAttributes {
    pub name: Option<String>,
    pub uplinks: Option<Vec<String>>,
}

impl VirtualSwitch {
    pub fn new(id: VirtualSwitchId, scope: SwitchScope, key: impl Into<String>) -> Self {
        Self {
            id,
            scope,
            key: key.into(),
            name: None,
            uplinks: Vec::new(),
        }
    }

    pub fn is_distributed(&self) -> bool {
        matches!(self.scope, SwitchScope::Distributed { .. })
    }

    pub fn merge(&mut self, attributes: &VirtualSwitchAttributes) -> bool {
        let mut changed = merge_field(&mut self.name, &attributes.name);
        if let Some(uplinks) = &attributes.uplinks {
            if &self.uplinks != uplinks {
                self.uplinks = uplinks.clone();
                changed = true;
            }
        }
        changed
    }
}

/// Port group on a virtual switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortGroup {
    pub id: PortGroupId,
    pub switch: VirtualSwitchId,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vlan: Option<VlanId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortGroupAttributes {
    pub name: Option<String>,
    pub vlan: Option<VlanId>,
}

impl PortGroup {
    pub fn new(id: PortGroupId, switch: VirtualSwitchId, key: impl Into<String>) -> Self {
        Self {
            id,
            switch,
            key: key.into(),
            name: None,
            vlan: None,
        }
    }

    pub fn merge(&mut self, attributes: &PortGroupAttributes) -> bool {
        let mut changed = merge_field(&mut self.name, &attributes.name);
        changed |= merge_field(&mut self.vlan, &attributes.vlan);
        changed
    }
}

/// How a virtual NIC attaches to the virtual network
///
/// The two backings are mutually exclusive; the variant is chosen once when
/// the hypervisor record is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "switch_type")]
pub enum NicBacking {
    /// Host-local vSwitch: named port group, no port number
    #[serde(rename = "vswitch")]
    VSwitch {
        portgroup_name: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        network: Option<String>,
    },
    /// Distributed switch: port group key and numeric port, no name
    #[serde(rename = "dvswitch")]
    DvSwitch { portgroup_id: String, port: u32 },
}

impl NicBacking {
    pub fn switch_type(&self) -> &'static str {
        match self {
            NicBacking::VSwitch { .. } => "vswitch",
            NicBacking::DvSwitch { .. } => "dvswitch",
        }
    }

    pub fn portgroup_name(&self) -> Option<&str> {
        match self {
            NicBacking::VSwitch { portgroup_name, .. } => Some(portgroup_name),
            NicBacking::DvSwitch { .. } => None,
        }
    }

    pub fn portgroup_id(&self) -> Option<&str> {
        match self {
            NicBacking::VSwitch { network, .. } => network.as_deref(),
            NicBacking::DvSwitch { portgroup_id, .. } => Some(portgroup_id),
        }
    }

    pub fn port(&self) -> Option<u32> {
        match self {
            NicBacking::VSwitch { .. } => None,
            NicBacking::DvSwitch { port, .. } => Some(*port),
        }
    }
}

/// Virtual NIC of a virtual machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmNic {
    pub mac_address: MacAddress,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub connected: Option<bool>,
    pub backing: NicBacking,
    /// Resolved port group, when it was part of the same inventory
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub port_group: Option<PortGroupId>,
}

impl VmNic {
    pub fn switch_type(&self) -> &'static str {
        self.backing.switch_type()
    }

    pub fn portgroup_name(&self) -> Option<&str> {
        self.backing.portgroup_name()
    }

    pub fn port(&self) -> Option<u32> {
        self.backing.port()
    }
}

/// Guest OS details reported by the hypervisor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestInfo {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub type_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub address: Option<IpAddr>,
}

/// Virtual machine, keyed by its managed object id within one manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: VirtualMachineId,
    pub manager: String,
    pub moid: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub host: Option<DeviceId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub power_state: Option<String>,
    #[serde(default)]
    pub guest: GuestInfo,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub nics: Vec<VmNic>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachineAttributes {
    pub name: Option<String>,
    pub status: Option<String>,
    pub power_state: Option<String>,
    pub guest: Option<GuestInfo>,
}

impl VirtualMachine {
    pub fn new(id: VirtualMachineId, manager: impl Into<String>, moid: impl Into<String>) -> Self {
        Self {
            id,
            manager: manager.into(),
            moid: moid.into(),
            host: None,
            name: None,
            status: None,
            power_state: None,
            guest: GuestInfo::default(),
            nics: Vec::new(),
        }
    }

    pub fn merge(&mut self, attributes: &VirtualMachineAttributes) -> bool {
        let mut changed = merge_field(&mut self.name, &attributes.name);
        changed |= merge_field(&mut self.status, &attributes.status);
        changed |= merge_field(&mut self.power_state, &attributes.power_state);
        if let Some(guest) = &attributes.guest {
            if &self.guest != guest {
                self.guest = guest.clone();
                changed = true;
            }
        }
        changed
    }
}
