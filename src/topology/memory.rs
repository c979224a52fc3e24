// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory topology store
//!
//! A change set is applied to a staged copy of the state under the write
//! lock and swapped in only when every upsert succeeded.
//!
//! A discoverable whose first logs carried no hardware identity gets a
//! placeholder device. When its inventory later reports a serial number
//! another device already owns, the placeholder is merged into that device:
//! its interfaces, VLANs, routes and virtual switches move over and the
//! retired id keeps resolving to the surviving device.

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    AppliedChanges, ApplyContext, ChangeSet, DeviceRef, PortGroupRef, SwitchRef, SwitchScopeRef,
    TopologySnapshot, TopologyStore, TopologyUpsert, VmNicUpsert,
};
use crate::domain::{
    Device, DeviceAttributes, DeviceId, DeviceIdentity, EntityId, Interface, InterfaceAttributes,
    InterfaceId, InterfaceKey, IpAddressWithCidr, PortGroup, PortGroupAttributes, PortGroupId,
    Route, RouteAttributes, RouteKey, RouteProtocol, SwitchScope, VirtualMachine,
    VirtualMachineAttributes, VirtualSwitch, VirtualSwitchAttributes, VirtualSwitchId, Vlan,
    VlanAttributes, VlanId, VmNic, Vrf, VrfId,
};
use crate::errors::TopologyError;

/// Topology held in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryTopologyStore {
    state: Arc<RwLock<TopologySnapshot>>,
}

impl InMemoryTopologyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn find_devices<'a>(
    devices: &'a [Device],
    identity: &'a DeviceIdentity,
) -> impl Iterator<Item = (usize, &'a Device)> + 'a {
    devices
        .iter()
        .enumerate()
        .filter(move |(_, device)| device.matches(identity))
}

/// Device id after following merges
fn surviving(state: &TopologySnapshot, id: DeviceId) -> DeviceId {
    state
        .merged_devices
        .iter()
        .find(|(retired, _)| *retired == id)
        .map(|(_, into)| *into)
        .unwrap_or(id)
}

/// Borrowed pieces of a route upsert
struct RouteUpsert<'a> {
    device: &'a DeviceRef,
    vrf: Option<&'a str>,
    destination: &'a IpAddressWithCidr,
    protocol: RouteProtocol,
    nexthop_ip: Option<IpAddr>,
    nexthop_interface: Option<&'a InterfaceKey>,
    attributes: &'a RouteAttributes,
}

fn unique_device(devices: &[Device], identity: &DeviceIdentity) -> Result<Option<usize>, TopologyError> {
    let mut matches = find_devices(devices, identity).map(|(index, _)| index);
    let first = matches.next();
    if matches.next().is_some() {
        return Err(TopologyError::AmbiguousIdentity(format!("{:?}", identity)));
    }
    Ok(first)
}

enum Change {
    Created,
    Updated,
    Unchanged,
}

impl From<bool> for Change {
    fn from(changed: bool) -> Self {
        if changed {
            Change::Updated
        } else {
            Change::Unchanged
        }
    }
}

/// Working copy for one change set
struct Staging<'a> {
    state: TopologySnapshot,
    context: &'a ApplyContext,
    applied: AppliedChanges,
}

impl<'a> Staging<'a> {
    fn new(state: TopologySnapshot, context: &'a ApplyContext) -> Self {
        Self {
            state,
            context,
            applied: AppliedChanges::default(),
        }
    }

    fn record(&mut self, change: Change) {
        match change {
            Change::Created => self.applied.created += 1,
            Change::Updated => self.applied.updated += 1,
            Change::Unchanged => self.applied.unchanged += 1,
        }
    }

    fn device_index(&self, id: DeviceId) -> Option<usize> {
        let id = surviving(&self.state, id);
        self.state.devices.iter().position(|d| d.id == id)
    }

    /// Device already standing for the discoverable, in this set or before it
    fn discoverable_device(&self) -> Option<usize> {
        self.applied
            .bound_device
            .or(self.context.device)
            .and_then(|id| self.device_index(id))
    }

    fn create_device(&mut self) -> usize {
        self.state.devices.push(Device::new(DeviceId::new()));
        self.record(Change::Created);
        self.state.devices.len() - 1
    }

    fn apply(&mut self, upsert: &TopologyUpsert) -> Result<(), TopologyError> {
        match upsert {
            TopologyUpsert::Device { target, attributes } => {
                self.upsert_device(target, attributes)?;
            }
            TopologyUpsert::Interface {
                device,
                key,
                vrf,
                attributes,
            } => self.upsert_interface(device, key, vrf.as_deref(), attributes)?,
            TopologyUpsert::Vlan {
                device,
                vid,
                attributes,
            } => self.upsert_vlan(device, *vid, attributes)?,
            TopologyUpsert::Vrf { name } => self.upsert_vrf(name),
            TopologyUpsert::Route {
                device,
                vrf,
                destination,
                protocol,
                nexthop_ip,
                nexthop_interface,
                attributes,
            } => self.upsert_route(RouteUpsert {
                device,
                vrf: vrf.as_deref(),
                destination,
                protocol: *protocol,
                nexthop_ip: *nexthop_ip,
                nexthop_interface: nexthop_interface.as_ref(),
                attributes,
            })?,
            TopologyUpsert::VirtualSwitch { switch, attributes } => {
                self.upsert_switch(switch, attributes)?
            }
            TopologyUpsert::PortGroup {
                port_group,
                attributes,
            } => self.upsert_port_group(port_group, attributes)?,
            TopologyUpsert::VirtualMachine {
                manager,
                moid,
                host,
                attributes,
                nics,
            } => self.upsert_vm(manager, moid, host.as_ref(), attributes, nics.as_deref())?,
        }
        Ok(())
    }

    /// Device referenced by a child entity
    fn resolve_device(&mut self, reference: &DeviceRef) -> Result<DeviceId, TopologyError> {
        let index = match reference {
            DeviceRef::Id { id } => self
                .device_index(*id)
                .ok_or_else(|| TopologyError::UnknownDevice(id.to_string()))?,
            DeviceRef::Identity { identity } => unique_device(&self.state.devices, identity)?
                .ok_or_else(|| TopologyError::DanglingReference(format!("device {:?}", identity)))?,
            DeviceRef::Discoverable => match self.discoverable_device() {
                Some(index) => index,
                None => self.create_device(),
            },
        };

        let id = self.state.devices[index].id;
        if matches!(reference, DeviceRef::Discoverable) {
            self.applied.bound_device = Some(id);
        }
        Ok(id)
    }

    fn upsert_device(
        &mut self,
        target: &DeviceRef,
        attributes: &DeviceAttributes,
    ) -> Result<DeviceId, TopologyError> {
        let existing = match target {
            DeviceRef::Id { id } => Some(
                self.device_index(*id)
                    .ok_or_else(|| TopologyError::UnknownDevice(id.to_string()))?,
            ),
            DeviceRef::Identity { identity } => unique_device(&self.state.devices, identity)?,
            DeviceRef::Discoverable => {
                let identity = DeviceIdentity::from_parts(
                    attributes.manufacturer.as_deref(),
                    attributes.serial.as_deref(),
                    attributes.name.as_deref(),
                );
                match (self.discoverable_device(), identity) {
                    (Some(bound), Some(identity @ DeviceIdentity::Serial { .. })) => {
                        Some(self.reconcile_serial(bound, &identity)?)
                    }
                    (Some(bound), _) => Some(bound),
                    (None, Some(identity)) => unique_device(&self.state.devices, &identity)?,
                    (None, None) => None,
                }
            }
        };

        let index = match existing {
            Some(index) => {
                let changed = self.state.devices[index].merge(attributes);
                self.record(Change::from(changed));
                index
            }
            None => {
                let index = self.create_device();
                let device = &mut self.state.devices[index];
                if let DeviceRef::Identity { identity } = target {
                    device.merge(&identity_attributes(identity));
                }
                device.merge(attributes);
                index
            }
        };

        self.check_serial_unique(index)?;

        let id = self.state.devices[index].id;
        if matches!(target, DeviceRef::Discoverable) {
            self.applied.bound_device = Some(id);
        }
        Ok(id)
    }

    /// Device a bound discoverable reporting `identity` stands for
    ///
    /// A bound device without a serial of its own is merged into the device
    /// that owns the serial; a bound device with a different serial is a
    /// genuine clash.
    fn reconcile_serial(
        &mut self,
        bound: usize,
        identity: &DeviceIdentity,
    ) -> Result<usize, TopologyError> {
        let owner = match unique_device(&self.state.devices, identity)? {
            Some(owner) if owner != bound => owner,
            _ => return Ok(bound),
        };

        if let Some(serial) = &self.state.devices[bound].serial {
            return Err(TopologyError::AmbiguousIdentity(format!(
                "device with serial {} reports {:?} owned by another device",
                serial, identity
            )));
        }

        Ok(self.merge_devices(bound, owner))
    }

    /// Fold the device at `retired` into the one at `into`; returns the
    /// surviving device's index
    fn merge_devices(&mut self, retired: usize, into: usize) -> usize {
        let from = self.state.devices[retired].clone();
        let to = self.state.devices[into].id;
        self.state.devices[into].absorb(&from);

        let state = &mut self.state;

        // Interfaces the survivor already has are dropped in its favour
        let mut renamed: Vec<(InterfaceId, InterfaceId)> = Vec::new();
        let mut index = 0;
        while index < state.interfaces.len() {
            if state.interfaces[index].device != from.id {
                index += 1;
                continue;
            }
            let twin = state.interfaces[index].key().and_then(|key| {
                state
                    .interfaces
                    .iter()
                    .find(|i| i.matches(to, &key))
                    .map(|i| i.id)
            });
            match twin {
                Some(twin) => {
                    renamed.push((state.interfaces[index].id, twin));
                    state.interfaces.remove(index);
                }
                None => {
                    state.interfaces[index].device = to;
                    index += 1;
                }
            }
        }

        let owned: Vec<VlanId> = state
            .vlans
            .iter()
            .filter(|v| v.device == to)
            .map(|v| v.vid)
            .collect();
        state
            .vlans
            .retain(|v| !(v.device == from.id && owned.contains(&v.vid)));
        for vlan in state.vlans.iter_mut().filter(|v| v.device == from.id) {
            vlan.device = to;
        }

        for route in state.routes.iter_mut().filter(|r| r.device == from.id) {
            route.device = to;
            if let Some((_, twin)) = renamed
                .iter()
                .find(|(old, _)| Some(*old) == route.nexthop_interface)
            {
                route.nexthop_interface = Some(*twin);
            }
        }
        let mut seen: Vec<RouteKey> = Vec::new();
        state.routes.retain(|route| {
            let key = route.key();
            let duplicate = seen.contains(&key);
            seen.push(key);
            !duplicate
        });

        Self::move_switches(state, from.id, to);

        for vm in state.virtual_machines.iter_mut() {
            if vm.host == Some(from.id) {
                vm.host = Some(to);
            }
        }

        for (_, survivor) in state.merged_devices.iter_mut() {
            if *survivor == from.id {
                *survivor = to;
            }
        }
        state.merged_devices.push((from.id, to));
        state.devices.remove(retired);

        debug!(retired = %from.id, surviving = %to, "Merged device into serial owner");
        self.record(Change::Updated);
        self.device_index(to).unwrap_or(into)
    }

    /// Host-scoped switches of `from` move to `to`; a switch key both hosts
    /// have keeps the survivor's switch and port groups
    fn move_switches(state: &mut TopologySnapshot, from: DeviceId, to: DeviceId) {
        let from_scope = SwitchScope::Host { device: from };
        let to_scope = SwitchScope::Host { device: to };

        let mut switch_twins: Vec<(VirtualSwitchId, VirtualSwitchId)> = Vec::new();
        for switch in state.virtual_switches.iter().filter(|s| s.scope == from_scope) {
            if let Some(twin) = state
                .virtual_switches
                .iter()
                .find(|s| s.scope == to_scope && s.key == switch.key)
            {
                switch_twins.push((switch.id, twin.id));
            }
        }
        state
            .virtual_switches
            .retain(|s| !switch_twins.iter().any(|(old, _)| *old == s.id));
        for switch in state
            .virtual_switches
            .iter_mut()
            .filter(|s| s.scope == from_scope)
        {
            switch.scope = to_scope.clone();
        }

        let mut group_twins: Vec<(PortGroupId, PortGroupId)> = Vec::new();
        for (old, twin) in &switch_twins {
            for group in state.port_groups.iter().filter(|p| p.switch == *old) {
                if let Some(existing) = state
                    .port_groups
                    .iter()
                    .find(|p| p.switch == *twin && p.key == group.key)
                {
                    group_twins.push((group.id, existing.id));
                }
            }
        }
        state
            .port_groups
            .retain(|p| !group_twins.iter().any(|(old, _)| *old == p.id));
        for group in state.port_groups.iter_mut() {
            if let Some((_, twin)) = switch_twins.iter().find(|(old, _)| *old == group.switch) {
                group.switch = *twin;
            }
        }

        for nic in state
            .virtual_machines
            .iter_mut()
            .flat_map(|vm| vm.nics.iter_mut())
        {
            if let Some((_, twin)) = group_twins
                .iter()
                .find(|(old, _)| Some(*old) == nic.port_group)
            {
                nic.port_group = Some(*twin);
            }
        }
    }

    /// A serial number names exactly one device
    fn check_serial_unique(&self, index: usize) -> Result<(), TopologyError> {
        let device = &self.state.devices[index];
        let (Some(manufacturer), Some(serial)) = (&device.manufacturer, &device.serial) else {
            return Ok(());
        };
        let identity = DeviceIdentity::Serial {
            manufacturer: manufacturer.clone(),
            serial: serial.clone(),
        };
        let owners = find_devices(&self.state.devices, &identity).count();
        if owners > 1 {
            return Err(TopologyError::AmbiguousIdentity(format!(
                "serial {} ({}) already belongs to another device",
                serial, manufacturer
            )));
        }
        Ok(())
    }

    fn upsert_interface(
        &mut self,
        device: &DeviceRef,
        key: &InterfaceKey,
        vrf: Option<&str>,
        attributes: &InterfaceAttributes,
    ) -> Result<(), TopologyError> {
        let device = self.resolve_device(device)?;
        let attributes = match vrf {
            Some(name) => InterfaceAttributes {
                vrf: Some(self.resolve_vrf(name)?),
                ..attributes.clone()
            },
            None => attributes.clone(),
        };
        let interfaces = &mut self.state.interfaces;

        let change = match interfaces.iter_mut().find(|i| i.matches(device, key)) {
            Some(interface) => Change::from(interface.merge(&attributes)),
            None => {
                let mut interface = Interface::new(EntityId::new(), device, key);
                interface.merge(&attributes);
                interfaces.push(interface);
                Change::Created
            }
        };
        self.record(change);
        Ok(())
    }

    fn upsert_vrf(&mut self, name: &str) {
        if self.state.vrfs.iter().any(|v| v.name == name) {
            self.record(Change::Unchanged);
        } else {
            self.state.vrfs.push(Vrf::new(EntityId::new(), name));
            self.record(Change::Created);
        }
    }

    fn resolve_vrf(&self, name: &str) -> Result<VrfId, TopologyError> {
        self.state
            .vrfs
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.id)
            .ok_or_else(|| TopologyError::DanglingReference(format!("vrf {}", name)))
    }

    fn upsert_route(&mut self, route: RouteUpsert<'_>) -> Result<(), TopologyError> {
        let device = self.resolve_device(route.device)?;
        let vrf = route.vrf.map(|name| self.resolve_vrf(name)).transpose()?;
        let nexthop_interface = route
            .nexthop_interface
            .map(|key| {
                self.state
                    .interfaces
                    .iter()
                    .find(|i| i.matches(device, key))
                    .map(|i| i.id)
                    .ok_or_else(|| TopologyError::DanglingReference(format!("interface {:?}", key)))
            })
            .transpose()?;

        let key = RouteKey {
            device,
            vrf,
            destination: route.destination.clone(),
            protocol: route.protocol,
            nexthop_ip: route.nexthop_ip,
            nexthop_interface,
        };
        let routes = &mut self.state.routes;

        let change = match routes.iter_mut().find(|r| r.matches(&key)) {
            Some(existing) => Change::from(existing.merge(route.attributes)),
            None => {
                let mut created = Route::new(EntityId::new(), key);
                created.merge(route.attributes);
                routes.push(created);
                Change::Created
            }
        };
        self.record(change);
        Ok(())
    }

    fn upsert_vlan(
        &mut self,
        device: &DeviceRef,
        vid: VlanId,
        attributes: &VlanAttributes,
    ) -> Result<(), TopologyError> {
        let device = self.resolve_device(device)?;
        let vlans = &mut self.state.vlans;

        let change = match vlans.iter_mut().find(|v| v.device == device && v.vid == vid) {
            Some(vlan) => Change::from(vlan.merge(attributes)),
            None => {
                let mut vlan = Vlan::new(EntityId::new(), device, vid);
                vlan.merge(attributes);
                vlans.push(vlan);
                Change::Created
            }
        };
        self.record(change);
        Ok(())
    }

    fn resolve_scope(&mut self, scope: &SwitchScopeRef) -> Result<SwitchScope, TopologyError> {
        Ok(match scope {
            SwitchScopeRef::Host { device } => SwitchScope::Host {
                device: self.resolve_device(device)?,
            },
            SwitchScopeRef::Distributed { manager } => SwitchScope::Distributed {
                manager: manager.clone(),
            },
        })
    }

    fn resolve_switch(&mut self, switch: &SwitchRef) -> Result<VirtualSwitchId, TopologyError> {
        let scope = self.resolve_scope(&switch.scope)?;
        self.state
            .virtual_switches
            .iter()
            .find(|s| s.scope == scope && s.key == switch.key)
            .map(|s| s.id)
            .ok_or_else(|| TopologyError::DanglingReference(format!("virtual switch {}", switch.key)))
    }

    fn resolve_port_group(&mut self, port_group: &PortGroupRef) -> Result<PortGroupId, TopologyError> {
        let switch = self.resolve_switch(&port_group.switch)?;
        self.state
            .port_groups
            .iter()
            .find(|p| p.switch == switch && p.key == port_group.key)
            .map(|p| p.id)
            .ok_or_else(|| TopologyError::DanglingReference(format!("port group {}", port_group.key)))
    }

    fn upsert_switch(
        &mut self,
        switch: &SwitchRef,
        attributes: &VirtualSwitchAttributes,
    ) -> Result<(), TopologyError> {
        let scope = self.resolve_scope(&switch.scope)?;
        let switches = &mut self.state.virtual_switches;

        let change = match switches
            .iter_mut()
            .find(|s| s.scope == scope && s.key == switch.key)
        {
            Some(existing) => Change::from(existing.merge(attributes)),
            None => {
                let mut created = VirtualSwitch::new(EntityId::new(), scope, switch.key.clone());
                created.merge(attributes);
                switches.push(created);
                Change::Created
            }
        };
        self.record(change);
        Ok(())
    }

    fn upsert_port_group(
        &mut self,
        port_group: &PortGroupRef,
        attributes: &PortGroupAttributes,
    ) -> Result<(), TopologyError> {
        let switch = self.resolve_switch(&port_group.switch)?;
        let port_groups = &mut self.state.port_groups;

        let change = match port_groups
            .iter_mut()
            .find(|p| p.switch == switch && p.key == port_group.key)
        {
            Some(existing) => Change::from(existing.merge(attributes)),
            None => {
                let mut created = PortGroup::new(EntityId::new(), switch, port_group.key.clone());
                created.merge(attributes);
                port_groups.push(created);
                Change::Created
            }
        };
        self.record(change);
        Ok(())
    }

    fn resolve_nics(&mut self, nics: &[VmNicUpsert]) -> Result<Vec<VmNic>, TopologyError> {
        nics.iter()
            .map(|nic| -> Result<VmNic, TopologyError> {
                let port_group = nic
                    .port_group
                    .as_ref()
                    .map(|reference| self.resolve_port_group(reference))
                    .transpose()?;
                Ok(VmNic {
                    mac_address: nic.mac_address,
                    label: nic.label.clone(),
                    connected: nic.connected,
                    backing: nic.backing.clone(),
                    port_group,
                })
            })
            .collect()
    }

    fn upsert_vm(
        &mut self,
        manager: &str,
        moid: &str,
        host: Option<&DeviceRef>,
        attributes: &VirtualMachineAttributes,
        nics: Option<&[VmNicUpsert]>,
    ) -> Result<(), TopologyError> {
        let host = host.map(|h| self.resolve_device(h)).transpose()?;
        let nics = nics.map(|n| self.resolve_nics(n)).transpose()?;
        let machines = &mut self.state.virtual_machines;

        let (vm, created) = match machines
            .iter()
            .position(|vm| vm.manager == manager && vm.moid == moid)
        {
            Some(index) => (&mut machines[index], false),
            None => {
                machines.push(VirtualMachine::new(EntityId::new(), manager, moid));
                let last = machines.len() - 1;
                (&mut machines[last], true)
            }
        };

        let mut changed = vm.merge(attributes);
        if host.is_some() && vm.host != host {
            vm.host = host;
            changed = true;
        }
        if let Some(nics) = nics {
            if vm.nics != nics {
                vm.nics = nics;
                changed = true;
            }
        }

        self.record(if created {
            Change::Created
        } else {
            Change::from(changed)
        });
        Ok(())
    }
}

fn identity_attributes(identity: &DeviceIdentity) -> DeviceAttributes {
    match identity {
        DeviceIdentity::Serial {
            manufacturer,
            serial,
        } => DeviceAttributes {
            manufacturer: Some(manufacturer.clone()),
            serial: Some(serial.clone()),
            ..Default::default()
        },
        DeviceIdentity::Hostname { name } => DeviceAttributes {
            name: Some(name.clone()),
            ..Default::default()
        },
    }
}

#[async_trait]
impl TopologyStore for InMemoryTopologyStore {
    async fn apply(
        &self,
        changes: &ChangeSet,
        context: &ApplyContext,
    ) -> Result<AppliedChanges, TopologyError> {
        let mut state = self.state.write().await;
        let mut staging = Staging::new(state.clone(), context);

        for upsert in changes.upserts() {
            staging.apply(upsert)?;
        }

        *state = staging.state;
        debug!(
            address = %context.address,
            created = staging.applied.created,
            updated = staging.applied.updated,
            unchanged = staging.applied.unchanged,
            "Applied change set"
        );
        Ok(staging.applied)
    }

    async fn snapshot(&self) -> Result<TopologySnapshot, TopologyError> {
        Ok(self.state.read().await.clone())
    }

    async fn device(&self, id: DeviceId) -> Result<Option<Device>, TopologyError> {
        let state = self.state.read().await;
        let id = surviving(&state, id);
        Ok(state.devices.iter().find(|d| d.id == id).cloned())
    }

    async fn find_device(
        &self,
        identity: &DeviceIdentity,
    ) -> Result<Option<Device>, TopologyError> {
        let state = self.state.read().await;
        Ok(unique_device(&state.devices, identity)?.map(|index| state.devices[index].clone()))
    }
}
