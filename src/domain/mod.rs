// Copyright (c) 2025 - Cowboy AI, Inc.
//! Discovery Domain Models
//!
//! Value objects and entities shared by every pipeline stage.
//!
//! # Value Objects
//!
//! - [`IpAddressWithCidr`] - IPv4/IPv6 with optional prefix length
//! - [`MacAddress`] - 48-bit MAC address in canonical notation
//! - [`VlanId`] - IEEE 802.1Q VLAN ID (1-4094)
//! - [`InterfaceName`] - Interface label expanded to its long form
//! - [`Platform`] - Vendor dialect and query framework of a target
//! - [`EntityId`] - Typed surrogate identifier
//!
//! # Entities
//!
//! - [`Discoverable`] - Endpoint registered for discovery
//! - [`Device`], [`Interface`], [`Vlan`] - Physical topology
//! - [`Vrf`], [`Route`] - Routing
//! - [`VirtualSwitch`], [`PortGroup`], [`VirtualMachine`] - Virtual topology

pub mod discoverable;
pub mod entity_id;
pub mod interface_name;
pub mod network;
pub mod platform;
pub mod topology;

pub use discoverable::{
    CredentialRef, Discoverable, DiscoverableId, DiscoveryStatus, ProtocolOptions,
};
pub use entity_id::EntityId;
pub use interface_name::InterfaceName;
pub use network::{IpAddressWithCidr, MacAddress, NetworkError, VlanId};
pub use platform::{Framework, Platform, UnknownPlatform};
pub use topology::{
    Device, DeviceAttributes, DeviceId, DeviceIdentity, GuestInfo, Interface,
    InterfaceAttributes, InterfaceId, InterfaceKey, NicBacking, PortGroup, PortGroupAttributes,
    PortGroupId, Route, RouteAttributes, RouteId, RouteKey, RouteProtocol, SwitchScope,
    VirtualMachine, VirtualMachineAttributes, VirtualMachineId, VirtualSwitch,
    VirtualSwitchAttributes, VirtualSwitchId, Vlan, VlanAttributes, VmNic, Vrf, VrfId,
};
