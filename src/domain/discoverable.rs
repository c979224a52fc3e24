// Copyright (c) 2025 - Cowboy AI, Inc.
//! Discoverable Entity
//!
//! A discoverable is a network endpoint registered for discovery: a switch or
//! router reached over CLI, or a hypervisor manager reached over its API.
//! Discoverables are created by operators or imports and are never deleted by
//! the pipeline; the orchestrator only moves their status and timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use super::{DeviceId, EntityId, Platform};

/// Discoverable identity
pub type DiscoverableId = EntityId<Discoverable>;

/// Host-level discovery status
///
/// Transitions are defined by the state machine in
/// [`crate::state_machine::discovery_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    /// Never discovered, or re-queued by an operator
    #[default]
    Pending,
    /// Last run had at least one successful query
    Discovered,
    /// Last run produced no successful query
    Failed,
}

impl fmt::Display for DiscoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryStatus::Pending => write!(f, "pending"),
            DiscoveryStatus::Discovered => write!(f, "discovered"),
            DiscoveryStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Name of a credential set held by a [`crate::query::CredentialResolver`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialRef(String);

impl CredentialRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-protocol connection options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolOptions {
    /// Validate the target's TLS certificate (API platforms)
    #[serde(default = "default_verify_cert")]
    pub verify_cert: bool,
}

fn default_verify_cert() -> bool {
    true
}

impl Default for ProtocolOptions {
    fn default() -> Self {
        Self {
            verify_cert: default_verify_cert(),
        }
    }
}

/// A network endpoint registered for discovery
///
/// The natural key is `(address, platform)`: the same address may be
/// discovered through more than one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discoverable {
    pub id: DiscoverableId,

    pub address: IpAddr,

    pub platform: Platform,

    pub credential: CredentialRef,

    #[serde(default)]
    pub options: ProtocolOptions,

    /// Disabled discoverables are kept for reference but never queried
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub status: DiscoveryStatus,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_discovered_at: Option<DateTime<Utc>>,

    /// Device this endpoint resolves to, bound on first ingestion
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub device: Option<DeviceId>,
}

fn default_enabled() -> bool {
    true
}

impl Discoverable {
    pub fn new(address: IpAddr, platform: Platform, credential: CredentialRef) -> Self {
        Self {
            id: DiscoverableId::new(),
            address,
            platform,
            credential,
            options: ProtocolOptions::default(),
            enabled: true,
            status: DiscoveryStatus::Pending,
            last_discovered_at: None,
            device: None,
        }
    }

    pub fn with_options(mut self, options: ProtocolOptions) -> Self {
        self.options = options;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl fmt::Display for Discoverable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.address, self.platform)
    }
}
