// Copyright (c) 2025 - Cowboy AI, Inc.
//! Discovery Platforms
//!
//! A platform names both how a target is queried (framework) and which vendor
//! dialect its output is in. Templates, ingestors and query capabilities are
//! all registered per platform.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Query framework used to reach a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    /// Interactive CLI session, free-text output
    Cli,
    /// Management API returning structured JSON
    Json,
}

/// Supported discovery platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    CiscoIos,
    CiscoNxos,
    CiscoXr,
    VmwareVsphere,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::CiscoIos,
        Platform::CiscoNxos,
        Platform::CiscoXr,
        Platform::VmwareVsphere,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::CiscoIos => "cisco_ios",
            Platform::CiscoNxos => "cisco_nxos",
            Platform::CiscoXr => "cisco_xr",
            Platform::VmwareVsphere => "vmware_vsphere",
        }
    }

    pub fn framework(&self) -> Framework {
        match self {
            Platform::CiscoIos | Platform::CiscoNxos | Platform::CiscoXr => Framework::Cli,
            Platform::VmwareVsphere => Framework::Json,
        }
    }

    /// Manufacturer recorded on devices identified through this platform
    pub fn vendor(&self) -> &'static str {
        match self {
            Platform::CiscoIos | Platform::CiscoNxos | Platform::CiscoXr => "Cisco",
            Platform::VmwareVsphere => "VMware",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    /// Accepts both bare names (`cisco_ios`) and framework-prefixed discovery
    /// modes (`netmiko_cisco_ios`, `json_vmware_vsphere`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s
            .strip_prefix("netmiko_")
            .or_else(|| s.strip_prefix("json_"))
            .unwrap_or(s);

        Platform::ALL
            .into_iter()
            .find(|platform| platform.as_str() == name)
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}
