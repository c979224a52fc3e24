// Copyright (c) 2025 - Cowboy AI, Inc.
//! Interface Name Value Object
//!
//! Devices abbreviate interface names inconsistently between commands
//! (`Gi0/1` in one table, `GigabitEthernet0/1` in another). Interfaces are
//! keyed by name, so every name is expanded to its long form on the way in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Abbreviation → long form. Longer abbreviations must precede shorter ones
/// sharing a prefix.
const INTERFACE_TYPES: &[(&str, &str)] = &[
    ("Gi", "GigabitEthernet"),
    ("Te", "TenGigabitEthernet"),
    ("Twe", "TwentyFiveGigE"),
    ("Tw", "TwoGigabitEthernet"),
    ("Fo", "FortyGigabitEthernet"),
    ("Hu", "HundredGigE"),
    ("Fa", "FastEthernet"),
    ("Et", "Ethernet"),
    ("Lo", "Loopback"),
    ("Vl", "Vlan"),
    ("Po", "Port-channel"),
    ("Tu", "Tunnel"),
    ("Mg", "mgmt"),
    ("Nu", "Null"),
    ("Se", "Serial"),
    ("BE", "Bundle-Ether"),
];

/// Normalized interface name
///
/// # Examples
///
/// ```rust
/// use cim_discovery::domain::InterfaceName;
///
/// assert_eq!(InterfaceName::normalize("Gi0/1").as_str(), "GigabitEthernet0/1");
/// assert_eq!(InterfaceName::normalize("Vlan10").as_str(), "Vlan10");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceName(String);

impl InterfaceName {
    /// Expand a raw interface label to its canonical long form
    ///
    /// Unknown interface types are kept verbatim (trimmed).
    pub fn normalize(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim();
        let split = raw
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(raw.len());
        let (kind, rest) = raw.split_at(split);
        let kind_lower = kind.to_ascii_lowercase();

        if kind_lower.is_empty() {
            return Self(raw.to_string());
        }

        for (abbreviation, long) in INTERFACE_TYPES {
            let abbreviation_lower = abbreviation.to_ascii_lowercase();
            let long_lower = long.to_ascii_lowercase();
            // "BE" is not a prefix of "Bundle-Ether", so exact aliases match too
            if kind_lower == abbreviation_lower
                || (kind_lower.starts_with(&abbreviation_lower)
                    && long_lower.starts_with(&kind_lower))
            {
                return Self(format!("{}{}", long, rest));
            }
        }

        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InterfaceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InterfaceName {
    fn from(value: &str) -> Self {
        Self::normalize(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Gi0/1", "GigabitEthernet0/1"; "gigabit abbreviation")]
    #[test_case("GigabitEthernet0/1", "GigabitEthernet0/1"; "already long")]
    #[test_case("gig1/0/24", "GigabitEthernet1/0/24"; "lowercase partial")]
    #[test_case("Te1/1/1", "TenGigabitEthernet1/1/1"; "ten gigabit")]
    #[test_case("Tw1/0/1", "TwoGigabitEthernet1/0/1"; "two gigabit")]
    #[test_case("Twe1/0/1", "TwentyFiveGigE1/0/1"; "twenty five gigabit")]
    #[test_case("Fa0/0", "FastEthernet0/0"; "fast ethernet")]
    #[test_case("Eth1/1", "Ethernet1/1"; "nxos ethernet")]
    #[test_case("Lo0", "Loopback0"; "loopback")]
    #[test_case("Vl10", "Vlan10"; "svi")]
    #[test_case("Po1", "Port-channel1"; "port channel")]
    #[test_case("Mgmt0", "mgmt0"; "management")]
    #[test_case("BE100", "Bundle-Ether100"; "xr bundle")]
    #[test_case("  Gi0/2  ", "GigabitEthernet0/2"; "surrounding whitespace")]
    #[test_case("wlan0", "wlan0"; "unknown type kept")]
    fn test_normalize(raw: &str, expected: &str) {
        assert_eq!(InterfaceName::normalize(raw).as_str(), expected);
    }
}
