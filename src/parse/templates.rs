// Copyright (c) 2025 - Cowboy AI, Inc.
//! Built-in Templates
//!
//! Each template turns the raw output of one command into records shaped
//! like the community TextFSM templates for the same command, so ingestors
//! can be written against a familiar field layout.
//!
//! | Template           | Record fields                                                  |
//! |--------------------|----------------------------------------------------------------|
//! | `HOSTNAME`         | `hostname`                                                     |
//! | `show inventory`   | `name`, `descr`, `pid`, `vid`, `sn`                            |
//! | `show ip interface`| `interface`, `link_status`, `protocol_status`, `ip_address[]`, |
//! |                    | `prefix_length[]`, `vrf`                                       |
//! | `show vlan brief`  | `vlan_id`, `name`, `status`, `interfaces[]`                    |
//! | `show vrf`         | `vrf`                                                          |
//! | `show ip route`    | `protocol`, `network`, `prefix_length`, `distance`, `metric`,  |
//! |                    | `nexthop_ip`, `nexthop_if`                                     |
//! | JSON pass-through  | the API object itself                                          |

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{json, Value};

use super::Template;
use crate::errors::ParseError;
use crate::log_store::{RawOutput, Record};

static HOSTNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*hostname\s+(\S+)").expect("Invalid regex pattern"));

static INVENTORY_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"NAME:\s*"([^"]*)"\s*,\s*DESCR:\s*"([^"]*)""#).expect("Invalid regex pattern")
});

static INVENTORY_PID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"PID:\s*([^,]*?)\s*,\s*VID:\s*([^,]*?)\s*,\s*SN:\s*(\S*)")
        .expect("Invalid regex pattern")
});

static IP_INTERFACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\S+) is (.+?), line protocol is (\S+)").expect("Invalid regex pattern")
});

static IP_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+(?:Internet address is|Secondary address)\s+([0-9a-fA-F.:]+)/(\d+)")
        .expect("Invalid regex pattern")
});

static VRF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s+VPN Routing/Forwarding\s+"([^"]+)""#).expect("Invalid regex pattern")
});

/// XR prefixes command output with the time it ran
static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun)\s+\w+\s+\d+\s+\d{1,2}:\d{2}:\d{2}")
        .expect("Invalid regex pattern")
});

/// `O E2    10.2.0.0/16 [110/20] via 10.0.0.2, 00:01:02, Gi0/0`
static ROUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<code>[A-Za-z]{1,2}\*?(?: [A-Za-z0-9]{1,2})?)\*?\s+",
        r"(?P<network>\d+\.\d+\.\d+\.\d+)(?:/(?P<len>\d+))?\s+",
        r"(?:\[(?P<distance>\d+)/(?P<metric>\d+)\]\s+via\s+(?P<nexthop>[\d.]+),?\s*(?P<rest>.*)",
        r"|is directly connected,\s*(?P<connected>.*))$",
    ))
    .expect("Invalid regex pattern")
});

/// Equal-cost continuation under the previous route
static ROUTE_CONTINUATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+\[(\d+)/(\d+)\]\s+via\s+([\d.]+),?\s*(.*)$").expect("Invalid regex pattern")
});

/// `      10.0.0.0/24 is subnetted, 2 subnets`
static SUBNETTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+\d+\.\d+\.\d+\.\d+/(\d+) is subnetted").expect("Invalid regex pattern")
});

/// NX-OS `10.1.0.0/16, ubest/mbest: 1/0`
static NXOS_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+\.\d+\.\d+\.\d+)/(\d+), ubest/mbest").expect("Invalid regex pattern")
});

/// NX-OS `    *via 10.0.0.2, Eth1/1, [110/41], 2d01h, ospf-1, intra`
static NXOS_VIA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s+\*via\s+(?P<nexthop>[\d.]+)(?:%\S+?)?,\s*",
        r"(?:(?P<interface>[A-Za-z][^,\[]*?),\s*)?",
        r"\[(?P<distance>\d+)/(?P<metric>\d+)\],\s*[^,]+,\s*(?P<protocol>[^,\s]+)",
    ))
    .expect("Invalid regex pattern")
});

static VLAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s+(\S+)\s+(\S+)\s*(.*)$").expect("Invalid regex pattern"));

fn text<'a>(template: &str, raw: &'a RawOutput) -> Result<&'a str, ParseError> {
    raw.as_text().ok_or_else(|| {
        ParseError::UnexpectedPayload(format!("template '{}' expects text output", template))
    })
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Non-empty output that produced nothing is a template mismatch
fn require_records(template: &str, raw: &str, records: Vec<Record>) -> Result<Vec<Record>, ParseError> {
    if records.is_empty() && !raw.trim().is_empty() {
        return Err(ParseError::Malformed {
            template: template.to_string(),
            reason: "output matched no records".to_string(),
        });
    }
    Ok(records)
}

/// VRF names listed by `show vrf` (IOS, NX-OS) or `show vrf all` (XR)
///
/// Data rows start at column 0-2; deeper indented lines are continuations
/// (wrapped interface lists, route-target rows).
pub fn vrf_names(output: &str) -> Vec<String> {
    const HEADERS: &[&str] = &["name", "vrf", "vrf-name"];

    let mut names = Vec::new();
    for line in output.lines() {
        let indent = line.len() - line.trim_start().len();
        let Some(first) = line.split_whitespace().next() else {
            continue;
        };
        if indent > 2
            || TIMESTAMP_RE.is_match(line)
            || HEADERS.contains(&first.to_ascii_lowercase().as_str())
            || first.starts_with('%')
            || first.starts_with('-')
        {
            continue;
        }
        if !names.iter().any(|n| n == first) {
            names.push(first.to_string());
        }
    }
    names
}

/// Structured API output passed through unchanged
#[derive(Debug, Clone)]
pub struct JsonTemplate {
    id: String,
}

impl JsonTemplate {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Template for JsonTemplate {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&self, raw: &RawOutput) -> Result<Vec<Record>, ParseError> {
        let value = match raw {
            RawOutput::Json(value) => value.clone(),
            // Older capabilities hand JSON back as a string
            RawOutput::Text(text) => {
                serde_json::from_str(text).map_err(|e| ParseError::Malformed {
                    template: self.id.clone(),
                    reason: e.to_string(),
                })?
            }
            RawOutput::Failed(_) => {
                return Err(ParseError::UnexpectedPayload(
                    "query failure has no output".to_string(),
                ))
            }
        };

        match value {
            Value::Object(map) => Ok(vec![map]),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(ParseError::Malformed {
                        template: self.id.clone(),
                        reason: format!("expected object in array, found {}", other),
                    }),
                })
                .collect(),
            other => Err(ParseError::Malformed {
                template: self.id.clone(),
                reason: format!("expected object or array, found {}", other),
            }),
        }
    }
}

/// `hostname <name>` lines from a running-config filter
#[derive(Debug, Clone, Copy, Default)]
pub struct HostnameTemplate;

impl Template for HostnameTemplate {
    fn id(&self) -> &str {
        crate::orchestrator::pipeline::HOSTNAME_TEMPLATE
    }

    fn apply(&self, raw: &RawOutput) -> Result<Vec<Record>, ParseError> {
        let output = text(self.id(), raw)?;
        let records = output
            .lines()
            .filter_map(|line| HOSTNAME_RE.captures(line))
            .map(|caps| record(json!({ "hostname": &caps[1] })))
            .take(1)
            .collect();
        require_records(self.id(), output, records)
    }
}

/// Cisco `show inventory`
#[derive(Debug, Clone, Copy, Default)]
pub struct ShowInventoryTemplate;

impl Template for ShowInventoryTemplate {
    fn id(&self) -> &str {
        "show inventory"
    }

    fn apply(&self, raw: &RawOutput) -> Result<Vec<Record>, ParseError> {
        let output = text(self.id(), raw)?;
        let mut records = Vec::new();
        let mut pending: Option<(String, String)> = None;

        for line in output.lines() {
            if let Some(caps) = INVENTORY_NAME_RE.captures(line) {
                pending = Some((caps[1].trim().to_string(), caps[2].trim().to_string()));
            } else if let Some(caps) = INVENTORY_PID_RE.captures(line) {
                let (name, descr) = pending.take().unwrap_or_default();
                records.push(record(json!({
                    "name": name,
                    "descr": descr,
                    "pid": caps[1].trim(),
                    "vid": caps[2].trim(),
                    "sn": caps[3].trim(),
                })));
            }
        }

        require_records(self.id(), output, records)
    }
}

/// Cisco IOS `show ip interface`
#[derive(Debug, Clone, Copy, Default)]
pub struct ShowIpInterfaceTemplate;

impl Template for ShowIpInterfaceTemplate {
    fn id(&self) -> &str {
        "show ip interface"
    }

    fn apply(&self, raw: &RawOutput) -> Result<Vec<Record>, ParseError> {
        let output = text(self.id(), raw)?;
        let mut records: Vec<Record> = Vec::new();

        for line in output.lines() {
            if let Some(caps) = IP_INTERFACE_RE.captures(line) {
                records.push(record(json!({
                    "interface": &caps[1],
                    "link_status": &caps[2],
                    "protocol_status": &caps[3],
                    "ip_address": [],
                    "prefix_length": [],
                    "vrf": "",
                })));
                continue;
            }

            let Some(current) = records.last_mut() else {
                continue;
            };

            if let Some(caps) = IP_ADDRESS_RE.captures(line) {
                for (field, value) in [("ip_address", &caps[1]), ("prefix_length", &caps[2])] {
                    if let Some(Value::Array(values)) = current.get_mut(field) {
                        values.push(Value::String(value.to_string()));
                    }
                }
            } else if let Some(caps) = VRF_RE.captures(line) {
                current.insert("vrf".to_string(), Value::String(caps[1].to_string()));
            }
        }

        require_records(self.id(), output, records)
    }
}

/// Cisco `show vlan brief`
#[derive(Debug, Clone, Copy, Default)]
pub struct ShowVlanBriefTemplate;

impl ShowVlanBriefTemplate {
    fn ports(list: &str) -> impl Iterator<Item = Value> + '_ {
        list.split(',')
            .map(str::trim)
            .filter(|port| !port.is_empty())
            .map(|port| Value::String(port.to_string()))
    }
}

impl Template for ShowVlanBriefTemplate {
    fn id(&self) -> &str {
        "show vlan brief"
    }

    fn apply(&self, raw: &RawOutput) -> Result<Vec<Record>, ParseError> {
        let output = text(self.id(), raw)?;
        let mut records: Vec<Record> = Vec::new();

        for line in output.lines() {
            if let Some(caps) = VLAN_RE.captures(line) {
                let interfaces: Vec<Value> = Self::ports(&caps[4]).collect();
                records.push(record(json!({
                    "vlan_id": &caps[1],
                    "name": &caps[2],
                    "status": &caps[3],
                    "interfaces": interfaces,
                })));
            } else if line.starts_with(char::is_whitespace) && !line.trim().is_empty() {
                // Wrapped port list
                if let Some(Value::Array(ports)) = records
                    .last_mut()
                    .and_then(|current| current.get_mut("interfaces"))
                {
                    ports.extend(Self::ports(line));
                }
            }
        }

        require_records(self.id(), output, records)
    }
}

/// VRF list
#[derive(Debug, Clone)]
pub struct ShowVrfTemplate {
    id: String,
}

impl ShowVrfTemplate {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Template for ShowVrfTemplate {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&self, raw: &RawOutput) -> Result<Vec<Record>, ParseError> {
        let output = text(&self.id, raw)?;
        Ok(vrf_names(output)
            .into_iter()
            .map(|vrf| record(json!({ "vrf": vrf })))
            .collect())
    }
}

/// Cisco routing table: IOS and XR code-prefixed rows, NX-OS `*via` rows
#[derive(Debug, Clone)]
pub struct ShowIpRouteTemplate {
    id: String,
}

impl ShowIpRouteTemplate {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Interface is the last trailing field that is not an age (`00:01:02`, `3d01h`)
    fn interface(rest: &str) -> &str {
        rest.split(',')
            .map(str::trim)
            .rev()
            .find(|field| field.starts_with(|c: char| c.is_ascii_alphabetic()))
            .unwrap_or_default()
    }

    fn group<'h>(caps: &Captures<'h>, name: &str) -> &'h str {
        caps.name(name).map_or("", |m| m.as_str())
    }

    fn route(
        protocol: &str,
        network: &str,
        prefix_length: &str,
        distance: &str,
        metric: &str,
        nexthop_ip: &str,
        nexthop_if: &str,
    ) -> Record {
        record(json!({
            "protocol": protocol.trim(),
            "network": network,
            "prefix_length": prefix_length,
            "distance": distance,
            "metric": metric,
            "nexthop_ip": nexthop_ip,
            "nexthop_if": nexthop_if,
        }))
    }
}

impl Template for ShowIpRouteTemplate {
    fn id(&self) -> &str {
        &self.id
    }

    /// An empty table is valid output, so no records is not a mismatch
    fn apply(&self, raw: &RawOutput) -> Result<Vec<Record>, ParseError> {
        let output = text(&self.id, raw)?;
        let mut records: Vec<Record> = Vec::new();
        let mut subnet_length: Option<String> = None;
        // (protocol, network, prefix length) of the row being continued
        let mut current: Option<(String, String, String)> = None;

        for line in output.lines() {
            if let Some(caps) = SUBNETTED_RE.captures(line) {
                subnet_length = Some(caps[1].to_string());
            } else if let Some(caps) = ROUTE_RE.captures(line) {
                let prefix_length = caps
                    .name("len")
                    .map(|m| m.as_str().to_string())
                    .or_else(|| subnet_length.clone())
                    .unwrap_or_default();
                let entry = (
                    caps["code"].to_string(),
                    caps["network"].to_string(),
                    prefix_length,
                );
                let rest = caps
                    .name("rest")
                    .or_else(|| caps.name("connected"))
                    .map_or("", |m| m.as_str());
                records.push(Self::route(
                    &entry.0,
                    &entry.1,
                    &entry.2,
                    Self::group(&caps, "distance"),
                    Self::group(&caps, "metric"),
                    Self::group(&caps, "nexthop"),
                    Self::interface(rest),
                ));
                current = Some(entry);
            } else if let Some(caps) = ROUTE_CONTINUATION_RE.captures(line) {
                if let Some((protocol, network, prefix_length)) = &current {
                    records.push(Self::route(
                        protocol,
                        network,
                        prefix_length,
                        &caps[1],
                        &caps[2],
                        &caps[3],
                        Self::interface(&caps[4]),
                    ));
                }
            } else if let Some(caps) = NXOS_PREFIX_RE.captures(line) {
                current = Some((String::new(), caps[1].to_string(), caps[2].to_string()));
            } else if let Some(caps) = NXOS_VIA_RE.captures(line) {
                if let Some((_, network, prefix_length)) = &current {
                    records.push(Self::route(
                        &caps["protocol"],
                        network,
                        prefix_length,
                        &caps["distance"],
                        &caps["metric"],
                        &caps["nexthop"],
                        Self::group(&caps, "interface").trim(),
                    ));
                }
            } else if !line.starts_with(char::is_whitespace) {
                current = None;
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(text: &str) -> RawOutput {
        RawOutput::Text(text.to_string())
    }

    #[test]
    fn test_hostname() {
        let records = HostnameTemplate.apply(&raw("hostname core-sw1\n")).unwrap();
        assert_eq!(records, vec![record(json!({"hostname": "core-sw1"}))]);

        let result = HostnameTemplate.apply(&raw("% Invalid syntax"));
        assert!(matches!(result, Err(ParseError::Malformed { .. })));

        assert!(HostnameTemplate.apply(&raw("")).unwrap().is_empty());
    }

    #[test]
    fn test_show_inventory() {
        let output = r#"NAME: "Chassis", DESCR: "Cisco Catalyst Chassis"
PID: WS-C1             , VID: V01  , SN: ABC123

NAME: "Power Supply 1", DESCR: "AC Power Supply"
PID: PWR-1             , VID: V02  , SN: PSU001
"#;
        let records = ShowInventoryTemplate.apply(&raw(output)).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            record(json!({
                "name": "Chassis",
                "descr": "Cisco Catalyst Chassis",
                "pid": "WS-C1",
                "vid": "V01",
                "sn": "ABC123",
            }))
        );
        assert_eq!(records[1]["sn"], "PSU001");
    }

    #[test]
    fn test_show_ip_interface() {
        let output = "\
GigabitEthernet0/0 is up, line protocol is up
  Internet address is 10.0.0.1/24
  Broadcast address is 255.255.255.255
  Secondary address 10.0.1.1/24
  VPN Routing/Forwarding \"MGMT\"
GigabitEthernet0/1 is administratively down, line protocol is down
  Internet protocol processing disabled
";
        let records = ShowIpInterfaceTemplate.apply(&raw(output)).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            record(json!({
                "interface": "GigabitEthernet0/0",
                "link_status": "up",
                "protocol_status": "up",
                "ip_address": ["10.0.0.1", "10.0.1.1"],
                "prefix_length": ["24", "24"],
                "vrf": "MGMT",
            }))
        );
        assert_eq!(records[1]["link_status"], "administratively down");
        assert_eq!(records[1]["ip_address"], json!([]));
    }

    #[test]
    fn test_show_vlan_brief() {
        let output = "\
VLAN Name                             Status    Ports
---- -------------------------------- --------- -------------------------------
1    default                          active    Gi0/1, Gi0/2
10   USERS                            active    Gi0/3, Gi0/4,
                                                Gi0/5
1002 fddi-default                     act/unsup
";
        let records = ShowVlanBriefTemplate.apply(&raw(output)).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[1]["vlan_id"], "10");
        assert_eq!(records[1]["interfaces"], json!(["Gi0/3", "Gi0/4", "Gi0/5"]));
        assert_eq!(records[2]["status"], "act/unsup");
        assert_eq!(records[2]["interfaces"], json!([]));
    }

    #[test]
    fn test_vrf_names() {
        let ios = "  Name                             Default RD            Protocols   Interfaces
  MGMT                             <not set>             ipv4        Gi0/0
  CUST_A                           65000:1               ipv4,ipv6   Gi0/1
                                                                     Gi0/2
";
        assert_eq!(vrf_names(ios), vec!["MGMT", "CUST_A"]);

        let nxos = "VRF-Name                           VRF-ID State   Reason
default                                 1 Up      --
management                              2 Up      --
";
        assert_eq!(vrf_names(nxos), vec!["default", "management"]);
    }

    #[test]
    fn test_vrf_names_skip_xr_timestamp() {
        let xr = "Mon Oct 19 10:00:00.123 UTC

VRF                  RD                  RT                         AFI   SAFI
mgmt                 not set
CUST_A               65000:1
                                         import  65000:1            IPV4  Unicast
";
        assert_eq!(vrf_names(xr), vec!["mgmt", "CUST_A"]);
    }

    #[test]
    fn test_show_ip_route_ios() {
        let output = "\
Codes: L - local, C - connected, S - static, R - RIP, M - mobile, B - BGP
       O - OSPF, IA - OSPF inter area, E1 - OSPF external type 1

Gateway of last resort is 10.0.0.2 to network 0.0.0.0

S*    0.0.0.0/0 [1/0] via 10.0.0.2
      10.0.0.0/8 is variably subnetted, 4 subnets, 2 masks
C        10.0.0.0/24 is directly connected, GigabitEthernet0/0
L        10.0.0.1/32 is directly connected, GigabitEthernet0/0
O E2     10.2.0.0/16 [110/20] via 10.0.0.2, 00:01:02, GigabitEthernet0/0
                     [110/20] via 10.0.0.3, 00:01:02, GigabitEthernet0/1
      172.16.0.0/24 is subnetted, 1 subnets
D        172.16.5.0 [90/3072] via 10.0.0.3, 1d02h, GigabitEthernet0/1
";
        let template = ShowIpRouteTemplate::new("show ip route");
        let records = template.apply(&raw(output)).unwrap();

        assert_eq!(records.len(), 6);
        assert_eq!(
            records[0],
            record(json!({
                "protocol": "S*",
                "network": "0.0.0.0",
                "prefix_length": "0",
                "distance": "1",
                "metric": "0",
                "nexthop_ip": "10.0.0.2",
                "nexthop_if": "",
            }))
        );
        assert_eq!(records[1]["nexthop_if"], "GigabitEthernet0/0");
        assert_eq!(records[1]["nexthop_ip"], "");
        assert_eq!(records[3]["protocol"], "O E2");
        assert_eq!(records[4]["protocol"], "O E2");
        assert_eq!(records[4]["network"], "10.2.0.0");
        assert_eq!(records[4]["nexthop_ip"], "10.0.0.3");
        assert_eq!(records[4]["nexthop_if"], "GigabitEthernet0/1");
        assert_eq!(records[5]["network"], "172.16.5.0");
        assert_eq!(records[5]["prefix_length"], "24");
    }

    #[test]
    fn test_show_route_xr() {
        let output = "\
Mon Oct 19 10:00:00.123 UTC

Codes: C - connected, S - static, R - RIP, B - BGP, (>) - Diversion path

Gateway of last resort is not set

C    10.0.0.0/24 is directly connected, 3d01h, GigabitEthernet0/0/0/0
L    10.0.0.1/32 is directly connected, 3d01h, GigabitEthernet0/0/0/0
O    10.1.0.0/16 [110/20] via 10.0.0.2, 00:01:02, GigabitEthernet0/0/0/0
";
        let records = ShowIpRouteTemplate::new("show route")
            .apply(&raw(output))
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["nexthop_if"], "GigabitEthernet0/0/0/0");
        assert_eq!(records[2]["distance"], "110");
        assert_eq!(records[2]["nexthop_ip"], "10.0.0.2");
    }

    #[test]
    fn test_show_ip_route_nxos() {
        let output = "\
IP Route Table for VRF \"default\"
'*' denotes best ucast next-hop

10.0.0.0/24, ubest/mbest: 1/0, attached
    *via 10.0.0.1, Eth1/1, [0/0], 2d01h, direct
10.1.0.0/16, ubest/mbest: 1/0
    *via 10.0.0.2, Eth1/1, [110/41], 2d01h, ospf-1, intra
0.0.0.0/0, ubest/mbest: 1/0
    *via 10.0.0.254, [1/0], 2d01h, static
";
        let records = ShowIpRouteTemplate::new("show ip route")
            .apply(&raw(output))
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["protocol"], "direct");
        assert_eq!(records[0]["nexthop_if"], "Eth1/1");
        assert_eq!(records[1]["protocol"], "ospf-1");
        assert_eq!(records[1]["metric"], "41");
        assert_eq!(records[2]["prefix_length"], "0");
        assert_eq!(records[2]["nexthop_if"], "");
        assert_eq!(records[2]["protocol"], "static");
    }

    #[test]
    fn test_show_ip_route_empty_table() {
        let output = "Routing Table: CUST_A\nGateway of last resort is not set\n";
        let records = ShowIpRouteTemplate::new("show ip route")
            .apply(&raw(output))
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_json_passthrough() {
        let template = JsonTemplate::new("pyVmomi");

        let records = template
            .apply(&RawOutput::Json(json!({"hosts": {}, "dvswitches": {}})))
            .unwrap();
        assert_eq!(records.len(), 1);

        let records = template.apply(&raw(r#"[{"a": 1}, {"a": 2}]"#)).unwrap();
        assert_eq!(records.len(), 2);

        let result = template.apply(&RawOutput::Json(json!(42)));
        assert!(matches!(result, Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_text_template_rejects_json() {
        let result = ShowInventoryTemplate.apply(&RawOutput::Json(json!({})));
        assert!(matches!(result, Err(ParseError::UnexpectedPayload(_))));
    }
}
