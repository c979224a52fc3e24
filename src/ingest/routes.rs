// Copyright (c) 2025 - Cowboy AI, Inc.
//! `show ip route` / `show route` → routing table entries
//!
//! The VRF comes from the log (the command was scoped to it), not from the
//! records. Routes with neither a next-hop address nor a next-hop interface
//! carry nothing to reconcile and are skipped.

use std::collections::HashSet;
use std::net::IpAddr;

use super::{require_str, str_field, IngestContext, Ingestor};
use crate::domain::{
    InterfaceAttributes, InterfaceKey, InterfaceName, IpAddressWithCidr, RouteAttributes,
    RouteProtocol,
};
use crate::errors::IngestError;
use crate::log_store::Record;
use crate::topology::{ChangeSet, DeviceRef, TopologyUpsert};

/// Routing table ingestor for one template identifier
#[derive(Debug, Clone)]
pub struct RouteIngestor {
    template: &'static str,
}

impl RouteIngestor {
    pub const IOS: &'static str = "show ip route";
    pub const XR: &'static str = "show route";

    pub fn new(template: &'static str) -> Self {
        Self { template }
    }

    fn destination(&self, record: &Record) -> Result<IpAddressWithCidr, IngestError> {
        let network = require_str(record, "network", self.template)?;
        let cidr = match str_field(record, "prefix_length") {
            Some(prefix) => format!("{}/{}", network, prefix),
            None => network.to_string(),
        };
        IpAddressWithCidr::new(&cidr).map_err(|e| IngestError::InvalidField {
            field: "network".to_string(),
            value: cidr,
            reason: e.to_string(),
        })
    }
}

fn number<T: std::str::FromStr>(record: &Record, field: &str) -> Result<Option<T>, IngestError>
where
    T::Err: std::fmt::Display,
{
    str_field(record, field)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| IngestError::InvalidField {
                field: field.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

impl Ingestor for RouteIngestor {
    fn template(&self) -> &str {
        self.template
    }

    fn ingest(
        &self,
        records: &[Record],
        context: &IngestContext<'_>,
    ) -> Result<ChangeSet, IngestError> {
        let mut changes = ChangeSet::new();

        let vrf = context
            .log
            .details
            .vrf
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        if let Some(name) = &vrf {
            changes.push(TopologyUpsert::Vrf { name: name.clone() });
        }

        let mut nexthop_interfaces = HashSet::new();
        for record in records {
            let nexthop_ip: Option<IpAddr> = number(record, "nexthop_ip")?;
            let nexthop_interface = str_field(record, "nexthop_if").map(InterfaceName::normalize);
            if nexthop_ip.is_none() && nexthop_interface.is_none() {
                continue;
            }

            let nexthop_interface = nexthop_interface.map(|name| {
                let key = InterfaceKey::Name(name.clone());
                if nexthop_interfaces.insert(key.clone()) {
                    changes.push(TopologyUpsert::Interface {
                        device: DeviceRef::Discoverable,
                        key: key.clone(),
                        vrf: None,
                        attributes: InterfaceAttributes {
                            name: Some(name),
                            ..Default::default()
                        },
                    });
                }
                key
            });

            changes.push(TopologyUpsert::Route {
                device: DeviceRef::Discoverable,
                vrf: vrf.clone(),
                destination: self.destination(record)?,
                protocol: RouteProtocol::from_code(str_field(record, "protocol").unwrap_or_default()),
                nexthop_ip,
                nexthop_interface,
                attributes: RouteAttributes {
                    distance: number(record, "distance")?,
                    metric: number(record, "metric")?,
                },
            });
        }

        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Platform;
    use crate::ingest::test_support::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ingest(vrf: Option<&str>, records_json: serde_json::Value) -> Result<ChangeSet, IngestError> {
        let discoverable = discoverable(Platform::CiscoIos);
        let mut log = log_for(&discoverable, RouteIngestor::IOS);
        log.details.vrf = vrf.map(str::to_string);
        let context = IngestContext {
            discoverable: &discoverable,
            log: &log,
        };
        RouteIngestor::new(RouteIngestor::IOS).ingest(&records(records_json), &context)
    }

    fn route(protocol: &str, network: &str, nexthop_ip: &str, nexthop_if: &str) -> serde_json::Value {
        json!({
            "protocol": protocol,
            "network": network,
            "prefix_length": "24",
            "distance": "110",
            "metric": "20",
            "nexthop_ip": nexthop_ip,
            "nexthop_if": nexthop_if,
        })
    }

    #[test]
    fn test_routes_in_vrf() {
        let changes = ingest(
            Some("CUST_A"),
            json!([
                route("O", "10.1.0.0", "10.0.0.2", "Gi0/0"),
                route("O", "10.2.0.0", "10.0.0.2", "GigabitEthernet0/0"),
            ]),
        )
        .unwrap();

        // VRF, one shared next-hop interface, two routes
        assert_eq!(changes.len(), 4);
        assert_eq!(
            changes.upserts()[0],
            TopologyUpsert::Vrf {
                name: "CUST_A".to_string()
            }
        );
        let gi0 = InterfaceKey::Name(InterfaceName::normalize("GigabitEthernet0/0"));
        assert!(matches!(
            &changes.upserts()[1],
            TopologyUpsert::Interface { key, .. } if key == &gi0
        ));
        match &changes.upserts()[3] {
            TopologyUpsert::Route {
                vrf,
                destination,
                protocol,
                nexthop_ip,
                nexthop_interface,
                attributes,
                ..
            } => {
                assert_eq!(vrf.as_deref(), Some("CUST_A"));
                assert_eq!(destination, &IpAddressWithCidr::new("10.2.0.0/24").unwrap());
                assert_eq!(*protocol, RouteProtocol::Ospf);
                assert_eq!(*nexthop_ip, Some("10.0.0.2".parse().unwrap()));
                assert_eq!(nexthop_interface.as_ref(), Some(&gi0));
                assert_eq!(attributes.distance, Some(110));
                assert_eq!(attributes.metric, Some(20));
            }
            other => panic!("unexpected upsert {:?}", other),
        }
    }

    #[test]
    fn test_route_without_nexthop_is_skipped() {
        let changes = ingest(
            None,
            json!([
                route("B", "10.9.0.0", "", ""),
                {
                    "protocol": "C",
                    "network": "10.0.0.0",
                    "prefix_length": "24",
                    "distance": "",
                    "metric": "",
                    "nexthop_ip": "",
                    "nexthop_if": "Gi0/0",
                },
            ]),
        )
        .unwrap();

        // Connected route and its interface; no VRF outside a VRF table
        assert_eq!(changes.len(), 2);
        match &changes.upserts()[1] {
            TopologyUpsert::Route {
                vrf,
                protocol,
                nexthop_ip,
                attributes,
                ..
            } => {
                assert_eq!(*vrf, None);
                assert_eq!(*protocol, RouteProtocol::Connected);
                assert_eq!(*nexthop_ip, None);
                assert_eq!(attributes, &RouteAttributes::default());
            }
            other => panic!("unexpected upsert {:?}", other),
        }
    }

    #[test]
    fn test_invalid_nexthop_address() {
        let result = ingest(None, json!([route("S", "10.1.0.0", "10.0.0.300", "")]));
        assert!(matches!(
            result,
            Err(IngestError::InvalidField { field, .. }) if field == "nexthop_ip"
        ));
    }

    #[test]
    fn test_missing_network() {
        let result = ingest(None, json!([{"protocol": "S", "nexthop_ip": "10.0.0.2"}]));
        assert!(matches!(result, Err(IngestError::MissingField { .. })));
    }
}
