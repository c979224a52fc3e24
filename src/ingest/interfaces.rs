// Copyright (c) 2025 - Cowboy AI, Inc.
//! `show ip interface` → interfaces, addresses and VRF membership

use super::{require_str, str_field, str_list, IngestContext, Ingestor};
use crate::domain::{
    DeviceAttributes, InterfaceAttributes, InterfaceKey, InterfaceName, IpAddressWithCidr,
};
use crate::errors::IngestError;
use crate::log_store::Record;
use crate::topology::{ChangeSet, DeviceRef, TopologyUpsert};

const TEMPLATE: &str = "show ip interface";

#[derive(Debug, Clone, Copy, Default)]
pub struct IpInterfaceIngestor;

/// Pair `ip_address[i]` with `prefix_length[i]`
fn addresses(record: &Record, interface: &str) -> Result<Vec<IpAddressWithCidr>, IngestError> {
    let ips = str_list(record, "ip_address");
    let prefixes = str_list(record, "prefix_length");
    if ips.len() != prefixes.len() {
        return Err(IngestError::InvalidField {
            field: "prefix_length".to_string(),
            value: prefixes.join(","),
            reason: format!(
                "{} has {} addresses but {} prefix lengths",
                interface,
                ips.len(),
                prefixes.len()
            ),
        });
    }

    ips.iter()
        .zip(prefixes.iter())
        .map(|(ip, prefix)| {
            let cidr = format!("{}/{}", ip, prefix);
            IpAddressWithCidr::new(&cidr).map_err(|e| IngestError::InvalidField {
                field: "ip_address".to_string(),
                value: cidr,
                reason: e.to_string(),
            })
        })
        .collect()
}

impl Ingestor for IpInterfaceIngestor {
    fn template(&self) -> &str {
        TEMPLATE
    }

    fn ingest(
        &self,
        records: &[Record],
        context: &IngestContext<'_>,
    ) -> Result<ChangeSet, IngestError> {
        let mut changes = ChangeSet::new().with(TopologyUpsert::Device {
            target: DeviceRef::Discoverable,
            attributes: DeviceAttributes {
                management_ip: Some(context.discoverable.address),
                ..Default::default()
            },
        });

        for record in records {
            let link_status = str_field(record, "link_status");
            if link_status == Some("deleted") {
                continue;
            }

            let raw_name = require_str(record, "interface", TEMPLATE)?;
            let name = InterfaceName::normalize(raw_name);

            let vrf = str_field(record, "vrf").map(str::to_string);
            if let Some(vrf) = &vrf {
                changes.push(TopologyUpsert::Vrf { name: vrf.clone() });
            }

            changes.push(TopologyUpsert::Interface {
                device: DeviceRef::Discoverable,
                key: InterfaceKey::Name(name.clone()),
                vrf,
                attributes: InterfaceAttributes {
                    name: Some(name),
                    addresses: Some(addresses(record, raw_name)?),
                    enabled: link_status.map(|status| status != "administratively down"),
                    ..Default::default()
                },
            });
        }

        Ok(changes)
    }
}
