// Copyright (c) 2025 - Cowboy AI, Inc.
//! `show vlan brief` → VLANs on the device

use super::{require_str, str_field, IngestContext, Ingestor};
use crate::domain::{VlanAttributes, VlanId};
use crate::errors::IngestError;
use crate::log_store::Record;
use crate::topology::{ChangeSet, DeviceRef, TopologyUpsert};

const TEMPLATE: &str = "show vlan brief";

#[derive(Debug, Clone, Copy, Default)]
pub struct VlanBriefIngestor;

fn vlan_id(raw: &str) -> Result<VlanId, IngestError> {
    let invalid = |reason: String| IngestError::InvalidField {
        field: "vlan_id".to_string(),
        value: raw.to_string(),
        reason,
    };
    let id = raw.parse::<u16>().map_err(|e| invalid(e.to_string()))?;
    VlanId::new(id).map_err(|e| invalid(e.to_string()))
}

impl Ingestor for VlanBriefIngestor {
    fn template(&self) -> &str {
        TEMPLATE
    }

    fn ingest(
        &self,
        records: &[Record],
        _context: &IngestContext<'_>,
    ) -> Result<ChangeSet, IngestError> {
        let mut changes = ChangeSet::new();

        for record in records {
            let vid = vlan_id(require_str(record, "vlan_id", TEMPLATE)?)?;
            changes.push(TopologyUpsert::Vlan {
                device: DeviceRef::Discoverable,
                vid,
                attributes: VlanAttributes {
                    name: str_field(record, "name").map(str::to_string),
                    status: str_field(record, "status").map(str::to_string),
                },
            });
        }

        Ok(changes)
    }
}
