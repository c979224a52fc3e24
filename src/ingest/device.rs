// Copyright (c) 2025 - Cowboy AI, Inc.
//! `show inventory` → device identity
//!
//! The chassis entry carries the serial number and model of the box. Older
//! platforms list no chassis entry; their first entry describes the box
//! when it has a name, serial and part number.

use super::{str_field, IngestContext, Ingestor};
use crate::domain::DeviceAttributes;
use crate::errors::IngestError;
use crate::log_store::Record;
use crate::topology::{ChangeSet, DeviceRef, TopologyUpsert};

/// Model recorded when the inventory names no usable part
pub fn default_model(vendor: &str) -> String {
    format!("{} Unknown device", vendor)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryIngestor;

impl InventoryIngestor {
    /// `(serial, model)` of the box itself
    fn identify(records: &[Record]) -> Option<(Option<&str>, &str)> {
        let chassis = records.iter().find(|record| {
            str_field(record, "name")
                .map(|name| name.to_ascii_lowercase().contains("chassis"))
                .unwrap_or(false)
        });

        if let Some(chassis) = chassis {
            if let Some(pid) = str_field(chassis, "pid") {
                return Some((str_field(chassis, "sn"), pid));
            }
        }

        let first = records.first()?;
        match (
            str_field(first, "name"),
            str_field(first, "sn"),
            str_field(first, "pid"),
        ) {
            (Some(_), Some(sn), Some(pid)) => Some((Some(sn), pid)),
            _ => None,
        }
    }
}

impl Ingestor for InventoryIngestor {
    fn template(&self) -> &str {
        "show inventory"
    }

    fn ingest(
        &self,
        records: &[Record],
        context: &IngestContext<'_>,
    ) -> Result<ChangeSet, IngestError> {
        let vendor = context.discoverable.platform.vendor();

        let (serial, model) = match Self::identify(records) {
            Some((serial, model)) => (serial.map(str::to_string), model.to_string()),
            None => (None, default_model(vendor)),
        };

        Ok(ChangeSet::new().with(TopologyUpsert::Device {
            target: DeviceRef::Discoverable,
            attributes: DeviceAttributes {
                manufacturer: Some(vendor.to_string()),
                model: Some(model),
                serial,
                ..Default::default()
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Platform;
    use crate::ingest::test_support::*;
    use serde_json::json;
    use test_case::test_case;

    fn device_attributes(records_json: serde_json::Value) -> DeviceAttributes {
        let discoverable = discoverable(Platform::CiscoIos);
        let log = log_for(&discoverable, "show inventory");
        let context = IngestContext {
            discoverable: &discoverable,
            log: &log,
        };
        let changes = InventoryIngestor
            .ingest(&records(records_json), &context)
            .unwrap();
        match &changes.upserts()[0] {
            TopologyUpsert::Device { attributes, .. } => attributes.clone(),
            other => panic!("unexpected upsert {:?}", other),
        }
    }

    #[test]
    fn test_chassis_record_wins() {
        let attributes = device_attributes(json!([
            {"name": "Power Supply 1", "sn": "PSU001", "pid": "PWR-1"},
            {"name": "Chassis", "sn": "ABC123", "pid": "WS-C1"},
            {"name": "Fan 1", "sn": "FAN001", "pid": "FAN-1"},
        ]));

        assert_eq!(attributes.serial.as_deref(), Some("ABC123"));
        assert_eq!(attributes.model.as_deref(), Some("WS-C1"));
        assert_eq!(attributes.manufacturer.as_deref(), Some("Cisco"));
    }

    #[test]
    fn test_first_record_without_chassis() {
        let attributes = device_attributes(json!([
            {"name": "1", "sn": "FOC111", "pid": "C2960X-48"},
            {"name": "Gi1/0/49", "sn": "SFP001", "pid": "GLC-SX"},
        ]));

        assert_eq!(attributes.serial.as_deref(), Some("FOC111"));
        assert_eq!(attributes.model.as_deref(), Some("C2960X-48"));
    }

    #[test_case(json!([]); "empty inventory")]
    #[test_case(json!([{"name": "module 0", "sn": "", "pid": "X"}]); "first record incomplete")]
    fn test_default_model(records_json: serde_json::Value) {
        let attributes = device_attributes(records_json);

        assert_eq!(attributes.serial, None);
        assert_eq!(attributes.model.as_deref(), Some("Cisco Unknown device"));
    }
}
