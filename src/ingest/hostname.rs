// Copyright (c) 2025 - Cowboy AI, Inc.
//! `HOSTNAME` → device name

use super::{require_str, IngestContext, Ingestor};
use crate::domain::DeviceAttributes;
use crate::errors::IngestError;
use crate::log_store::Record;
use crate::orchestrator::pipeline::HOSTNAME_TEMPLATE;
use crate::topology::{ChangeSet, DeviceRef, TopologyUpsert};

#[derive(Debug, Clone, Copy, Default)]
pub struct HostnameIngestor;

impl Ingestor for HostnameIngestor {
    fn template(&self) -> &str {
        HOSTNAME_TEMPLATE
    }

    fn ingest(
        &self,
        records: &[Record],
        context: &IngestContext<'_>,
    ) -> Result<ChangeSet, IngestError> {
        let record = records.first().ok_or_else(|| IngestError::MissingField {
            field: "hostname".to_string(),
            context: format!("log {}", context.log.id),
        })?;
        let name = require_str(record, "hostname", HOSTNAME_TEMPLATE)?;

        Ok(ChangeSet::new().with(TopologyUpsert::Device {
            target: DeviceRef::Discoverable,
            attributes: DeviceAttributes {
                name: Some(name.to_string()),
                platform: Some(context.discoverable.platform),
                ..Default::default()
            },
        }))
    }
}
