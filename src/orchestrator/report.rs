// Copyright (c) 2025 - Cowboy AI, Inc.
//! Orchestration run reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::domain::{DiscoverableId, DiscoveryStatus, Platform};
use crate::errors::QueryError;
use crate::log_store::LogId;

/// Result of one query attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub log_id: LogId,
    pub order: u32,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<QueryError>,
}

impl QueryOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Why a host was not queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    Cancelled,
}

/// Per-host summary of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostReport {
    pub discoverable_id: DiscoverableId,
    pub address: IpAddr,
    pub platform: Platform,
    pub queries: Vec<QueryOutcome>,
    /// Host-level failure (no profile, no credentials, log store down)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub skipped: Option<SkipReason>,
    /// Status recorded after the run
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<DiscoveryStatus>,
}

impl HostReport {
    pub fn new(discoverable_id: DiscoverableId, address: IpAddr, platform: Platform) -> Self {
        Self {
            discoverable_id,
            address,
            platform,
            queries: Vec::new(),
            error: None,
            skipped: None,
            status: None,
        }
    }

    pub fn skip(mut self, reason: SkipReason) -> Self {
        self.skipped = Some(reason);
        self
    }

    pub fn fail(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn succeeded(&self) -> usize {
        self.queries.iter().filter(|q| q.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.queries.len() - self.succeeded()
    }

    /// Discovered means at least one answer and no host-level failure
    pub fn is_discovered(&self) -> bool {
        self.error.is_none() && self.succeeded() > 0
    }
}

/// Failed query, flattened for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub address: IpAddr,
    pub command: String,
    pub log_id: LogId,
    pub error: QueryError,
}

/// Summary of one orchestration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub hosts: Vec<HostReport>,
    pub cancelled: bool,
}

impl RunReport {
    /// Query attempts across all hosts
    pub fn attempted(&self) -> usize {
        self.hosts.iter().map(|h| h.queries.len()).sum()
    }

    pub fn succeeded(&self) -> usize {
        self.hosts.iter().map(HostReport::succeeded).sum()
    }

    pub fn failed(&self) -> usize {
        self.hosts.iter().map(HostReport::failed).sum()
    }

    pub fn host(&self, address: IpAddr) -> Option<&HostReport> {
        self.hosts.iter().find(|h| h.address == address)
    }

    pub fn hosts_discovered(&self) -> usize {
        self.hosts.iter().filter(|h| h.is_discovered()).count()
    }

    pub fn hosts_skipped(&self) -> usize {
        self.hosts.iter().filter(|h| h.skipped.is_some()).count()
    }

    pub fn failures(&self) -> Vec<QueryFailure> {
        self.hosts
            .iter()
            .flat_map(|host| {
                host.queries.iter().filter_map(move |query| {
                    query.error.clone().map(|error| QueryFailure {
                        address: host.address,
                        command: query.command.clone(),
                        log_id: query.log_id,
                        error,
                    })
                })
            })
            .collect()
    }
}
