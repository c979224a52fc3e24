// Copyright (c) 2025 - Cowboy AI, Inc.
//! Batch reports shared by the parse, ingest and replay passes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::log_store::{DiscoveryLog, LogId};

/// Pipeline stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parse,
    Ingest,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Parse => write!(f, "parse"),
            Stage::Ingest => write!(f, "ingest"),
        }
    }
}

/// One failed log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub log_id: LogId,
    pub address: IpAddr,
    pub command: String,
    pub stage: Stage,
    pub error: String,
}

/// Aggregate outcome of a batch over many logs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// Logs left alone on purpose (already done, unsupported, no handler)
    pub skipped: usize,
    pub failures: Vec<BatchFailure>,
    /// Log the batch stopped at, when running with stop-on-error
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub halted_at: Option<LogId>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_halted(&self) -> bool {
        self.halted_at.is_some()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_skip(&mut self) {
        self.attempted += 1;
        self.skipped += 1;
    }

    pub fn record_failure(&mut self, log: &DiscoveryLog, stage: Stage, error: impl ToString) {
        self.attempted += 1;
        self.failures.push(BatchFailure {
            log_id: log.id,
            address: log.address,
            command: log.command.clone(),
            stage,
            error: error.to_string(),
        });
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: BatchReport) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
        if self.halted_at.is_none() {
            self.halted_at = other.halted_at;
        }
    }
}
