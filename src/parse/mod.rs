// Copyright (c) 2025 - Cowboy AI, Inc.
//! Parse Stage
//!
//! Converts the raw output of a discovery log into an ordered record set
//! with the template registered for `(platform, template)`, stores it on the
//! log and marks the log parsed.
//!
//! # Architecture
//!
//! ```text
//! LogStore ──get──▶ skip checks ──▶ TemplateRegistry::lookup ──▶ Template::apply
//!                                                                    │
//!                    LogStore ◀──mark_parsed(records)────────────────┘
//! ```
//!
//! Parsing is idempotent: a parsed log is never parsed again. A failure
//! leaves the log unparsed so the next pass retries it.

pub mod templates;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::batch::{BatchReport, Stage};
use crate::domain::Platform;
use crate::errors::ParseError;
use crate::log_store::{DiscoveryLog, LogFilter, LogId, LogStore, RawOutput, Record};
use crate::orchestrator::pipeline::{HOSTNAME_TEMPLATE, VSPHERE_COMMAND};

pub use templates::{
    HostnameTemplate, JsonTemplate, ShowInventoryTemplate, ShowIpInterfaceTemplate,
    ShowIpRouteTemplate, ShowVlanBriefTemplate, ShowVrfTemplate,
};

/// Output markers of a command the device refused
const CLI_FAILURE_MARKERS: &[&str] = &[
    "% Invalid input",
    "% Incomplete command",
    "% Ambiguous command",
    "% Unknown command",
    "Permission denied",
    "Invalid command",
];

/// Converts raw output into records
pub trait Template: Send + Sync {
    fn id(&self) -> &str;

    fn apply(&self, raw: &RawOutput) -> Result<Vec<Record>, ParseError>;
}

/// Templates keyed by platform and template identifier
#[derive(Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<(Platform, String), Arc<dyn Template>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in templates for every built-in platform
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        for platform in [Platform::CiscoIos, Platform::CiscoNxos] {
            registry.register(platform, Arc::new(HostnameTemplate));
            registry.register(platform, Arc::new(ShowInventoryTemplate));
            registry.register(platform, Arc::new(ShowVlanBriefTemplate));
            registry.register(platform, Arc::new(ShowVrfTemplate::new("show vrf")));
            registry.register(platform, Arc::new(ShowIpRouteTemplate::new("show ip route")));
        }
        registry.register(Platform::CiscoIos, Arc::new(ShowIpInterfaceTemplate));

        registry.register(Platform::CiscoXr, Arc::new(HostnameTemplate));
        registry.register(Platform::CiscoXr, Arc::new(ShowInventoryTemplate));
        registry.register(Platform::CiscoXr, Arc::new(ShowVrfTemplate::new("show vrf all")));
        registry.register(Platform::CiscoXr, Arc::new(ShowIpRouteTemplate::new("show route")));

        registry.register(
            Platform::VmwareVsphere,
            Arc::new(JsonTemplate::new(VSPHERE_COMMAND)),
        );

        registry
    }

    pub fn register(&mut self, platform: Platform, template: Arc<dyn Template>) {
        self.templates
            .insert((platform, template.id().to_string()), template);
    }

    pub fn lookup(&self, platform: Platform, template: &str) -> Result<Arc<dyn Template>, ParseError> {
        self.templates
            .get(&(platform, template.to_string()))
            .cloned()
            .ok_or_else(|| ParseError::TemplateNotFound {
                platform,
                template: template.to_string(),
            })
    }
}

/// Why a log was left unparsed without counting as a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseSkip {
    Unsupported,
    Configuration,
    QueryFailed,
    /// Device rejected the command
    CliError(String),
    NoTemplate,
}

impl fmt::Display for ParseSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseSkip::Unsupported => write!(f, "unsupported command"),
            ParseSkip::Configuration => write!(f, "configuration output"),
            ParseSkip::QueryFailed => write!(f, "query failed"),
            ParseSkip::CliError(marker) => write!(f, "device rejected command ({})", marker),
            ParseSkip::NoTemplate => write!(f, "no template"),
        }
    }
}

/// Outcome of parsing one log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed { records: usize },
    AlreadyParsed,
    Skipped(ParseSkip),
}

/// Reasons a log is not worth parsing, checked before template lookup
pub fn skip_reason(log: &DiscoveryLog) -> Option<ParseSkip> {
    if !log.details.supported {
        return Some(ParseSkip::Unsupported);
    }
    if log.details.configuration && log.template != HOSTNAME_TEMPLATE {
        return Some(ParseSkip::Configuration);
    }
    match &log.raw_output {
        RawOutput::Failed(_) => Some(ParseSkip::QueryFailed),
        RawOutput::Text(text) => CLI_FAILURE_MARKERS
            .iter()
            .find(|marker| text.contains(*marker))
            .map(|marker| ParseSkip::CliError(marker.to_string())),
        RawOutput::Json(_) => None,
    }
}

/// Raw output → records, one log at a time
#[derive(Clone)]
pub struct ParseStage {
    templates: Arc<TemplateRegistry>,
    log_store: Arc<dyn LogStore>,
}

impl ParseStage {
    pub fn new(templates: Arc<TemplateRegistry>, log_store: Arc<dyn LogStore>) -> Self {
        Self {
            templates,
            log_store,
        }
    }

    pub async fn parse(&self, id: LogId) -> Result<ParseOutcome, ParseError> {
        let log = self.log_store.get(id).await?;
        self.parse_log(&log).await
    }

    pub async fn parse_log(&self, log: &DiscoveryLog) -> Result<ParseOutcome, ParseError> {
        if log.parsed {
            return Ok(ParseOutcome::AlreadyParsed);
        }

        if let Some(reason) = skip_reason(log) {
            debug!(log_id = %log.id, command = %log.command, %reason, "Skipping parse");
            return Ok(ParseOutcome::Skipped(reason));
        }

        let template = match self.templates.lookup(log.platform, &log.template) {
            Ok(template) => template,
            Err(ParseError::TemplateNotFound { .. }) => {
                debug!(log_id = %log.id, template = %log.template, "No template registered");
                return Ok(ParseOutcome::Skipped(ParseSkip::NoTemplate));
            }
            Err(e) => return Err(e),
        };

        let records = template.apply(&log.raw_output)?;
        let count = records.len();
        self.log_store.mark_parsed(log.id, records).await?;

        debug!(log_id = %log.id, command = %log.command, records = count, "Parsed log");
        Ok(ParseOutcome::Parsed { records: count })
    }

    /// Parse every unparsed log matching `filter`; failures do not stop the batch
    pub async fn parse_pending(&self, filter: LogFilter) -> Result<BatchReport, ParseError> {
        let logs = self.log_store.list(&filter.parsed(false)).await?;
        let mut report = BatchReport::new();

        for log in &logs {
            match self.parse_log(log).await {
                Ok(ParseOutcome::Parsed { .. }) => report.record_success(),
                Ok(_) => report.record_skip(),
                Err(e) => {
                    warn!(
                        log_id = %log.id,
                        address = %log.address,
                        command = %log.command,
                        error = %e,
                        "Parse failed"
                    );
                    report.record_failure(log, Stage::Parse, e);
                }
            }
        }

        info!(
            attempted = report.attempted,
            parsed = report.succeeded,
            skipped = report.skipped,
            failed = report.failed(),
            "Parse pass finished"
        );
        Ok(report)
    }
}
