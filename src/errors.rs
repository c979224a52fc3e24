// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for discovery pipeline operations
//!
//! Each stage has its own error enum so callers can tell a target that
//! refused a command apart from a parser that choked on its output, or an
//! ingestor that could not reconcile a record. [`DiscoveryError`] unifies
//! them at the service boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DiscoverableId, Platform};
use crate::log_store::LogId;
use crate::state_machine::TransitionError;

/// Failure reported by a query capability
///
/// Stored verbatim in the discovery log, so it must serialize.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum QueryError {
    /// Target unreachable or session dropped
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Credentials rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Target answered with something the capability could not interpret
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No answer within the configured timeout (seconds)
    #[error("Query timed out after {0}s")]
    Timeout(u64),

    /// Command rejected as unsupported by the target
    #[error("Command not supported: {0}")]
    Unsupported(String),
}

/// Discovery log store errors
#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("Discovery log not found: {0}")]
    NotFound(LogId),

    /// A log must be parsed before it can be marked ingested
    #[error("Discovery log {0} has not been parsed")]
    NotParsed(LogId),

    /// Optimistic concurrency check failed
    #[error("Concurrent update of discovery log {0}")]
    Conflict(LogId),

    #[error("Log store connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Log store backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for LogStoreError {
    fn from(err: serde_json::Error) -> Self {
        LogStoreError::Serialization(err.to_string())
    }
}

/// Discoverable repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Discoverable not found: {0}")]
    NotFound(DiscoverableId),

    /// `(address, platform)` must be unique
    #[error("Discoverable already registered: {0}")]
    Duplicate(String),

    #[error("Repository backend error: {0}")]
    Backend(String),

    #[error("Status transition rejected: {0}")]
    Transition(#[from] TransitionError),
}

/// Parse stage errors
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("No template '{template}' registered for {platform}")]
    TemplateNotFound { platform: Platform, template: String },

    /// Raw output did not match the template's expectations
    #[error("Template '{template}' could not parse output: {reason}")]
    Malformed { template: String, reason: String },

    /// Output kind (text vs structured) does not fit the template
    #[error("Unexpected payload: {0}")]
    UnexpectedPayload(String),

    #[error("Log store error: {0}")]
    Store(#[from] LogStoreError),
}

/// Topology store errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// More than one stored entity answers to the same natural key
    #[error("Ambiguous identity: {0}")]
    AmbiguousIdentity(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// An upsert referenced an entity that neither exists nor precedes it
    #[error("Dangling reference: {0}")]
    DanglingReference(String),

    #[error("Topology backend error: {0}")]
    Backend(String),
}

/// Ingestion errors
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Discovery log {0} has not been parsed")]
    NotParsed(LogId),

    #[error("No ingestor registered for '{command}' on {platform}")]
    IngestorNotFound { platform: Platform, command: String },

    #[error("Missing field '{field}' in {context}")]
    MissingField { field: String, context: String },

    #[error("Invalid value '{value}' for field '{field}': {reason}")]
    InvalidField {
        field: String,
        value: String,
        reason: String,
    },

    /// Parsed output could not be decoded into the ingestor's input shape
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Discoverable not found: {0}")]
    DiscoverableNotFound(DiscoverableId),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Log store error: {0}")]
    Store(#[from] LogStoreError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Decode(err.to_string())
    }
}

/// Orchestration errors (a host could not be processed at all)
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("No pipeline profile for {0}")]
    NoProfile(Platform),

    #[error("No query capability registered for {0}")]
    NoCapability(Platform),

    #[error("Credentials '{credential}' unavailable: {reason}")]
    Credentials { credential: String, reason: String },

    #[error("Log store error: {0}")]
    Store(#[from] LogStoreError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

/// Top-level pipeline error
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    LogStore(#[from] LogStoreError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for discovery operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
