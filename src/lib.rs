// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network and virtualization discovery for the Composable Information Machine
//!
//! Queries network devices and hypervisor managers, records every query as a
//! discovery log, parses the logs with per-platform templates and reconciles
//! the results into an identity-keyed topology.
//!
//! ```text
//! Orchestrator → LogStore (raw) → ParseStage (parsed) → IngestDispatcher → TopologyStore
//!      │                                                       │
//!      └──────────────────────── StateTracker ◀────────────────┘
//! ```
//!
//! Logs are the system of record. Parsing and ingestion can be replayed over
//! any subset of them at any time without touching a device again.

pub mod batch;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ingest;
pub mod log_store;
pub mod orchestrator;
pub mod parse;
pub mod query;
pub mod replay;
pub mod service;
pub mod state_machine;
pub mod topology;
pub mod tracker;

// Re-export commonly used types
pub use batch::{BatchFailure, BatchReport, Stage};
pub use config::DiscoveryConfig;
pub use errors::{DiscoveryError, DiscoveryResult};
pub use ingest::{IngestDispatcher, IngestMode, IngestOutcome, Ingestor, IngestorRegistry};
pub use log_store::{DiscoveryLog, InMemoryLogStore, LogFilter, LogId, LogStore, NatsLogStore};
pub use orchestrator::{CancelHandle, Orchestrator, RunReport};
pub use parse::{ParseOutcome, ParseStage, Template, TemplateRegistry};
pub use query::{CapabilityRegistry, CredentialResolver, Credentials, QueryCapability};
pub use replay::{ReplayOptions, ReplaySelection, Replayer};
pub use service::{CycleReport, DiscoveryService, Registries};
pub use topology::{ChangeSet, InMemoryTopologyStore, TopologySnapshot, TopologyStore};
pub use tracker::{DiscoverableRepository, InMemoryDiscoverableRepository, StateTracker};
