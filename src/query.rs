// Copyright (c) 2025 - Cowboy AI, Inc.
//! Query Capabilities
//!
//! Transport-level command execution is external to the pipeline. A
//! [`QueryCapability`] runs one command (or API call) against one target and
//! hands back raw output; the orchestrator decides what to run and in which
//! order. One capability is registered per [`Platform`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{CredentialRef, DiscoverableId, Platform};
use crate::errors::QueryError;
use crate::log_store::RawOutput;

/// Target of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTarget {
    pub discoverable_id: DiscoverableId,
    pub address: IpAddr,
    pub platform: Platform,
}

/// Per-query options
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryOptions {
    /// Validate the target certificate (API platforms)
    pub verify_cert: bool,
    /// VRF the command is scoped to, if any
    pub vrf: Option<String>,
}

/// Successful query output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryOutput {
    Text(String),
    Json(serde_json::Value),
}

impl From<QueryOutput> for RawOutput {
    fn from(output: QueryOutput) -> Self {
        match output {
            QueryOutput::Text(text) => RawOutput::Text(text),
            QueryOutput::Json(value) => RawOutput::Json(value),
        }
    }
}

/// Resolved login material
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub enable_password: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            enable_password: None,
        }
    }

    pub fn with_enable(mut self, enable_password: impl Into<String>) -> Self {
        self.enable_password = Some(enable_password.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field(
                "enable_password",
                &self.enable_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Executes commands against targets of one platform
#[async_trait]
pub trait QueryCapability: Send + Sync {
    /// Run `command` against `target`
    async fn query(
        &self,
        target: &QueryTarget,
        command: &str,
        credentials: &Credentials,
        options: &QueryOptions,
    ) -> Result<QueryOutput, QueryError>;

    /// Concurrent hosts this capability tolerates, on top of the global limit
    fn max_concurrency(&self) -> Option<usize> {
        None
    }
}

/// Query capabilities keyed by platform
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<Platform, Arc<dyn QueryCapability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, platform: Platform, capability: Arc<dyn QueryCapability>) {
        self.capabilities.insert(platform, capability);
    }

    pub fn with(mut self, platform: Platform, capability: Arc<dyn QueryCapability>) -> Self {
        self.register(platform, capability);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn QueryCapability>> {
        self.capabilities.get(&platform).cloned()
    }

    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.capabilities.keys().copied()
    }
}

/// Credential lookup failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Unknown credential set: {0}")]
    Unknown(String),

    #[error("Credential backend error: {0}")]
    Backend(String),
}

/// Resolves credential references to login material
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, credential: &CredentialRef) -> Result<Credentials, CredentialError>;
}

/// Fixed in-memory credential sets
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    sets: HashMap<CredentialRef, Credentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, credentials: Credentials) -> Self {
        self.sets.insert(CredentialRef::new(name), credentials);
        self
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentials {
    async fn resolve(&self, credential: &CredentialRef) -> Result<Credentials, CredentialError> {
        self.sets
            .get(credential)
            .cloned()
            .ok_or_else(|| CredentialError::Unknown(credential.to_string()))
    }
}
