// Copyright (c) 2025 - Cowboy AI, Inc.
//! Discovery Status State Machine
//!
//! Host-level status of a discoverable across discovery runs.
//!
//! # States
//!
//! - Pending: never discovered, or re-queued
//! - Discovered: last run had at least one successful query
//! - Failed: last run had no successful query
//!
//! # Inputs
//!
//! - Succeeded: a run finished with at least one successful query
//! - Failed: a run finished with none, or could not be orchestrated
//! - Requeue: operator reset back to Pending
//!
//! ```text
//!            Succeeded              Failed
//! Pending ─────────────▶ Discovered ◀────▶ Failed
//!    ▲                      │                │
//!    └──────── Requeue ─────┴────────────────┘
//! ```

use super::{StateMachine, TransitionError, TransitionResult};
use crate::domain::DiscoveryStatus;

/// Outcome of one discovery run for a host (FSM input)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Succeeded,
    Failed,
    Requeue,
}

/// Transition output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusChange {
    /// Notable transitions worth logging
    pub warnings: Vec<String>,
}

impl StatusChange {
    fn ok() -> Self {
        Self::default()
    }

    fn warn(message: &str) -> Self {
        Self {
            warnings: vec![message.to_string()],
        }
    }
}

impl StateMachine for DiscoveryStatus {
    type Input = DiscoveryOutcome;
    type Output = StatusChange;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use DiscoveryOutcome::*;

        match (self, input) {
            (_, Succeeded) => Ok((DiscoveryStatus::Discovered, StatusChange::ok())),

            (DiscoveryStatus::Discovered, Failed) => Ok((
                DiscoveryStatus::Failed,
                StatusChange::warn("Previously discovered host failed"),
            )),
            (_, Failed) => Ok((DiscoveryStatus::Failed, StatusChange::ok())),

            (DiscoveryStatus::Pending, Requeue) => Err(TransitionError::InvalidTransition {
                from: DiscoveryStatus::Pending.to_string(),
                to: DiscoveryStatus::Pending.to_string(),
            }),
            (_, Requeue) => Ok((DiscoveryStatus::Pending, StatusChange::ok())),
        }
    }

    fn valid_inputs(&self) -> Vec<Self::Input> {
        use DiscoveryOutcome::*;

        match self {
            DiscoveryStatus::Pending => vec![Succeeded, Failed],
            DiscoveryStatus::Discovered | DiscoveryStatus::Failed => {
                vec![Succeeded, Failed, Requeue]
            }
        }
    }
}
