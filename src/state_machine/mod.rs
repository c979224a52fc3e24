// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! Host status moves through a pure Mealy machine: the next status and an
//! output are a function of the current status and a run outcome. The
//! [`crate::tracker::StateTracker`] persists the result.
//!
//! ```text
//! (Status, Outcome) → (Status, StatusChange)
//! ```
//!
//! # Example
//!
//! ```rust
//! use cim_discovery::domain::DiscoveryStatus;
//! use cim_discovery::state_machine::discovery_status::DiscoveryOutcome;
//! use cim_discovery::state_machine::StateMachine;
//!
//! let (next, _) = DiscoveryStatus::Pending
//!     .transition(&DiscoveryOutcome::Succeeded)
//!     .unwrap();
//! assert_eq!(next, DiscoveryStatus::Discovered);
//! ```

pub mod discovery_status;

pub type TransitionResult<S> = Result<S, TransitionError>;

/// Rejected status transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

/// Status with typed transitions
pub trait StateMachine: Sized + Clone {
    type Input;

    /// Use `()` when a transition has nothing to report
    type Output;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// Inputs accepted from the current state
    fn valid_inputs(&self) -> Vec<Self::Input>
    where
        Self::Input: Clone,
    {
        Vec::new()
    }
}
