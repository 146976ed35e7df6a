//! Simulation errors
//!
//! Every fallible engine command returns `Result<T, SimError>`. Commands
//! validate before they mutate, so an `Err` always means nothing changed.

use thiserror::Error;

use crate::types::{ProcessId, ProcessState, SimulationStatus};

/// Errors surfaced by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SimError {
    /// Malformed or missing request fields.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown algorithm identifier or inconsistent configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An operation needs setup that has not happened yet.
    #[error("not configured: {0}")]
    NotConfigured(&'static str),

    /// Illegal process lifecycle transition.
    #[error("invalid state transition for process {pid}: {from:?} -> {to:?}")]
    InvalidProcessTransition {
        /// Process whose transition was rejected
        pid: ProcessId,
        /// Current state
        from: ProcessState,
        /// Requested state
        to: ProcessState,
    },

    /// Illegal controller transition (e.g. pause while idle).
    #[error("invalid state transition: cannot {action} while {status:?}")]
    InvalidControllerTransition {
        /// Command that was attempted
        action: &'static str,
        /// Controller status at the time
        status: SimulationStatus,
    },

    /// No free block can satisfy the request.
    #[error("out of memory: requested {requested}, largest free block is {largest_free}")]
    OutOfMemory {
        /// Size asked for (after rounding to the granularity)
        requested: u64,
        /// Largest free block at the time of the request
        largest_free: u64,
    },

    /// Unknown process or missing allocation.
    #[error("not found: {0}")]
    NotFound(String),

    /// Memory re-initialization attempted while a run is active.
    #[error("already initialized: {0}")]
    AlreadyInitialized(&'static str),
}

impl SimError {
    /// True for both lifecycle and controller transition failures.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self,
            SimError::InvalidProcessTransition { .. } | SimError::InvalidControllerTransition { .. }
        )
    }
}

/// Engine result alias.
pub type SimResult<T> = Result<T, SimError>;
