//! Termination outcome domain model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified reason a termination call failed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum TerminationCause {
    /// Access was denied, or the target is not a valid process to terminate.
    #[error("The associated process could not be terminated, is terminating or is an invalid process.")]
    PermissionOrInvalidProcess,

    /// The target runs somewhere this machine cannot terminate it.
    #[error("Cannot kill a process running on a remote computer.")]
    RemoteProcessUnsupported,

    /// The target exited between discovery and termination.
    #[error("The process has already exited or was not found.")]
    AlreadyExitedOrNotFound,

    /// Any other OS failure, with its message.
    #[error("An unexpected error occurred: {0}")]
    Unclassified(String),
}

/// The process whose termination failed, with the classified cause.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Error killing process {name} (PID {pid}): {cause}")]
pub struct TerminationFailure {
    pub pid: u32,
    pub name: String,
    pub cause: TerminationCause,
}

/// Result category of a termination attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeCode {
    Success,
    NotFound,
    Error,
}

impl OutcomeCode {
    /// Conventional process exit code: 0 success, 1 not found, 2 error.
    pub fn exit_code(self) -> i32 {
        match self {
            OutcomeCode::Success => 0,
            OutcomeCode::NotFound => 1,
            OutcomeCode::Error => 2,
        }
    }
}

impl std::fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeCode::Success => write!(f, "success"),
            OutcomeCode::NotFound => write!(f, "not found"),
            OutcomeCode::Error => write!(f, "error"),
        }
    }
}

/// The single value returned by a termination attempt.
///
/// Only `Error` carries a cause, so "cause present iff error" holds by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", content = "failure", rename_all = "camelCase")]
pub enum OperationOutcome {
    /// Every matched process was terminated.
    Success,
    /// Nothing matched; no termination was attempted.
    NotFound,
    /// Termination stopped at the first failure.
    Error(TerminationFailure),
}

impl OperationOutcome {
    pub fn code(&self) -> OutcomeCode {
        match self {
            OperationOutcome::Success => OutcomeCode::Success,
            OperationOutcome::NotFound => OutcomeCode::NotFound,
            OperationOutcome::Error(_) => OutcomeCode::Error,
        }
    }

    pub fn cause(&self) -> Option<&TerminationCause> {
        match self {
            OperationOutcome::Error(failure) => Some(&failure.cause),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&TerminationFailure> {
        match self {
            OperationOutcome::Error(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success)
    }

    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }
}

impl std::fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationOutcome::Success => write!(f, "Processes killed."),
            OperationOutcome::NotFound => write!(f, "Could not find any matching processes."),
            OperationOutcome::Error(failure) => write!(f, "{}", failure),
        }
    }
}
