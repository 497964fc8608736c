//! ReallyStop Core Library
//!
//! Finds orphaned build and debug helper processes (MSBuild and friends)
//! and terminates them, reporting a single structured outcome.
//! Provides functionality to:
//! - Snapshot the OS process table with owner, parent and executable path
//! - Select processes by name, owning user, ancestry and owned TCP ports
//! - Terminate the selection fail-fast with a classified failure cause
//! - Persist the selection as user settings
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure data models and algorithms
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: OS implementations
//! - `application`: Use case services
//!
//! # Platform Support
//! - Windows: Toolhelp snapshots, process tokens and the extended TCP table
//! - Linux: `/proc` and `kill(2)`
//! - Other platforms: nothing is ever found
//!
//! # Example
//! ```no_run
//! use reallystop_core::{terminate, FilterConfiguration};
//!
//! let filter = FilterConfiguration::default().current_user_only(true);
//! let outcome = terminate(&filter);
//! println!("{outcome}");
//! std::process::exit(outcome.exit_code());
//! ```

// Hexagonal architecture layers
pub mod domain;
pub mod ports;
pub mod adapters;
pub mod application;

pub mod config;
pub mod error;

// Re-export domain types (primary API)
pub use domain::{
    FilterConfiguration, OperationOutcome, OutcomeCode, PortRestriction, ProcessGroup,
    ProcessRecord, TerminationCause, TerminationFailure,
};

// Re-export other commonly used types
pub use adapters::{SystemProcessTable, SystemTerminator};
pub use application::{ProcessFilterService, TerminationService};
pub use config::{ConfigStore, Settings};
pub use error::{Error, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Terminate every process selected by `filter` using the OS adapters.
///
/// Never fails: termination problems are reported through
/// [`OperationOutcome::Error`]. Blocks the calling thread for the whole
/// discovery and termination run.
pub fn terminate(filter: &FilterConfiguration) -> OperationOutcome {
    system_service().terminate(filter)
}

/// Processes [`terminate`] would target right now.
pub fn preview(filter: &FilterConfiguration) -> Vec<ProcessRecord> {
    system_service().preview(filter)
}

/// Descendants of the calling process grouped by name.
pub fn child_process_groups() -> Vec<ProcessGroup> {
    system_service().child_process_groups()
}

fn system_service() -> TerminationService<SystemProcessTable, SystemTerminator> {
    TerminationService::new(SystemProcessTable::new(), SystemTerminator::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_terminate_empty_names_is_not_found() {
        let filter = FilterConfiguration::with_names(Vec::<String>::new()).descendants_only(true);
        assert_eq!(terminate(&filter), OperationOutcome::NotFound);
    }

    #[test]
    fn test_terminate_absent_name_is_not_found() {
        let filter = FilterConfiguration::with_names(["no-such-process-name-xyz"]);
        assert_eq!(terminate(&filter), OperationOutcome::NotFound);
    }
}
