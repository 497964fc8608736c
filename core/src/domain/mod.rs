//! Domain layer - Pure data models and algorithms.
//!
//! Nothing here touches the OS, so every type and function can be tested
//! against synthetic process tables.

mod filter;
mod outcome;
mod process;

pub use filter::{FilterConfiguration, PortRestriction, DEFAULT_PROCESS_NAMES};
pub use outcome::{OperationOutcome, OutcomeCode, TerminationCause, TerminationFailure};
pub use process::{
    collect_descendants, fold_name, group_by_name, strip_executable_extension, ProcessGroup, ProcessRecord,
    NOT_AVAILABLE,
};
