//! Process terminator port (interface).

use crate::domain::TerminationCause;

/// Port for forcibly terminating a process.
///
/// Kept apart from [`ProcessTable`](super::ProcessTable) so the
/// orchestrator can be driven by a scripted fake.
pub trait ProcessTerminator: Send + Sync {
    /// Terminate `pid` immediately, classifying any failure.
    fn terminate(&self, pid: u32) -> Result<(), TerminationCause>;
}
