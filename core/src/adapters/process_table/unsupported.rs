//! Fallback for platforms without a process table implementation.
//!
//! Reports an empty system, so every filter resolves to `NotFound`.

use crate::domain::{ProcessRecord, TerminationCause, NOT_AVAILABLE};
use crate::ports::{PortTable, ProcessTable, ProcessTerminator};

#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedProcessTable;

impl UnsupportedProcessTable {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessTable for UnsupportedProcessTable {
    fn list_all(&self) -> Vec<ProcessRecord> {
        Vec::new()
    }

    fn list_descendants(&self, _root_pid: u32) -> Vec<ProcessRecord> {
        Vec::new()
    }

    fn current_user_sid(&self) -> Option<String> {
        None
    }

    fn owner_sid(&self, _pid: u32) -> Option<String> {
        None
    }

    fn executable_path(&self, _pid: u32) -> String {
        NOT_AVAILABLE.to_string()
    }

    fn listening_ports(&self) -> PortTable {
        PortTable::new()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedTerminator;

impl UnsupportedTerminator {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessTerminator for UnsupportedTerminator {
    fn terminate(&self, _pid: u32) -> Result<(), TerminationCause> {
        Err(TerminationCause::Unclassified(
            "platform not supported".to_string(),
        ))
    }
}
