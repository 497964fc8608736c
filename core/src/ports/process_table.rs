//! Process table port (interface).

use std::collections::{HashMap, HashSet};

use crate::domain::ProcessRecord;

/// Owning process id -> local TCP ports it holds.
pub type PortTable = HashMap<u32, HashSet<u16>>;

/// Port for read-only process table queries.
///
/// Every method is best effort and never fails: access denied, a process
/// exiting mid-query and "no data" all look the same to the caller.
pub trait ProcessTable: Send + Sync {
    /// Full system snapshot, in OS enumeration order.
    fn list_all(&self) -> Vec<ProcessRecord>;

    /// Strict transitive descendants of `root_pid`, computed from a single
    /// snapshot.
    fn list_descendants(&self, root_pid: u32) -> Vec<ProcessRecord>;

    /// Owner identifier of the account the caller runs as.
    fn current_user_sid(&self) -> Option<String>;

    /// Owner identifier of a process.
    fn owner_sid(&self, pid: u32) -> Option<String>;

    /// Canonical executable path of a process, or
    /// [`NOT_AVAILABLE`](crate::domain::NOT_AVAILABLE).
    fn executable_path(&self, pid: u32) -> String;

    /// IPv4 TCP endpoints grouped by owning process.
    fn listening_ports(&self) -> PortTable;

    /// PID of the calling process.
    fn current_pid(&self) -> u32 {
        std::process::id()
    }
}
