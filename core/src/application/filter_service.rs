//! Process filtering application service.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::{FilterConfiguration, ProcessRecord};
use crate::ports::ProcessTable;

/// Application service computing the match set of a filter.
///
/// Each call takes a fresh snapshot; nothing is cached between calls.
pub struct ProcessFilterService<T: ProcessTable> {
    table: T,
}

impl<T: ProcessTable> ProcessFilterService<T> {
    /// Create a new filter service over the given process table.
    pub fn new(table: T) -> Self {
        Self { table }
    }

    /// The underlying process table.
    pub fn table(&self) -> &T {
        &self.table
    }

    /// Processes selected by `filter`, in OS enumeration order.
    ///
    /// Restrictions are intersected (AND). An empty name list selects
    /// nothing, and a process appears at most once however many names it
    /// satisfies.
    pub fn find_matches(&self, filter: &FilterConfiguration) -> Vec<ProcessRecord> {
        let names = filter.name_set();
        if names.is_empty() {
            debug!("Empty name list, nothing to match");
            return Vec::new();
        }

        let mut matches = self.base_set(filter);
        matches.retain(|p| p.name_key().is_some_and(|key| names.contains(&key)));
        debug!(count = matches.len(), "Matched by name");

        if matches.is_empty() {
            return matches;
        }

        if filter.restrict_to_descendants {
            let descendants: HashSet<u32> = self
                .table
                .list_descendants(self.table.current_pid())
                .into_iter()
                .map(|p| p.pid)
                .collect();
            matches.retain(|p| descendants.contains(&p.pid));
            debug!(count = matches.len(), "Restricted to descendants");
        }

        if filter.restrict_to_ports.enabled && !matches.is_empty() {
            let ports = self.table.listening_ports();
            matches.retain(|p| filter.restrict_to_ports.admits(ports.get(&p.pid)));
            debug!(count = matches.len(), "Restricted by ports");
        }

        matches
    }

    /// Full snapshot, or only the caller's own processes.
    fn base_set(&self, filter: &FilterConfiguration) -> Vec<ProcessRecord> {
        let mut processes = self.table.list_all();
        if !filter.restrict_to_current_user {
            return processes;
        }

        let Some(user) = self.table.current_user_sid() else {
            debug!("Current user SID unavailable, no process can match");
            return Vec::new();
        };
        processes.retain(|p| {
            p.owner_sid
                .as_deref()
                .is_some_and(|owner| owner.eq_ignore_ascii_case(&user))
        });
        debug!(count = processes.len(), "Restricted to current user");
        processes
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashSet;

    use crate::domain::{collect_descendants, ProcessRecord, NOT_AVAILABLE};
    use crate::ports::{PortTable, ProcessTable};

    /// In-memory process table for testing.
    #[derive(Debug, Clone, Default)]
    pub struct FakeProcessTable {
        pub processes: Vec<ProcessRecord>,
        pub ports: PortTable,
        pub current_user: Option<String>,
        pub current_pid: u32,
    }

    impl FakeProcessTable {
        pub fn new(processes: Vec<ProcessRecord>) -> Self {
            Self {
                processes,
                ports: PortTable::new(),
                current_user: Some("S-1-5-21-1000".to_string()),
                current_pid: 100,
            }
        }

        pub fn with_ports(mut self, pid: u32, ports: &[u16]) -> Self {
            self.ports
                .insert(pid, ports.iter().copied().collect::<HashSet<u16>>());
            self
        }
    }

    impl ProcessTable for FakeProcessTable {
        fn list_all(&self) -> Vec<ProcessRecord> {
            self.processes.clone()
        }

        fn list_descendants(&self, root_pid: u32) -> Vec<ProcessRecord> {
            collect_descendants(&self.processes, root_pid)
        }

        fn current_user_sid(&self) -> Option<String> {
            self.current_user.clone()
        }

        fn owner_sid(&self, pid: u32) -> Option<String> {
            self.processes
                .iter()
                .find(|p| p.pid == pid)
                .and_then(|p| p.owner_sid.clone())
        }

        fn executable_path(&self, pid: u32) -> String {
            self.processes
                .iter()
                .find(|p| p.pid == pid)
                .map(|p| p.executable_path.clone())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        }

        fn listening_ports(&self) -> PortTable {
            self.ports.clone()
        }

        fn current_pid(&self) -> u32 {
            self.current_pid
        }
    }

    /// A typical IDE session: devenv (100) running builds.
    pub fn ide_session() -> FakeProcessTable {
        let me = Some("S-1-5-21-1000".to_string());
        let other = Some("S-1-5-18".to_string());
        FakeProcessTable::new(vec![
            ProcessRecord::new(4, "System", Some(0)).with_owner(other.clone()),
            ProcessRecord::new(100, "devenv", Some(50)).with_owner(me.clone()),
            ProcessRecord::new(200, "MSBuild", Some(100)).with_owner(me.clone()),
            ProcessRecord::new(210, "msbuild", Some(200)).with_owner(me.clone()),
            ProcessRecord::new(300, "MSBuild", Some(1)).with_owner(me.clone()),
            ProcessRecord::new(400, "MSBuild", Some(1)).with_owner(other),
            ProcessRecord::new(500, "node", Some(100)).with_owner(me.clone()),
            ProcessRecord::new(600, "", Some(100)).with_owner(me),
            ProcessRecord::new(700, "VBCSCompiler", Some(1)).with_owner(None),
        ])
    }
}
