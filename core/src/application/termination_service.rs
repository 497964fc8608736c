//! Termination application service.

use tracing::{debug, info, warn};

use crate::domain::{
    group_by_name, FilterConfiguration, OperationOutcome, ProcessGroup, ProcessRecord,
    TerminationFailure,
};
use crate::ports::{ProcessTable, ProcessTerminator};

use super::ProcessFilterService;

/// Application service turning a filter into exactly one outcome.
///
/// Termination is fail-fast: the first failure stops the run and the
/// remaining matches are left running. Callers wanting best effort
/// re-invoke and get a fresh, smaller match set.
pub struct TerminationService<T: ProcessTable, K: ProcessTerminator> {
    filter: ProcessFilterService<T>,
    terminator: K,
}

impl<T: ProcessTable, K: ProcessTerminator> TerminationService<T, K> {
    /// Create a new termination service.
    pub fn new(table: T, terminator: K) -> Self {
        Self {
            filter: ProcessFilterService::new(table),
            terminator,
        }
    }

    /// Terminate every process selected by `filter`.
    pub fn terminate(&self, filter: &FilterConfiguration) -> OperationOutcome {
        let matches = self.filter.find_matches(filter);
        if matches.is_empty() {
            info!(names = ?filter.names, "No matching processes");
            return OperationOutcome::NotFound;
        }

        debug!(count = matches.len(), "Terminating matched processes");
        for process in &matches {
            match self.terminator.terminate(process.pid) {
                Ok(()) => {
                    info!(pid = process.pid, name = %process.name, "Process killed");
                }
                Err(cause) => {
                    warn!(pid = process.pid, name = %process.name, error = %cause, "Failed to kill process");
                    return OperationOutcome::Error(TerminationFailure {
                        pid: process.pid,
                        name: process.name.clone(),
                        cause,
                    });
                }
            }
        }

        info!(count = matches.len(), "All matched processes killed");
        OperationOutcome::Success
    }

    /// The processes `terminate` would target right now.
    pub fn preview(&self, filter: &FilterConfiguration) -> Vec<ProcessRecord> {
        self.filter.find_matches(filter)
    }

    /// Descendants of the calling process grouped by name.
    pub fn child_process_groups(&self) -> Vec<ProcessGroup> {
        let table = self.filter.table();
        group_by_name(&table.list_descendants(table.current_pid()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::super::filter_service::fake::{ide_session, FakeProcessTable};
    use super::*;
    use crate::domain::{PortRestriction, TerminationCause};

    /// Terminator that records attempts and fails on scripted PIDs.
    #[derive(Clone, Default)]
    struct ScriptedTerminator {
        attempts: Arc<Mutex<Vec<u32>>>,
        failures: HashMap<u32, TerminationCause>,
    }

    impl ScriptedTerminator {
        fn failing(pid: u32, cause: TerminationCause) -> Self {
            Self {
                failures: HashMap::from([(pid, cause)]),
                ..Self::default()
            }
        }

        fn attempts(&self) -> Vec<u32> {
            self.attempts.lock().clone()
        }
    }

    impl ProcessTerminator for ScriptedTerminator {
        fn terminate(&self, pid: u32) -> Result<(), TerminationCause> {
            self.attempts.lock().push(pid);
            match self.failures.get(&pid) {
                Some(cause) => Err(cause.clone()),
                None => Ok(()),
            }
        }
    }

    fn three_builds() -> FakeProcessTable {
        FakeProcessTable::new(vec![
            ProcessRecord::new(11, "MSBuild", Some(1)),
            ProcessRecord::new(22, "MSBuild", Some(1)),
            ProcessRecord::new(33, "MSBuild", Some(1)),
        ])
    }

    #[test]
    fn test_empty_names_are_not_found_without_attempts() {
        let terminator = ScriptedTerminator::default();
        let service = TerminationService::new(ide_session(), terminator.clone());
        let filter = FilterConfiguration::with_names(Vec::<String>::new())
            .current_user_only(true)
            .descendants_only(true)
            .ports(PortRestriction::allow(["80"]));

        assert_eq!(service.terminate(&filter), OperationOutcome::NotFound);
        assert!(terminator.attempts().is_empty());
    }

    #[test]
    fn test_absent_name_is_not_found() {
        let terminator = ScriptedTerminator::default();
        let service = TerminationService::new(ide_session(), terminator.clone());

        let outcome = service.terminate(&FilterConfiguration::with_names(["notepad"]));
        assert_eq!(outcome, OperationOutcome::NotFound);
        assert_eq!(outcome.cause(), None);
        assert!(terminator.attempts().is_empty());
    }

    #[test]
    fn test_all_matches_killed_in_order() {
        let terminator = ScriptedTerminator::default();
        let service = TerminationService::new(three_builds(), terminator.clone());

        let outcome = service.terminate(&FilterConfiguration::default());
        assert_eq!(outcome, OperationOutcome::Success);
        assert_eq!(terminator.attempts(), vec![11, 22, 33]);
    }

    #[test]
    fn test_short_circuits_on_first_failure() {
        let terminator = ScriptedTerminator::failing(22, TerminationCause::PermissionOrInvalidProcess);
        let service = TerminationService::new(three_builds(), terminator.clone());

        let outcome = service.terminate(&FilterConfiguration::default());
        assert_eq!(terminator.attempts(), vec![11, 22]);
        assert_eq!(
            outcome,
            OperationOutcome::Error(TerminationFailure {
                pid: 22,
                name: "MSBuild".to_string(),
                cause: TerminationCause::PermissionOrInvalidProcess,
            })
        );
    }

    #[test]
    fn test_race_with_exiting_process_is_reported() {
        let terminator = ScriptedTerminator::failing(11, TerminationCause::AlreadyExitedOrNotFound);
        let service = TerminationService::new(three_builds(), terminator.clone());

        let outcome = service.terminate(&FilterConfiguration::with_names(["msbuild"]));
        assert_eq!(outcome.cause(), Some(&TerminationCause::AlreadyExitedOrNotFound));
        assert_eq!(terminator.attempts(), vec![11]);
    }

    #[test]
    fn test_duplicate_names_attempt_each_process_once() {
        let terminator = ScriptedTerminator::default();
        let service = TerminationService::new(three_builds(), terminator.clone());

        let filter = FilterConfiguration::with_names(["MSBuild", "msbuild"]);
        assert!(service.terminate(&filter).is_success());
        assert_eq!(terminator.attempts(), vec![11, 22, 33]);
    }

    #[test]
    fn test_preview_does_not_terminate() {
        let terminator = ScriptedTerminator::default();
        let service = TerminationService::new(ide_session(), terminator.clone());

        let preview = service.preview(&FilterConfiguration::default().descendants_only(true));
        assert_eq!(preview.iter().map(|p| p.pid).collect::<Vec<_>>(), vec![200, 210]);
        assert!(terminator.attempts().is_empty());
    }

    #[test]
    fn test_child_process_groups() {
        let service = TerminationService::new(ide_session(), ScriptedTerminator::default());

        let groups = service.child_process_groups();
        let summary: Vec<(&str, usize)> = groups.iter().map(|g| (g.name.as_str(), g.count)).collect();
        assert_eq!(summary, vec![("MSBuild", 2), ("node", 1)]);
        assert_eq!(groups[0].pids, vec![200, 210]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_kill_spawned_child_end_to_end() {
        use std::process::Command;
        use std::time::{Duration, Instant};

        use crate::adapters::{SystemProcessTable, SystemTerminator};

        // A uniquely named link keeps other tests' children out of the match
        // set. The name is longer than the kernel's 15 byte `comm`.
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("reallystop_long_helper_name");
        std::os::unix::fs::symlink("/bin/sleep", &link).unwrap();
        let mut child = Command::new(&link).arg("30").spawn().unwrap();
        let pid = child.id();

        let table = SystemProcessTable::new();
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline
            && !table
                .list_all()
                .iter()
                .any(|p| p.pid == pid && p.name == "reallystop_long_helper_name")
        {
            std::thread::sleep(Duration::from_millis(10));
        }

        let service = TerminationService::new(SystemProcessTable::new(), SystemTerminator::new());
        let filter = FilterConfiguration::with_names(["REALLYSTOP_LONG_HELPER_NAME"])
            .current_user_only(true)
            .descendants_only(true);
        let outcome = service.terminate(&filter);

        child.wait().unwrap();
        assert_eq!(outcome, OperationOutcome::Success);
        assert!(!table.list_all().iter().any(|p| p.pid == pid));
    }
}
