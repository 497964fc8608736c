//! Process snapshot domain models.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

/// Sentinel reported when an executable path cannot be resolved.
pub const NOT_AVAILABLE: &str = "N/A";

// ============================================================================
// ProcessRecord
// ============================================================================

/// A read-only snapshot of one OS process at query time.
///
/// Records are never cached: the underlying process may exit right after the
/// record is built, so every field degrades to an empty or absent value
/// instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// OS process identifier.
    pub pid: u32,
    /// Executable base name without extension, empty if it could not be read.
    pub name: String,
    /// Parent process id at snapshot time. May reference a dead process.
    pub parent_pid: Option<u32>,
    /// Owner security identifier (a SID on Windows, the real UID on Linux).
    pub owner_sid: Option<String>,
    /// Canonical path of the main executable, or [`NOT_AVAILABLE`].
    pub executable_path: String,
}

impl ProcessRecord {
    /// Create a record with only identity and parent information.
    pub fn new(pid: u32, name: impl Into<String>, parent_pid: Option<u32>) -> Self {
        Self {
            pid,
            name: name.into(),
            parent_pid,
            owner_sid: None,
            executable_path: NOT_AVAILABLE.to_string(),
        }
    }

    /// Attach the owner identifier.
    pub fn with_owner(mut self, owner_sid: Option<String>) -> Self {
        self.owner_sid = owner_sid;
        self
    }

    /// Attach the executable path.
    pub fn with_path(mut self, executable_path: impl Into<String>) -> Self {
        self.executable_path = executable_path.into();
        self
    }

    /// Whether the process reported a name at all.
    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }

    /// Case-folded name used for every name comparison. Nameless records have none.
    pub fn name_key(&self) -> Option<String> {
        self.has_name().then(|| fold_name(&self.name))
    }

    /// Whether the executable path was resolved.
    pub fn has_path(&self) -> bool {
        self.executable_path != NOT_AVAILABLE
    }
}

impl std::fmt::Display for ProcessRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_name() {
            write!(f, "{} (PID {})", self.name, self.pid)
        } else {
            write!(f, "PID {}", self.pid)
        }
    }
}

/// Case folding shared by the name join and grouping.
pub fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// Drop a trailing `.exe` (any case) from an image name.
pub fn strip_executable_extension(image_name: &str) -> &str {
    let len = image_name.len();
    if len > 4 && image_name.is_char_boundary(len - 4) {
        let (stem, ext) = image_name.split_at(len - 4);
        if ext.eq_ignore_ascii_case(".exe") {
            return stem;
        }
    }
    image_name
}

// ============================================================================
// Descendant walk
// ============================================================================

/// Compute the strict transitive descendants of `root_pid` over one snapshot.
///
/// The parent -> children adjacency is built once and walked breadth-first.
/// The root is never part of its own result, and a visited set keeps PID
/// reuse loops from cycling. Output follows snapshot order.
pub fn collect_descendants(snapshot: &[ProcessRecord], root_pid: u32) -> Vec<ProcessRecord> {
    let mut children: HashMap<u32, Vec<usize>> = HashMap::new();
    for (index, record) in snapshot.iter().enumerate() {
        if let Some(parent) = record.parent_pid {
            // A process listed as its own parent (pid 0 on Windows) is not a child.
            if parent != record.pid {
                children.entry(parent).or_default().push(index);
            }
        }
    }

    let mut visited: HashSet<u32> = HashSet::from([root_pid]);
    let mut members: Vec<usize> = Vec::new();
    let mut queue: VecDeque<u32> = VecDeque::from([root_pid]);

    while let Some(parent) = queue.pop_front() {
        let Some(indices) = children.get(&parent) else {
            continue;
        };
        for &index in indices {
            let pid = snapshot[index].pid;
            if visited.insert(pid) {
                members.push(index);
                queue.push_back(pid);
            }
        }
    }

    members.sort_unstable();
    members.into_iter().map(|i| snapshot[i].clone()).collect()
}

// ============================================================================
// ProcessGroup
// ============================================================================

/// Processes sharing one name, as shown when previewing what a filter touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessGroup {
    /// Name as reported by the first process of the group.
    pub name: String,
    /// Number of processes in the group.
    pub count: usize,
    /// Executable path of the first process with a resolvable path.
    pub executable_path: String,
    /// All member PIDs in snapshot order.
    pub pids: Vec<u32>,
}

/// Group records by case-insensitive name, keeping first-seen order.
///
/// Nameless records are skipped since no filter can ever select them.
pub fn group_by_name(records: &[ProcessRecord]) -> Vec<ProcessGroup> {
    let mut groups: Vec<ProcessGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records.iter().filter(|r| r.has_name()) {
        let key = fold_name(&record.name);
        match index.get(&key) {
            Some(&i) => {
                let group = &mut groups[i];
                group.count += 1;
                group.pids.push(record.pid);
                if group.executable_path == NOT_AVAILABLE && record.has_path() {
                    group.executable_path = record.executable_path.clone();
                }
            }
            None => {
                index.insert(key, groups.len());
                groups.push(ProcessGroup {
                    name: record.name.clone(),
                    count: 1,
                    executable_path: record.executable_path.clone(),
                    pids: vec![record.pid],
                });
            }
        }
    }

    groups
}
