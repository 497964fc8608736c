//! Linux process table implementation backed by `/proc`.
//!
//! - `/proc/<pid>/stat`: short name (`comm`), state and parent PID
//! - `/proc/<pid>/cmdline`, `/proc/<pid>/exe`: full executable base name
//! - `/proc/<pid>/status`: real UID, used as the owner identifier
//! - `/proc/<pid>/exe`: executable path
//! - `/proc/net/tcp` joined with `/proc/<pid>/fd`: TCP owner table
//!
//! Termination sends `SIGKILL` through `nix`.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::{getuid, Pid};
use tracing::{debug, warn};

use crate::domain::{collect_descendants, ProcessRecord, TerminationCause, NOT_AVAILABLE};
use crate::ports::{PortTable, ProcessTable, ProcessTerminator};

const PROC_ROOT: &str = "/proc";

/// Longest `comm` the kernel keeps. Longer executable names are cut to it.
const COMM_MAX_LEN: usize = 15;

/// Suffix the kernel appends to the `exe` link of a replaced binary.
const DELETED_SUFFIX: &str = " (deleted)";

/// Parsed subset of `/proc/<pid>/stat`.
#[derive(Debug, PartialEq, Eq)]
struct StatLine {
    name: String,
    state: char,
    parent_pid: Option<u32>,
}

/// Linux process table reading a procfs mount.
#[derive(Debug, Clone)]
pub struct LinuxProcessTable {
    root: PathBuf,
}

impl LinuxProcessTable {
    /// Create a table over the system `/proc`.
    pub fn new() -> Self {
        Self::with_root(PROC_ROOT)
    }

    /// Create a table over a custom procfs root (for testing).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pid_dir(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    /// Numeric entries of the procfs root, in directory order.
    fn pids(&self) -> Vec<u32> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Failed to read process table");
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().and_then(|s| s.parse().ok()))
            .collect()
    }

    /// Parse `/proc/<pid>/stat`.
    ///
    /// Format: `pid (comm) state ppid ...` where `comm` may itself contain
    /// spaces and parentheses, so it is delimited by the last `)`.
    fn parse_stat(content: &str) -> Option<StatLine> {
        let open = content.find('(')?;
        let close = content.rfind(')')?;
        if close < open {
            return None;
        }

        let name = content[open + 1..close].to_string();
        let mut rest = content[close + 1..].split_whitespace();
        let state = rest.next()?.chars().next()?;
        let parent_pid = match rest.next()?.parse::<u32>().ok()? {
            0 => None,
            ppid => Some(ppid),
        };

        Some(StatLine {
            name,
            state,
            parent_pid,
        })
    }

    /// Real UID from the `Uid:` line of `/proc/<pid>/status`.
    fn parse_status_uid(content: &str) -> Option<String> {
        content
            .lines()
            .find_map(|line| line.strip_prefix("Uid:"))
            .and_then(|ids| ids.split_whitespace().next())
            .map(str::to_string)
    }

    /// Parse `/proc/net/tcp` into `(socket inode, local port)` rows.
    ///
    /// ```text
    ///   sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
    ///    0: 0100007F:0CEA 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 38431 1 ...
    /// ```
    fn parse_tcp_table(content: &str) -> Vec<(u64, u16)> {
        let mut rows = Vec::new();

        for line in content.lines().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 {
                continue;
            }

            let Some((_, port_hex)) = fields[1].rsplit_once(':') else {
                continue;
            };
            let Ok(port) = u16::from_str_radix(port_hex, 16) else {
                continue;
            };
            let Ok(inode) = fields[9].parse::<u64>() else {
                continue;
            };

            // Inode 0 marks sockets in TIME_WAIT that no process owns anymore.
            if inode != 0 {
                rows.push((inode, port));
            }
        }

        rows
    }

    /// Base name of `argv[0]` from the NUL-separated `/proc/<pid>/cmdline`.
    fn parse_cmdline_base_name(content: &[u8]) -> Option<String> {
        let argv0 = content.split(|&b| b == 0).next()?;
        Self::base_name(Path::new(OsStr::from_bytes(argv0)))
    }

    fn base_name(path: &Path) -> Option<String> {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
    }

    /// Executable base name of a process whose `comm` is `comm`.
    ///
    /// `comm` is capped at 15 bytes and can be renamed with `prctl`. A
    /// candidate agrees with it when it is equal, or extends it when `comm`
    /// is at the cap. The `argv[0]` base name wins over the `exe` base name
    /// since the kernel resolves symlinks in the latter. With no agreeing
    /// candidate the `exe` name is used, then `comm`. A disagreeing
    /// `argv[0]` is never used alone, as daemons rewrite it freely.
    fn resolve_name(comm: String, argv0: Option<String>, exe: Option<String>) -> String {
        let agrees = |candidate: &String| {
            if comm.len() >= COMM_MAX_LEN {
                candidate.starts_with(comm.as_str())
            } else {
                *candidate == comm
            }
        };

        if let Some(name) = argv0.as_ref().filter(|c| agrees(*c)) {
            return name.clone();
        }
        if let Some(name) = exe.as_ref().filter(|c| agrees(*c)) {
            return name.clone();
        }
        exe.unwrap_or(comm)
    }

    /// Full executable base name, recovered from `cmdline` and the `exe` link.
    fn full_name(&self, pid: u32, comm: String) -> String {
        let dir = self.pid_dir(pid);
        let argv0 = fs::read(dir.join("cmdline"))
            .ok()
            .and_then(|content| Self::parse_cmdline_base_name(&content));
        let exe = fs::read_link(dir.join("exe")).ok().and_then(|target| {
            let target = target.to_string_lossy();
            let target = target.strip_suffix(DELETED_SUFFIX).unwrap_or(&target);
            Self::base_name(Path::new(target))
        });

        Self::resolve_name(comm, argv0, exe)
    }

    /// Socket inode from an fd link target such as `socket:[38431]`.
    fn parse_socket_inode(target: &Path) -> Option<u64> {
        target
            .to_str()?
            .strip_prefix("socket:[")?
            .strip_suffix(']')?
            .parse()
            .ok()
    }

    /// Name and parent of one process, skipping zombies.
    ///
    /// A process whose stat can no longer be read is reported nameless.
    fn read_entry(&self, pid: u32) -> Option<ProcessRecord> {
        match fs::read_to_string(self.pid_dir(pid).join("stat")) {
            Ok(content) => match Self::parse_stat(&content) {
                Some(stat) if matches!(stat.state, 'Z' | 'X' | 'x') => {
                    debug!(pid = pid, "Skipping exited process");
                    None
                }
                Some(stat) => {
                    let name = self.full_name(pid, stat.name);
                    Some(ProcessRecord::new(pid, name, stat.parent_pid))
                }
                None => Some(ProcessRecord::new(pid, "", None)),
            },
            Err(_) => Some(ProcessRecord::new(pid, "", None)),
        }
    }

    /// Bare snapshot with names and parents only.
    fn snapshot(&self) -> Vec<ProcessRecord> {
        self.pids()
            .into_iter()
            .filter_map(|pid| self.read_entry(pid))
            .collect()
    }

    fn enrich(&self, record: ProcessRecord) -> ProcessRecord {
        let owner = self.owner_sid(record.pid);
        let path = self.executable_path(record.pid);
        record.with_owner(owner).with_path(path)
    }

    /// Socket inode -> owning PID, from every readable fd directory.
    fn socket_owners(&self) -> HashMap<u64, u32> {
        let mut owners = HashMap::new();

        for pid in self.pids() {
            let Ok(fds) = fs::read_dir(self.pid_dir(pid).join("fd")) else {
                continue;
            };
            for fd in fds.filter_map(|fd| fd.ok()) {
                if let Some(inode) = fs::read_link(fd.path())
                    .ok()
                    .and_then(|target| Self::parse_socket_inode(&target))
                {
                    owners.entry(inode).or_insert(pid);
                }
            }
        }

        owners
    }
}

impl Default for LinuxProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for LinuxProcessTable {
    fn list_all(&self) -> Vec<ProcessRecord> {
        self.snapshot()
            .into_iter()
            .map(|record| self.enrich(record))
            .collect()
    }

    fn list_descendants(&self, root_pid: u32) -> Vec<ProcessRecord> {
        collect_descendants(&self.snapshot(), root_pid)
            .into_iter()
            .map(|record| self.enrich(record))
            .collect()
    }

    fn current_user_sid(&self) -> Option<String> {
        Some(getuid().to_string())
    }

    fn owner_sid(&self, pid: u32) -> Option<String> {
        fs::read_to_string(self.pid_dir(pid).join("status"))
            .ok()
            .and_then(|content| Self::parse_status_uid(&content))
    }

    fn executable_path(&self, pid: u32) -> String {
        match fs::read_link(self.pid_dir(pid).join("exe")) {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                debug!(pid = pid, error = %e, "Executable path unavailable");
                NOT_AVAILABLE.to_string()
            }
        }
    }

    fn listening_ports(&self) -> PortTable {
        let rows = match fs::read_to_string(self.root.join("net").join("tcp")) {
            Ok(content) => Self::parse_tcp_table(&content),
            Err(e) => {
                warn!(error = %e, "Failed to read TCP table");
                return PortTable::new();
            }
        };
        if rows.is_empty() {
            return PortTable::new();
        }

        let owners = self.socket_owners();
        let mut table = PortTable::new();
        for (inode, port) in rows {
            if let Some(&pid) = owners.get(&inode) {
                table.entry(pid).or_default().insert(port);
            }
        }

        debug!(processes = table.len(), "Resolved TCP owner table");
        table
    }
}

/// Linux terminator sending `SIGKILL`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxTerminator;

impl LinuxTerminator {
    pub fn new() -> Self {
        Self
    }

    /// Map a `kill(2)` errno onto the termination taxonomy.
    fn classify(errno: Errno) -> TerminationCause {
        match errno {
            Errno::EPERM | Errno::EINVAL => TerminationCause::PermissionOrInvalidProcess,
            Errno::ESRCH => TerminationCause::AlreadyExitedOrNotFound,
            Errno::ENOTSUP => TerminationCause::RemoteProcessUnsupported,
            other => TerminationCause::Unclassified(other.desc().to_string()),
        }
    }
}

impl ProcessTerminator for LinuxTerminator {
    fn terminate(&self, pid: u32) -> Result<(), TerminationCause> {
        // PID 0 and negative values address process groups, never one process.
        let raw = match i32::try_from(pid) {
            Ok(raw) if raw > 0 => raw,
            _ => return Err(TerminationCause::PermissionOrInvalidProcess),
        };

        debug!(pid = pid, "Sending SIGKILL");
        kill(Pid::from_raw(raw), Signal::SIGKILL).map_err(|errno| {
            warn!(pid = pid, error = %errno, "kill failed");
            Self::classify(errno)
        })
    }
}
