//! Windows process table implementation on Win32 APIs.
//!
//! - Toolhelp snapshots for the process list and parent PIDs
//! - Primary tokens (`TokenUser`) for owner SIDs
//! - `GetProcessImageFileNameW` plus `GetFinalPathNameByHandleW` for
//!   drive-letter executable paths
//! - `GetExtendedTcpTable` for the IPv4 TCP owner table
//!
//! Every OS handle kind gets its own guard type and is released on drop.

#![cfg(target_os = "windows")]

use std::ffi::c_void;
use std::mem;

use tracing::{debug, warn};
use windows::core::{HSTRING, PWSTR};
use windows::Win32::Foundation::{
    CloseHandle, LocalFree, ERROR_ACCESS_DENIED, ERROR_INSUFFICIENT_BUFFER,
    ERROR_INVALID_HANDLE, ERROR_INVALID_PARAMETER, ERROR_NOT_SUPPORTED, HANDLE, HLOCAL,
    NO_ERROR,
};
use windows::Win32::NetworkManagement::IpHelper::{
    GetExtendedTcpTable, MIB_TCPTABLE_OWNER_PID, TCP_TABLE_OWNER_PID_ALL,
};
use windows::Win32::Networking::WinSock::AF_INET;
use windows::Win32::Security::Authorization::ConvertSidToStringSidW;
use windows::Win32::Security::{GetTokenInformation, TokenUser, TOKEN_QUERY, TOKEN_USER};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, GetFinalPathNameByHandleW, FILE_FLAG_BACKUP_SEMANTICS, FILE_NAME_NORMALIZED,
    FILE_READ_ATTRIBUTES, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::ProcessStatus::GetProcessImageFileNameW;
use windows::Win32::System::Threading::{
    GetCurrentProcess, GetExitCodeProcess, OpenProcess, OpenProcessToken, TerminateProcess,
    PROCESS_ACCESS_RIGHTS, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_TERMINATE,
};

use crate::domain::{
    collect_descendants, strip_executable_extension, ProcessRecord, TerminationCause,
    NOT_AVAILABLE,
};
use crate::ports::{PortTable, ProcessTable, ProcessTerminator};

/// Exit code reported by `GetExitCodeProcess` while a process runs.
const STILL_ACTIVE: u32 = 259;

/// Initial UTF-16 buffer size for path queries.
const PATH_BUFFER_LEN: usize = 1024;

/// Prefix of kernel device-namespace paths.
const DEVICE_PREFIX: &str = r"\Device\";

/// Prefix `GetFinalPathNameByHandleW` puts on DOS paths.
const VERBATIM_PREFIX: &str = r"\\?\";

/// Retries when the TCP table grows between the sizing and the real call.
const TCP_TABLE_ATTEMPTS: usize = 3;

// ============================================================================
// Handle guards
// ============================================================================

/// Process handle from `OpenProcess`.
struct ProcessHandle(HANDLE);

impl ProcessHandle {
    fn open(pid: u32, access: PROCESS_ACCESS_RIGHTS) -> windows::core::Result<Self> {
        let handle = unsafe { OpenProcess(access, false, pid)? };
        Ok(Self(handle))
    }

    fn raw(&self) -> HANDLE {
        self.0
    }

    fn has_exited(&self) -> bool {
        let mut code = 0u32;
        match unsafe { GetExitCodeProcess(self.0, &mut code) } {
            Ok(()) => code != STILL_ACTIVE,
            Err(_) => false,
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

/// Toolhelp snapshot handle.
struct SnapshotHandle(HANDLE);

impl SnapshotHandle {
    fn processes() -> windows::core::Result<Self> {
        let handle = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)? };
        Ok(Self(handle))
    }
}

impl Drop for SnapshotHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

/// Access token handle from `OpenProcessToken`.
struct TokenHandle(HANDLE);

impl TokenHandle {
    fn query(process: HANDLE) -> windows::core::Result<Self> {
        let mut token = HANDLE::default();
        unsafe { OpenProcessToken(process, TOKEN_QUERY, &mut token)? };
        Ok(Self(token))
    }
}

impl Drop for TokenHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

/// File handle opened only to canonicalise a path.
struct FileHandle(HANDLE);

impl FileHandle {
    fn open_for_attributes(path: &str) -> windows::core::Result<Self> {
        let handle = unsafe {
            CreateFileW(
                &HSTRING::from(path),
                FILE_READ_ATTRIBUTES.0,
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                None,
                OPEN_EXISTING,
                FILE_FLAG_BACKUP_SEMANTICS,
                HANDLE::default(),
            )?
        };
        Ok(Self(handle))
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

/// String allocated by the system with `LocalAlloc`.
struct LocalString(PWSTR);

impl LocalString {
    fn to_string_lossy(&self) -> Option<String> {
        if self.0.is_null() {
            return None;
        }
        unsafe { self.0.to_string().ok() }
    }
}

impl Drop for LocalString {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe {
                let _ = LocalFree(HLOCAL(self.0 .0 as *mut c_void));
            }
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Convert a nul-terminated UTF-16 buffer.
fn from_wide(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}

/// String SID of the user owning `process`'s primary token.
fn token_user_sid(process: HANDLE) -> Option<String> {
    let token = TokenHandle::query(process).ok()?;

    let mut needed = 0u32;
    // Sizing call: fails with ERROR_INSUFFICIENT_BUFFER and reports the size.
    let _ = unsafe { GetTokenInformation(token.0, TokenUser, None, 0, &mut needed) };
    if needed == 0 {
        return None;
    }

    // u64 storage keeps TOKEN_USER suitably aligned.
    let mut buffer = vec![0u64; (needed as usize).div_ceil(mem::size_of::<u64>())];
    unsafe {
        GetTokenInformation(
            token.0,
            TokenUser,
            Some(buffer.as_mut_ptr() as *mut c_void),
            needed,
            &mut needed,
        )
        .ok()?;
    }

    let user = unsafe { &*(buffer.as_ptr() as *const TOKEN_USER) };
    let mut sid = PWSTR::null();
    unsafe { ConvertSidToStringSidW(user.User.Sid, &mut sid).ok()? };
    LocalString(sid).to_string_lossy()
}

/// Kernel image path of a process, e.g. `\Device\HarddiskVolume3\...`.
fn image_file_name(process: HANDLE) -> Option<String> {
    let mut buffer = vec![0u16; PATH_BUFFER_LEN];
    let len = unsafe { GetProcessImageFileNameW(process, &mut buffer) } as usize;
    if len == 0 {
        return None;
    }
    Some(from_wide(&buffer[..len]))
}

/// Rewrite a device-namespace path to drive-letter form.
///
/// Opens the path through the global root and asks for the final,
/// symlink-resolved name. Paths outside `\Device\` are returned unchanged.
fn canonicalize_device_path(path: &str) -> Option<String> {
    if !path.starts_with(DEVICE_PREFIX) {
        return Some(path.to_string());
    }

    let file = FileHandle::open_for_attributes(&format!(r"\\?\GLOBALROOT{}", path)).ok()?;

    let mut buffer = vec![0u16; PATH_BUFFER_LEN];
    let mut len =
        unsafe { GetFinalPathNameByHandleW(file.0, &mut buffer, FILE_NAME_NORMALIZED) } as usize;
    if len > buffer.len() {
        // Too small: the return value is the required size including the nul.
        buffer = vec![0u16; len];
        len = unsafe { GetFinalPathNameByHandleW(file.0, &mut buffer, FILE_NAME_NORMALIZED) }
            as usize;
    }
    if len == 0 || len > buffer.len() {
        return None;
    }

    let resolved = from_wide(&buffer[..len]);
    Some(
        resolved
            .strip_prefix(VERBATIM_PREFIX)
            .map(str::to_string)
            .unwrap_or(resolved),
    )
}

/// Executable path through an already opened process handle.
fn process_path(process: HANDLE) -> String {
    image_file_name(process)
        .and_then(|path| canonicalize_device_path(&path))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Decode `dwLocalPort`: network-order bytes packed into a DWORD, of which
/// only the first two are significant.
fn local_port(raw: u32) -> u16 {
    let bytes = raw.to_ne_bytes();
    u16::from_be_bytes([bytes[0], bytes[1]])
}

// ============================================================================
// WindowsProcessTable
// ============================================================================

/// Windows process table.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsProcessTable;

impl WindowsProcessTable {
    pub fn new() -> Self {
        Self
    }

    /// Walk one toolhelp snapshot into bare records.
    fn snapshot(&self) -> Vec<ProcessRecord> {
        let snapshot = match SnapshotHandle::processes() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to create process snapshot");
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        let mut entry = PROCESSENTRY32W {
            dwSize: mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        if unsafe { Process32FirstW(snapshot.0, &mut entry) }.is_err() {
            return records;
        }
        loop {
            let image = from_wide(&entry.szExeFile);
            records.push(ProcessRecord::new(
                entry.th32ProcessID,
                strip_executable_extension(&image),
                Some(entry.th32ParentProcessID),
            ));
            if unsafe { Process32NextW(snapshot.0, &mut entry) }.is_err() {
                break;
            }
        }

        records
    }

    /// Resolve owner and path through one limited-information handle.
    fn enrich(&self, record: ProcessRecord) -> ProcessRecord {
        match ProcessHandle::open(record.pid, PROCESS_QUERY_LIMITED_INFORMATION) {
            Ok(process) => {
                let owner = token_user_sid(process.raw());
                let path = process_path(process.raw());
                record.with_owner(owner).with_path(path)
            }
            Err(e) => {
                debug!(pid = record.pid, error = %e, "Process metadata unavailable");
                record
            }
        }
    }
}

impl ProcessTable for WindowsProcessTable {
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
        // Pseudo handle: never closed.
        token_user_sid(unsafe { GetCurrentProcess() })
    }

    fn owner_sid(&self, pid: u32) -> Option<String> {
        let process = ProcessHandle::open(pid, PROCESS_QUERY_LIMITED_INFORMATION).ok()?;
        token_user_sid(process.raw())
    }

    fn executable_path(&self, pid: u32) -> String {
        match ProcessHandle::open(pid, PROCESS_QUERY_LIMITED_INFORMATION) {
            Ok(process) => process_path(process.raw()),
            Err(_) => NOT_AVAILABLE.to_string(),
        }
    }

    fn listening_ports(&self) -> PortTable {
        let mut table = PortTable::new();
        let mut size = 0u32;

        for _ in 0..TCP_TABLE_ATTEMPTS {
            // u32 storage keeps the table aligned for its DWORD fields.
            let mut buffer = vec![0u32; (size as usize).div_ceil(mem::size_of::<u32>()).max(1)];
            let status = unsafe {
                GetExtendedTcpTable(
                    Some(buffer.as_mut_ptr() as *mut c_void),
                    &mut size,
                    false,
                    AF_INET.0 as u32,
                    TCP_TABLE_OWNER_PID_ALL,
                    0,
                )
            };

            if status == ERROR_INSUFFICIENT_BUFFER.0 {
                continue;
            }
            if status != NO_ERROR.0 {
                warn!(status = status, "GetExtendedTcpTable failed");
                return table;
            }

            let header = unsafe { &*(buffer.as_ptr() as *const MIB_TCPTABLE_OWNER_PID) };
            let rows = unsafe {
                std::slice::from_raw_parts(header.table.as_ptr(), header.dwNumEntries as usize)
            };
            for row in rows {
                table
                    .entry(row.dwOwningPid)
                    .or_default()
                    .insert(local_port(row.dwLocalPort));
            }
            debug!(processes = table.len(), "Resolved TCP owner table");
            return table;
        }

        warn!("TCP table kept growing, giving up");
        table
    }
}

// ============================================================================
// WindowsTerminator
// ============================================================================

/// Windows terminator using `TerminateProcess`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsTerminator;

impl WindowsTerminator {
    pub fn new() -> Self {
        Self
    }

    fn classify(error: &windows::core::Error) -> TerminationCause {
        let code = error.code();
        if code == ERROR_ACCESS_DENIED.to_hresult() || code == ERROR_INVALID_HANDLE.to_hresult() {
            TerminationCause::PermissionOrInvalidProcess
        } else if code == ERROR_INVALID_PARAMETER.to_hresult() {
            // OpenProcess reports a PID that no longer exists this way.
            TerminationCause::AlreadyExitedOrNotFound
        } else if code == ERROR_NOT_SUPPORTED.to_hresult() {
            TerminationCause::RemoteProcessUnsupported
        } else {
            TerminationCause::Unclassified(error.to_string())
        }
    }
}

impl ProcessTerminator for WindowsTerminator {
    fn terminate(&self, pid: u32) -> Result<(), TerminationCause> {
        let process =
            ProcessHandle::open(pid, PROCESS_TERMINATE | PROCESS_QUERY_LIMITED_INFORMATION)
                .map_err(|e| {
                    warn!(pid = pid, error = %e, "OpenProcess failed");
                    Self::classify(&e)
                })?;

        debug!(pid = pid, "Calling TerminateProcess");
        unsafe { TerminateProcess(process.raw(), 1) }.map_err(|e| {
            warn!(pid = pid, error = %e, "TerminateProcess failed");
            // Access is denied while a process is already exiting.
            if process.has_exited() {
                TerminationCause::AlreadyExitedOrNotFound
            } else {
                Self::classify(&e)
            }
        })
    }
}
