//! C FFI bindings for reallystop-core
//!
//! A C-compatible API for hosts such as an IDE extension: pass the
//! selection in, get a 0/1/2 result code back, and read the failure
//! message on error.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::ptr;

use libc::{c_char, c_int, size_t};
use reallystop_core::{FilterConfiguration, OperationOutcome, PortRestriction};
use tracing::warn;

/// Only processes owned by the calling account.
pub const REALLYSTOP_CURRENT_USER: u32 = 1;
/// Only descendants of the calling process.
pub const REALLYSTOP_CHILDREN: u32 = 1 << 1;
/// Only processes owning one of the given ports, or no port at all.
pub const REALLYSTOP_PORTS: u32 = 1 << 2;

/// All processes were killed.
pub const REALLYSTOP_SUCCESS: c_int = 0;
/// Nothing matched.
pub const REALLYSTOP_NOT_FOUND: c_int = 1;
/// A kill failed; see `reallystop_last_error`.
pub const REALLYSTOP_ERROR: c_int = 2;

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

// ============================================================================
// Termination
// ============================================================================

/// Kill every process matching the selection.
///
/// `names` and `ports` are arrays of NUL-terminated UTF-8 strings. Null
/// arrays, null entries and invalid UTF-8 are ignored. `flags` is a
/// combination of `REALLYSTOP_CURRENT_USER`, `REALLYSTOP_CHILDREN` and
/// `REALLYSTOP_PORTS`.
///
/// Returns 0 on success, 1 when nothing matched, 2 on error. Blocks until
/// the whole run completes.
///
/// # Safety
/// Non-null arrays must hold `*_len` readable pointers, each null or
/// pointing to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn reallystop_terminate(
    names: *const *const c_char,
    names_len: size_t,
    flags: u32,
    ports: *const *const c_char,
    ports_len: size_t,
) -> c_int {
    let filter = filter_from_c(
        read_strings(names, names_len),
        flags,
        read_strings(ports, ports_len),
    );
    record_outcome(&reallystop_core::terminate(&filter))
}

/// Message of the last failed `reallystop_terminate` on this thread.
///
/// Returns null if the last call did not fail. Free the result with
/// `reallystop_free_string`.
#[no_mangle]
pub extern "C" fn reallystop_last_error() -> *mut c_char {
    LAST_ERROR.with(|last| match last.borrow().as_ref() {
        Some(message) => string_to_c_char(message.clone()),
        None => ptr::null_mut(),
    })
}

/// Child processes of the caller grouped by name, as a JSON array.
///
/// Each element has `name`, `count`, `executablePath` and `pids`. Free the
/// result with `reallystop_free_string`.
#[no_mangle]
pub extern "C" fn reallystop_child_processes_json() -> *mut c_char {
    let groups = reallystop_core::child_process_groups();
    match serde_json::to_string(&groups) {
        Ok(json) => string_to_c_char(json),
        Err(e) => {
            warn!(error = %e, "Failed to serialize child processes");
            ptr::null_mut()
        }
    }
}

/// Free a string returned by this library.
///
/// # Safety
/// `s` must be null or a pointer obtained from this library, freed once.
#[no_mangle]
pub unsafe extern "C" fn reallystop_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Get library version
#[no_mangle]
pub extern "C" fn reallystop_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// Helper Functions
// ============================================================================

fn filter_from_c(names: Vec<String>, flags: u32, ports: Vec<String>) -> FilterConfiguration {
    FilterConfiguration::with_names(names)
        .current_user_only(flags & REALLYSTOP_CURRENT_USER != 0)
        .descendants_only(flags & REALLYSTOP_CHILDREN != 0)
        .ports(PortRestriction {
            enabled: flags & REALLYSTOP_PORTS != 0,
            ports,
        })
}

/// Map an outcome to its result code, remembering the failure message.
fn record_outcome(outcome: &OperationOutcome) -> c_int {
    let message = outcome.failure().map(|f| f.to_string());
    LAST_ERROR.with(|last| *last.borrow_mut() = message);

    match outcome {
        OperationOutcome::Success => REALLYSTOP_SUCCESS,
        OperationOutcome::NotFound => REALLYSTOP_NOT_FOUND,
        OperationOutcome::Error(_) => REALLYSTOP_ERROR,
    }
}

/// Read a C string array, skipping null and non-UTF-8 entries.
unsafe fn read_strings(array: *const *const c_char, len: size_t) -> Vec<String> {
    if array.is_null() || len == 0 {
        return Vec::new();
    }

    std::slice::from_raw_parts(array, len)
        .iter()
        .filter(|p| !p.is_null())
        .filter_map(|&p| CStr::from_ptr(p).to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Convert Rust String to C char pointer
fn string_to_c_char(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Tests
// ============================================================================
