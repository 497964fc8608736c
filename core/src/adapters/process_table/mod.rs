//! Process table adapters.
//!
//! Platform-specific implementations of process discovery and termination.

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
mod unsupported;

// Re-export the platform implementation under stable names
#[cfg(target_os = "linux")]
pub use linux::{LinuxProcessTable as SystemProcessTable, LinuxTerminator as SystemTerminator};

#[cfg(target_os = "windows")]
pub use windows::{
    WindowsProcessTable as SystemProcessTable, WindowsTerminator as SystemTerminator,
};

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
pub use unsupported::{
    UnsupportedProcessTable as SystemProcessTable, UnsupportedTerminator as SystemTerminator,
};
