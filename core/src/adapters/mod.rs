//! Adapters layer - External system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`.
//! Each adapter talks to the operating system directly.

pub mod process_table;

// Re-export main types for convenience
pub use process_table::{SystemProcessTable, SystemTerminator};
