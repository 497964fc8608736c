//! Ports layer - Trait definitions (interfaces).
//!
//! The application services only see these traits. Implementations that
//! talk to the OS live in `adapters`; tests substitute in-memory fakes.

mod process_table;
mod terminator;

pub use process_table::{PortTable, ProcessTable};
pub use terminator::ProcessTerminator;
