//! Application layer - Use case services.
//!
//! Services are thin orchestrators that:
//! - Accept domain types as inputs
//! - Use ports (traits) for every OS interaction
//! - Return domain types as outputs

mod filter_service;
mod termination_service;

pub use filter_service::ProcessFilterService;
pub use termination_service::TerminationService;
