//! Domain layer for the lab-agent planner
//!
//! Core models, domain errors and the port traits adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
