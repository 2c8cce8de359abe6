//! Infrastructure layer module
//!
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Project setup and runtime wiring

pub mod config;
pub mod logging;
pub mod setup;
