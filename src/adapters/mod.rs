//! Infrastructure adapters for external systems.

pub mod llm;
pub mod mcp;
pub mod memory;
pub mod sqlite;
