//! MCP tool aggregator adapters.
//!
//! `HttpMcpClient` talks JSON-RPC to the configured tool servers;
//! `MockMcpClient` serves a fixed tool list in-process.

pub mod http_client;
pub mod mock;

pub use http_client::HttpMcpClient;
pub use mock::MockMcpClient;
