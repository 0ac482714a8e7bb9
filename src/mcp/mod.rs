//! Stdio transport exposing the dispatcher as an MCP tool server.

pub mod protocol;
pub mod server;

pub use server::McpServer;
