//! Logseq MCP Server library.
//!
//! Provides the [`server::LogseqMcpServer`] MCP handler plus the script
//! runner, task cache, and configuration pieces it is built from. Used by
//! the `logseq-mcp` binary and by the integration tests.

pub mod config;
pub mod probe;
pub mod script;
pub mod server;
pub mod tasks;
pub mod tools;
