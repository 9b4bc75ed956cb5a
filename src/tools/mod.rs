//! MCP tool parameter types.
//!
//! All parameter structs derive `Deserialize + JsonSchema` for MCP tool
//! registration; the closed status/priority vocabularies live here too.

pub mod params;

pub use params::*;
