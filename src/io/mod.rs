//! Input/Output handling for CLI and MCP tool integration.
//!
//! The unified JSON envelope (`envelope`) backs both the CLI's `--json` flag
//! and the MCP server's tool responses, so "no results" always serializes
//! the same way regardless of which front end is asking.

pub mod envelope;

pub use envelope::{
    EntityType, Envelope, ErrorDetails, MessageType, Meta, ResultCode, SCHEMA_VERSION, Status,
};
