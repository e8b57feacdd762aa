//! SweetSync Tools module
//!
//! MCP tool implementations for SweetSync.

pub mod account;
pub mod charts;
pub mod readings;
pub mod status;
