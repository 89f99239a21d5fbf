//! Minimal Model Context Protocol client over stdio.

pub mod client;
pub mod types;

pub use client::{ServerCommand, StdioClient};
pub use types::{CallToolResult, ToolContent};
