//! Nosy Worker: conversation summaries and client action items.

pub mod actions;
pub mod channels;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod llm;
pub mod mail;
pub mod mcp;
pub mod sources;
pub mod summarize;
