#![forbid(unsafe_code)]

//! Live execution orchestrator for collaborative notebook code cells.
//!
//! Receives typed commands over a session-scoped event channel, drives the
//! per-cell `idle ↔ running` state machine, launches and tracks cell script
//! processes, streams their output back to subscribers, and fires advisory
//! dependency-health checks whenever code executes.

pub mod channel;
pub mod config;
pub mod deps;
pub mod errors;
pub mod exec;
pub mod models;
pub mod registry;
pub mod secrets;
pub mod store;
pub mod validate;
pub mod ws;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
