//! Core library for the Wi-Fi test campaign tool.
//! This crate defines the collaborator traits (interfaces) and data structures,
//! the parsers for `iw` / speed-test output, the nmcli-based backend and the
//! campaign orchestrator that drives one adapter through a list of networks.

pub mod backends;
pub mod campaign;
pub mod config;
pub mod export;
pub mod parsing;
pub mod probe;
pub mod runners;
pub mod storage;
pub mod structs;
pub mod traits;

// Shared Error and Result type for the entire crate.

use std::time::Duration;
use thiserror::Error;

pub use parsing::ParseError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("{what} timed out after {}s", .after.as_secs())]
    Timeout { what: String, after: Duration },

    #[error("malformed tool output: {0}")]
    MalformedOutput(#[from] ParseError),

    #[error("connection failed: {0}")]
    ConnectFailure(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("WiFi scan failed: {0}")]
    ScanFailed(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("timestamp error: {0}")]
    Time(#[from] time::error::Format),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;
