// src/error.rs

//! Error types for the migration engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the migration engine and its collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// External tool could not be started at all
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// External action ran and reported failure
    #[error("Command '{command}' failed ({})\nPlease check the following output:\n{output}", exit_label(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    /// Unexpected output from an external tool
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Status document could not be updated
    #[error("Status document {}: {reason}", .path.display())]
    StatusError { path: PathBuf, reason: String },

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization failure
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Lock acquisition failure
    #[error("Lock error: {0}")]
    LockError(String),

    /// A stage body failed; the stage was not marked complete
    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
