//! Error types for taskline
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (unknown task, invalid input, bad config)
//! - 3: State conflict (wrong status, blocked task, open subtasks)
//! - 4: Operation failed (storage, git, serialization)

use std::path::PathBuf;
use thiserror::Error;

use crate::task::TaskId;

/// Exit codes for the taskline CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const STATE_CONFLICT: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for taskline operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // State conflicts (exit code 3)
    #[error("State conflict: {0}")]
    StateConflict(String),

    // Operation failures (exit code 4)
    #[error("Malformed task record {path}: {message}")]
    MalformedRecord { path: PathBuf, message: String },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::NotFound(_) | Error::Validation(_) | Error::InvalidConfig(_) => {
                exit_codes::USER_ERROR
            }

            // Lifecycle rules
            Error::StateConflict(_) => exit_codes::STATE_CONFLICT,

            // Operation failures
            Error::MalformedRecord { .. }
            | Error::Git(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Stable error kind reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Validation(_) | Error::InvalidConfig(_) => "validation",
            Error::StateConflict(_) => "state_conflict",
            _ => "io",
        }
    }

    /// Structured fields for JSON error bodies
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::NotFound(id) => Some(serde_json::json!({ "task_id": id })),
            Error::Validation(message)
            | Error::InvalidConfig(message)
            | Error::StateConflict(message) => Some(serde_json::json!({ "message": message })),
            Error::MalformedRecord { path, message } => Some(serde_json::json!({
                "path": path.to_string_lossy(),
                "message": message,
            })),
            _ => None,
        }
    }
}

/// Result type alias for taskline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        }
    }
}
