//! Error types for workflux

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard errors: malformed input shapes that cannot be degraded into a result.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid date: {0}")]
    DateParseError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

/// Per-task degradations. These never abort a batch; they travel inside
/// the task result next to whatever organizational metadata is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskError {
    #[error("Employee not found in loaded dataset")]
    EmployeeNotFound,

    #[error("No events found for this date")]
    NoEvents,
}
