//! Workspace-wide error type.

use thiserror::Error;

/// Errors produced anywhere in the TaskHive workspace.
#[derive(Debug, Error)]
pub enum TaskHiveError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TaskHiveError>;
