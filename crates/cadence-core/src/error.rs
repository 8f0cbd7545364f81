use thiserror::Error;

use crate::models::{
    ParseCategoryError, ParseFrequencyError, ParsePriorityError, ParsePropagationModeError,
};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Invalid recurrence frequency: {0}")]
    InvalidFrequency(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Date arithmetic out of range: {0}")]
    OutOfRange(String),
}

// Parse failures at the string boundary escalate to the crate error so
// callers can use `?` on user-supplied field values.

impl From<ParseFrequencyError> for CoreError {
    fn from(err: ParseFrequencyError) -> Self {
        CoreError::InvalidFrequency(err.0)
    }
}

impl From<ParsePriorityError> for CoreError {
    fn from(err: ParsePriorityError) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

impl From<ParseCategoryError> for CoreError {
    fn from(err: ParseCategoryError) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

impl From<ParsePropagationModeError> for CoreError {
    fn from(err: ParsePropagationModeError) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}
