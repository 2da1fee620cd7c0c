//! # State Persistence Error Types

use thiserror::Error;

/// Errors while saving or restoring the persisted playback state.
#[derive(Error, Debug)]
pub enum StateError {
    /// Reading or writing the state file failed.
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line in the state file could not be parsed.
    #[error("malformed state line: {0}")]
    Malformed(String),
}

/// Result type for state persistence operations.
pub type Result<T> = std::result::Result<T, StateError>;
