//! # Audio Error Types

use crate::convert::ConvertError;
use thiserror::Error;

/// Errors from the audio type and conversion layer.
#[derive(Error, Debug)]
pub enum AudioError {
    /// An audio format failed validation.
    #[error("invalid audio format: {0}")]
    InvalidFormat(String),

    /// The PCM conversion chain failed.
    #[error("pcm conversion failed: {0}")]
    Convert(#[from] ConvertError),
}

/// Result type for audio operations.
pub type Result<T> = std::result::Result<T, AudioError>;
