//! # Decoder Error Types

use core_audio::ConvertError;
use thiserror::Error;

/// Errors raised by or captured in the decoder bridge.
///
/// `Stopped` is not a failure: it is the cooperative-cancellation unwind a
/// plugin uses to leave its decode loop promptly after a STOP command was
/// observed inside a blocking call.
#[derive(Error, Debug)]
pub enum DecoderError {
    /// A STOP command interrupted a blocking operation.
    #[error("decoder stopped")]
    Stopped,

    /// The input stream failed.
    #[error("input stream error: {0}")]
    Io(String),

    /// The PCM conversion chain failed.
    #[error("pcm conversion failed: {0}")]
    Convert(#[from] ConvertError),

    /// The decoder plugin reported a fatal decode error.
    #[error("decoder plugin error: {0}")]
    Plugin(String),

    /// A seek command could not be satisfied.
    #[error("seeking failed")]
    SeekFailed,
}

impl DecoderError {
    /// Returns `true` for the cooperative-cancellation unwind.
    pub fn is_stop(&self) -> bool {
        matches!(self, DecoderError::Stopped)
    }
}

/// Result type for decoder operations.
pub type Result<T> = std::result::Result<T, DecoderError>;
