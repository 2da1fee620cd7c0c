//! # Core State Module
//!
//! Persistence of the playback state across restarts: the queue line
//! serializer and the line-oriented playlist state section of the state
//! file.

pub mod error;
pub mod queue;
pub mod state_file;

pub use error::{Result, StateError};
pub use queue::{load_queue_line, save_queue, QueueEntry};
pub use state_file::{PlayerState, PlaylistState};
