//! # Core Playback Module
//!
//! The decoder bridge and its surroundings: the machinery between a
//! format-specific decoder plugin and the player/output pipeline.
//!
//! ## Architecture
//!
//! Two long-lived threads cooperate through a shared [`DecoderControl`]:
//!
//! ```text
//! ┌─────────────────────────┐
//! │   Decoder Thread        │  plugin → DecoderBridge
//! │   (producer)            │  submit_data / submit_tag / replay gain
//! └──────────┬──────────────┘
//!            │ MusicChunk (by value)
//!            ▼
//! ┌─────────────────────────┐
//! │   MusicPipe / Buffer    │  bounded by the chunk allocator
//! └──────────┬──────────────┘
//!            │ MusicChunk (by value)
//!            ▼
//! ┌─────────────────────────┐
//! │   Player Thread         │  drains chunks at playback rate,
//! │   (consumer)            │  posts START/STOP/SEEK commands
//! └─────────────────────────┘
//! ```
//!
//! Control flows the other way: the player writes the shared command word
//! and signals the decoder; the decoder polls the *virtual* command (which
//! may be a synthesized initial seek) and acknowledges through
//! `command_finished`.
//!
//! Decoder plugins and concrete input-stream backends live outside this
//! crate; [`DecoderPlugin`], [`DecoderClient`] and
//! [`input::InputStreamSource`] define the contracts they implement.

pub mod bridge;
pub mod buffer;
pub mod chunk;
pub mod client;
pub mod control;
pub mod error;
pub mod input;
pub mod pipe;
pub mod settings;
pub mod song;

pub use bridge::{run_decoder, DecoderBridge};
pub use buffer::MusicBuffer;
pub use chunk::{MusicChunk, CHUNK_SIZE};
pub use client::{DecoderClient, DecoderPlugin};
pub use control::{DecoderCommand, DecoderControl, DecoderState};
pub use error::{DecoderError, Result};
pub use input::{
    InputStreamHandle, InputStreamOpener, InputStreamSource, MemoryInputStream, MemoryStreamOpener,
};
pub use pipe::MusicPipe;
pub use settings::{PlaybackSettings, ReplayGainSettings};
pub use song::Song;
