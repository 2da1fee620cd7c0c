//! # Decoder Plugin Contract
//!
//! The capability surface a decoder plugin sees. Plugins receive a
//! [`DecoderClient`] (in production always the bridge), pull compressed
//! bytes through it, and push decoded PCM, tags and gain information back.

use crate::control::DecoderCommand;
use crate::error::Result;
use crate::input::InputStreamHandle;
use core_audio::{AudioFormat, MixRampInfo, ReplayGainInfo, SongTime, Tag};
use std::sync::Arc;

/// The plugin-facing surface of the decoder bridge.
///
/// A plugin must call [`ready`](Self::ready) exactly once before
/// submitting anything, poll [`get_command`](Self::get_command) regularly,
/// and return when it decoded to end of stream, hit a fatal error, or
/// observed a `Stop` command.
pub trait DecoderClient {
    /// Announce the negotiated stream properties and enter the decode
    /// state.
    fn ready(&mut self, audio_format: AudioFormat, seekable: bool, duration: Option<SongTime>);

    /// The current virtual command.
    fn get_command(&mut self) -> DecoderCommand;

    /// Acknowledge the current command after honoring it.
    fn command_finished(&mut self);

    /// Target position of the outstanding seek.
    fn seek_time(&mut self) -> SongTime;

    /// Target position of the outstanding seek as a frame index.
    fn seek_frame(&mut self) -> u64;

    /// Report that the outstanding seek cannot be satisfied.
    fn seek_error(&mut self);

    /// Open the input stream behind `uri`, waiting until it is ready.
    fn open_uri(&mut self, uri: &str) -> Result<Arc<InputStreamHandle>>;

    /// Read up to `buffer.len()` bytes, waiting for availability. Returns
    /// 0 on end of stream, error, or cancellation.
    fn read(&mut self, stream: &InputStreamHandle, buffer: &mut [u8]) -> usize;

    /// Read exactly `buffer.len()` bytes; `false` on a short read.
    fn read_full(&mut self, stream: &InputStreamHandle, buffer: &mut [u8]) -> bool;

    /// Discard exactly `length` bytes; `false` on a short read.
    fn skip(&mut self, stream: &InputStreamHandle, length: usize) -> bool;

    /// Overwrite the running timestamp (seconds from the start of the
    /// file).
    fn submit_timestamp(&mut self, seconds: f64);

    /// Submit decoded PCM. Returns the command the plugin must now honor
    /// (`None` when all data was accepted).
    fn submit_data(
        &mut self,
        stream: Option<&InputStreamHandle>,
        data: &[u8],
        kbit_rate: u16,
    ) -> DecoderCommand;

    /// Submit a tag parsed from the audio file.
    fn submit_tag(&mut self, stream: Option<&InputStreamHandle>, tag: Tag) -> DecoderCommand;

    /// Submit ReplayGain values; `None` disables gain.
    fn submit_replay_gain(&mut self, info: Option<&ReplayGainInfo>);

    /// Submit MixRamp point lists.
    fn submit_mixramp(&mut self, info: MixRampInfo);
}

/// A format-specific decoder.
pub trait DecoderPlugin: Send {
    /// Decode the song, driving `client` until end of stream, a fatal
    /// error, or a `Stop` command.
    fn decode(&mut self, client: &mut dyn DecoderClient) -> Result<()>;
}
