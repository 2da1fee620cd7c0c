//! # Music Chunk
//!
//! Fixed-capacity buffers of output-format PCM flowing from the decoder to
//! the player. Besides raw samples a chunk carries the metadata the player
//! needs at the moment the chunk is played: a timestamp, the source bitrate,
//! an optional tag and the ReplayGain values in effect.

use core_audio::{AudioFormat, ReplayGainInfo, SongTime, Tag};

/// PCM payload capacity of one chunk in bytes.
pub const CHUNK_SIZE: usize = 4096;

/// One unit of decoded audio handed through the music pipe.
pub struct MusicChunk {
    data: Vec<u8>,
    length: usize,
    time: Option<SongTime>,
    bit_rate: u16,
    audio_format: Option<AudioFormat>,

    /// Tag to be emitted when playback reaches this chunk.
    pub tag: Option<Tag>,
    /// Serial of the gain values below; 0 means no gain is applied.
    pub replay_gain_serial: u32,
    /// Gain values in effect for the samples in this chunk.
    pub replay_gain_info: Option<ReplayGainInfo>,
}

impl MusicChunk {
    pub fn new() -> Self {
        Self {
            data: vec![0u8; CHUNK_SIZE],
            length: 0,
            time: None,
            bit_rate: 0,
            audio_format: None,
            tag: None,
            replay_gain_serial: 0,
            replay_gain_info: None,
        }
    }

    /// Returns `true` if the chunk carries nothing the player could use:
    /// no PCM data and no tag.
    pub fn is_empty(&self) -> bool {
        self.length == 0 && self.tag.is_none()
    }

    /// Number of valid PCM bytes.
    pub fn length(&self) -> usize {
        self.length
    }

    /// The valid PCM bytes.
    pub fn pcm(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Song position of the first frame in this chunk.
    pub fn time(&self) -> Option<SongTime> {
        self.time
    }

    /// Source bitrate in kbit/s at the time of the first write.
    pub fn bit_rate(&self) -> u16 {
        self.bit_rate
    }

    /// Format of the PCM data, recorded on the first write.
    pub fn audio_format(&self) -> Option<AudioFormat> {
        self.audio_format
    }

    fn check_format(&self, format: AudioFormat) -> bool {
        self.audio_format.is_none() || self.audio_format == Some(format)
    }

    /// Prepare writing to this chunk and return the writable region.
    ///
    /// The region is rounded down to whole frames of `format`; it is empty
    /// when less than one frame of space remains. The timestamp and bitrate
    /// are recorded on the first write.
    pub fn write(&mut self, format: AudioFormat, time: SongTime, bit_rate: u16) -> &mut [u8] {
        debug_assert!(self.check_format(format));

        if self.length == 0 {
            self.time = Some(time);
            self.bit_rate = bit_rate;
            self.audio_format = Some(format);
        }

        let frame_size = format.frame_size();
        let num_frames = (CHUNK_SIZE - self.length) / frame_size;
        let end = self.length + num_frames * frame_size;
        &mut self.data[self.length..end]
    }

    /// Commit `nbytes` written into the region returned by
    /// [`write`](Self::write). Returns `true` if the chunk is now full for
    /// this format (less than one frame of space remains).
    pub fn expand(&mut self, format: AudioFormat, nbytes: usize) -> bool {
        debug_assert!(self.check_format(format));
        debug_assert!(self.length + nbytes <= CHUNK_SIZE);

        self.length += nbytes;
        self.length + format.frame_size() > CHUNK_SIZE
    }

    /// Reset the chunk for reuse by the allocator.
    pub fn clear(&mut self) {
        self.length = 0;
        self.time = None;
        self.bit_rate = 0;
        self.audio_format = None;
        self.tag = None;
        self.replay_gain_serial = 0;
        self.replay_gain_info = None;
    }
}

impl Default for MusicChunk {
    fn default() -> Self {
        Self::new()
    }
}
