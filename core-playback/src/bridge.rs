//! # Decoder Bridge
//!
//! The mediator between a decoder plugin and the player pipeline. It
//! enforces the cooperative command protocol, synthesizes the virtual
//! initial-seek command for sub-range playback, converts PCM to the output
//! format, merges tag sources, applies ReplayGain, and packs frames into
//! chunks flowing through the music pipe.
//!
//! All fields except the captured error slot are private to the decoder
//! thread; coordination with the player happens exclusively through the
//! shared [`DecoderControl`].

use crate::chunk::MusicChunk;
use crate::client::{DecoderClient, DecoderPlugin};
use crate::control::{DecoderCommand, DecoderControl, DecoderState};
use crate::error::{DecoderError, Result};
use crate::input::{InputStreamHandle, InputStreamOpener};
use core_audio::{
    AudioFormat, MixRampInfo, PcmConvert, ReplayGainInfo, ReplayGainMode, SongTime, Tag,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Decoder-thread side of one decode run.
pub struct DecoderBridge {
    dc: Arc<DecoderControl>,
    opener: Arc<dyn InputStreamOpener>,

    /// Negotiated formats, cached after `ready`.
    in_format: Option<AudioFormat>,
    out_format: Option<AudioFormat>,

    /// Conversion chain; present iff the formats differ.
    convert: Option<PcmConvert>,

    /// Tag from the queue entry, consumed once no stream tag appears.
    song_tag: Option<Tag>,
    /// Most recent tag received from the input stream.
    stream_tag: Option<Tag>,
    /// Most recent tag received from the plugin.
    decoder_tag: Option<Tag>,

    /// Partially filled outgoing chunk, reserved from the allocator.
    current_chunk: Option<MusicChunk>,

    /// Position in seconds from the start of the file.
    timestamp: f64,

    /// A seek to the song's start time still has to be synthesized.
    initial_seek_pending: bool,
    /// The synthesized initial seek is being serviced by the plugin.
    initial_seek_running: bool,
    /// A real SEEK command is between `seek_time` and `command_finished`.
    seeking: bool,

    replay_gain_info: Option<ReplayGainInfo>,
    replay_gain_serial: u32,

    /// Deferred error, published to the player when the decoder exits.
    error: Option<DecoderError>,
}

impl DecoderBridge {
    pub fn new(dc: Arc<DecoderControl>, opener: Arc<dyn InputStreamOpener>) -> Self {
        let song_tag = dc.song().tag.clone();
        let initial_seek_pending = dc.start_time().is_positive();

        Self {
            dc,
            opener,
            in_format: None,
            out_format: None,
            convert: None,
            song_tag,
            stream_tag: None,
            decoder_tag: None,
            current_chunk: None,
            timestamp: 0.0,
            initial_seek_pending,
            initial_seek_running: false,
            seeking: false,
            replay_gain_info: None,
            replay_gain_serial: 0,
            error: None,
        }
    }

    /// Position in seconds from the start of the file.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// The partially filled outgoing chunk, if any.
    pub fn current_chunk(&self) -> Option<&MusicChunk> {
        self.current_chunk.as_ref()
    }

    /// Returns `true` if a PCM conversion chain is installed.
    pub fn is_converting(&self) -> bool {
        self.convert.is_some()
    }

    /// Wrap an already-created source into a stream handle tied to this
    /// bridge's wakeup signal. Used when the caller opens the song's
    /// stream itself instead of going through [`open_uri`](Self::open_uri).
    pub fn open_source(&self, source: Box<dyn crate::input::InputStreamSource>) -> Arc<InputStreamHandle> {
        InputStreamHandle::new(source, self.dc.shared_cond())
    }

    /// Take the captured error. Meant for the player after the decoder
    /// thread returned.
    pub fn take_error(&mut self) -> Option<DecoderError> {
        self.error.take()
    }

    // ------------------------------------------------------------------
    // Format handshake
    // ------------------------------------------------------------------

    /// Implementation of [`DecoderClient::ready`].
    pub fn ready(&mut self, audio_format: AudioFormat, seekable: bool, duration: Option<SongTime>) {
        debug_assert_eq!(self.dc.peek_state(), DecoderState::Start);
        debug_assert!(self.dc.pipe().is_empty());
        debug_assert!(self.convert.is_none());
        debug_assert!(self.stream_tag.is_none());
        debug_assert!(self.decoder_tag.is_none());
        debug_assert!(!self.seeking);
        debug_assert!(audio_format.is_defined());
        debug_assert!(audio_format.is_valid());

        let out_format = self.dc.settings().output_audio_format(audio_format);
        debug!(in_format = %audio_format, seekable, "decoder ready");

        if audio_format != out_format {
            debug!(%out_format, "converting decoder output");
            match PcmConvert::open(audio_format, out_format) {
                Ok(convert) => self.convert = Some(convert),
                // surfaces as STOP at the next command poll
                Err(err) => self.error = Some(DecoderError::Convert(err)),
            }
        }

        self.in_format = Some(audio_format);
        self.out_format = Some(out_format);

        let dc = Arc::clone(&self.dc);
        let mut shared = dc.lock();
        shared.in_audio_format = Some(audio_format);
        shared.out_audio_format = Some(out_format);
        shared.seekable = seekable;
        shared.total_time = duration;
        dc.set_state_with(&mut shared, DecoderState::Decode);
        drop(shared);
        dc.notify_client();
    }

    // ------------------------------------------------------------------
    // Virtual command & initial seek
    // ------------------------------------------------------------------

    /// Resolve the pending initial seek, if it is due. Returns `true` when
    /// the plugin must be steered to the song's start time now.
    fn prepare_initial_seek(&mut self, shared: &crate::control::DecoderShared) -> bool {
        if shared.state != DecoderState::Decode {
            // wait until the plugin finished reading file headers
            return false;
        }

        if self.initial_seek_running {
            // already begun - overrides any other command
            return true;
        }

        if self.initial_seek_pending {
            if !shared.seekable {
                self.initial_seek_pending = false;
                return false;
            }

            if shared.command == DecoderCommand::None {
                self.initial_seek_pending = false;
                self.initial_seek_running = true;
                return true;
            }

            // another command (e.g. STOP) arrived first
            self.initial_seek_pending = false;
        }

        false
    }

    fn virtual_command(&mut self, shared: &crate::control::DecoderShared) -> DecoderCommand {
        if self.error.is_some() {
            // unwind the plugin
            return DecoderCommand::Stop;
        }

        if self.prepare_initial_seek(shared) {
            return DecoderCommand::Seek;
        }

        shared.command
    }

    fn lock_virtual_command(&mut self) -> DecoderCommand {
        let dc = Arc::clone(&self.dc);
        let shared = dc.lock();
        self.virtual_command(&shared)
    }

    /// Implementation of [`DecoderClient::get_command`].
    pub fn get_command(&mut self) -> DecoderCommand {
        self.lock_virtual_command()
    }

    /// Implementation of [`DecoderClient::command_finished`].
    pub fn command_finished(&mut self) {
        let dc = Arc::clone(&self.dc);
        let mut shared = dc.lock();

        debug_assert!(shared.command != DecoderCommand::None || self.initial_seek_running);
        debug_assert!(
            shared.command != DecoderCommand::Seek
                || self.initial_seek_running
                || shared.seek_error
                || self.seeking
        );

        if self.initial_seek_running {
            debug_assert!(!self.seeking);
            debug_assert!(self.current_chunk.is_none());
            debug_assert!(dc.pipe().is_empty());

            // the engine never set a command for the initial seek
            self.initial_seek_running = false;
            self.timestamp = dc.start_time().to_s();
            return;
        }

        if self.seeking {
            self.seeking = false;

            // delete frames from the old song position
            if let Some(chunk) = self.current_chunk.take() {
                dc.buffer().return_chunk(chunk);
            }
            dc.pipe().clear(dc.buffer());

            self.timestamp = shared.seek_time.to_s();
        }

        dc.set_command_with(&mut shared, DecoderCommand::None);
        drop(shared);
        dc.notify_client();
    }

    // ------------------------------------------------------------------
    // Seek support
    // ------------------------------------------------------------------

    /// Implementation of [`DecoderClient::seek_time`].
    pub fn seek_time(&mut self) -> SongTime {
        if self.initial_seek_running {
            return self.dc.start_time();
        }

        let dc = Arc::clone(&self.dc);
        let shared = dc.lock();
        debug_assert_eq!(shared.command, DecoderCommand::Seek);

        self.seeking = true;
        shared.seek_time
    }

    /// Implementation of [`DecoderClient::seek_frame`].
    pub fn seek_frame(&mut self) -> u64 {
        let sample_rate = self.in_format.map_or(0, |f| f.sample_rate);
        self.seek_time().to_scale(sample_rate)
    }

    /// Implementation of [`DecoderClient::seek_error`].
    pub fn seek_error(&mut self) {
        if self.initial_seek_running {
            // cannot reach the sub-song start; play from the beginning
            warn!("initial seek failed, starting at offset 0");
            self.initial_seek_running = false;
            return;
        }

        {
            let dc = Arc::clone(&self.dc);
            let mut shared = dc.lock();
            debug_assert_eq!(shared.command, DecoderCommand::Seek);
            shared.seek_error = true;
        }

        self.seeking = false;
        self.command_finished();
    }

    // ------------------------------------------------------------------
    // Input stream I/O
    // ------------------------------------------------------------------

    /// Implementation of [`DecoderClient::open_uri`].
    pub fn open_uri(&mut self, uri: &str) -> Result<Arc<InputStreamHandle>> {
        debug_assert!(matches!(
            self.dc.peek_state(),
            DecoderState::Start | DecoderState::Decode
        ));

        let source = self
            .opener
            .open(uri)
            .map_err(|err| DecoderError::Io(err.to_string()))?;
        let handle = InputStreamHandle::new(source, self.dc.shared_cond());

        let mut source = handle.lock();
        loop {
            source.update();
            if source.is_ready() {
                break;
            }

            if self.dc.peek_command() == DecoderCommand::Stop {
                return Err(DecoderError::Stopped);
            }

            handle.cond_wait(&mut source);
        }
        drop(source);

        Ok(handle)
    }

    /// Should the current read be abandoned? True once an error was
    /// captured or a command is outstanding - except a SEEK the plugin is
    /// still initializing for or already servicing.
    fn check_cancel_read(&self) -> bool {
        if self.error.is_some() {
            return true;
        }

        match self.dc.peek_command() {
            DecoderCommand::None => false,
            DecoderCommand::Seek
                if self.dc.peek_state() == DecoderState::Start
                    || self.seeking
                    || self.initial_seek_running =>
            {
                false
            }
            _ => true,
        }
    }

    /// Implementation of [`DecoderClient::read`].
    pub fn read(&mut self, stream: &InputStreamHandle, buffer: &mut [u8]) -> usize {
        debug_assert!(matches!(
            self.dc.peek_state(),
            DecoderState::Start | DecoderState::Decode
        ));

        if buffer.is_empty() {
            return 0;
        }

        let mut source = stream.lock();
        loop {
            if self.check_cancel_read() {
                return 0;
            }
            if source.is_available() {
                break;
            }
            stream.cond_wait(&mut source);
        }

        match source.read(buffer) {
            Ok(nbytes) => {
                debug_assert!(nbytes > 0 || source.is_eof());
                nbytes
            }
            Err(err) => {
                self.error = Some(DecoderError::Io(err.to_string()));
                0
            }
        }
    }

    /// Implementation of [`DecoderClient::read_full`].
    pub fn read_full(&mut self, stream: &InputStreamHandle, buffer: &mut [u8]) -> bool {
        let mut filled = 0;
        while filled < buffer.len() {
            let nbytes = self.read(stream, &mut buffer[filled..]);
            if nbytes == 0 {
                return false;
            }
            filled += nbytes;
        }
        true
    }

    /// Implementation of [`DecoderClient::skip`].
    pub fn skip(&mut self, stream: &InputStreamHandle, mut length: usize) -> bool {
        let mut scratch = [0u8; 1024];
        while length > 0 {
            let want = length.min(scratch.len());
            let nbytes = self.read(stream, &mut scratch[..want]);
            if nbytes == 0 {
                return false;
            }
            length -= nbytes;
        }
        true
    }

    // ------------------------------------------------------------------
    // Chunk packing
    // ------------------------------------------------------------------

    /// Ensure `current_chunk` holds a chunk, blocking on the allocator.
    /// `Err` carries the command that interrupted the wait.
    fn get_chunk(&mut self) -> std::result::Result<(), DecoderCommand> {
        if self.current_chunk.is_some() {
            return Ok(());
        }

        let dc = Arc::clone(&self.dc);
        loop {
            if let Some(mut chunk) = dc.buffer().allocate() {
                chunk.replay_gain_serial = self.replay_gain_serial;
                chunk.replay_gain_info = if self.replay_gain_serial != 0 {
                    self.replay_gain_info
                } else {
                    None
                };
                self.current_chunk = Some(chunk);
                return Ok(());
            }

            // allocator exhausted: wait for the player to return chunks
            let mut shared = dc.lock();
            let cmd = self.virtual_command(&shared);
            if cmd != DecoderCommand::None {
                return Err(cmd);
            }
            if dc.buffer().available() > 0 {
                // a chunk came back between the failed allocation and the
                // lock; retry instead of waiting
                continue;
            }
            dc.cond_wait(&mut shared);
        }
    }

    /// Move the current chunk into the pipe (or back to the allocator when
    /// it is still empty). A missing current chunk is a no-op.
    fn flush_chunk(&mut self) {
        debug_assert!(!self.seeking);

        if let Some(chunk) = self.current_chunk.take() {
            if chunk.is_empty() {
                self.dc.buffer().return_chunk(chunk);
            } else {
                self.dc.pipe().push(chunk);
            }
            self.dc.notify_client();
        }
    }

    // ------------------------------------------------------------------
    // Tag handling
    // ------------------------------------------------------------------

    /// Attach `tag` to a fresh chunk, flushing a partial one first.
    fn do_send_tag(&mut self, tag: &Tag) -> DecoderCommand {
        if self.current_chunk.is_some() {
            // the tag belongs on a fresh chunk
            self.flush_chunk();
        }
        debug_assert!(self.current_chunk.is_none());

        if let Err(cmd) = self.get_chunk() {
            debug_assert!(cmd != DecoderCommand::None);
            return cmd;
        }

        if let Some(chunk) = self.current_chunk.as_mut() {
            chunk.tag = Some(tag.clone());
        }
        DecoderCommand::None
    }

    /// Refresh `stream_tag` from the stream, or promote the one-shot song
    /// tag when the stream has none. Returns `true` if `stream_tag`
    /// changed.
    fn update_stream_tag(&mut self, stream: Option<&InputStreamHandle>) -> bool {
        let tag = match stream.and_then(|s| s.lock_read_tag()) {
            Some(tag) => {
                // a fresh stream tag makes the queued song tag obsolete
                self.song_tag = None;
                Some(tag)
            }
            None => self.song_tag.take(),
        };

        match tag {
            Some(tag) => {
                self.stream_tag = Some(tag);
                true
            }
            None => false,
        }
    }

    /// Implementation of [`DecoderClient::submit_tag`].
    pub fn submit_tag(&mut self, stream: Option<&InputStreamHandle>, tag: Tag) -> DecoderCommand {
        debug_assert_eq!(self.dc.peek_state(), DecoderState::Decode);

        self.decoder_tag = Some(tag);
        self.update_stream_tag(stream);

        {
            let dc = Arc::clone(&self.dc);
            let shared = dc.lock();
            if self.prepare_initial_seek(&shared) {
                // no chunk may be created until the initial seek finished
                return DecoderCommand::Seek;
            }
        }

        let merged = match (&self.stream_tag, &self.decoder_tag) {
            // the decoder tag is fresher; it wins the merge
            (Some(stream_tag), Some(decoder_tag)) => Tag::merge(stream_tag, decoder_tag),
            (None, Some(decoder_tag)) => decoder_tag.clone(),
            _ => return DecoderCommand::None,
        };
        self.do_send_tag(&merged)
    }

    // ------------------------------------------------------------------
    // Data submission
    // ------------------------------------------------------------------

    /// Implementation of [`DecoderClient::submit_timestamp`].
    pub fn submit_timestamp(&mut self, seconds: f64) {
        debug_assert!(seconds >= 0.0);
        self.timestamp = seconds;
    }

    /// Implementation of [`DecoderClient::submit_data`].
    pub fn submit_data(
        &mut self,
        stream: Option<&InputStreamHandle>,
        data: &[u8],
        kbit_rate: u16,
    ) -> DecoderCommand {
        debug_assert_eq!(self.dc.peek_state(), DecoderState::Decode);
        debug_assert_eq!(
            data.len() % self.in_format.map_or(1, |f| f.frame_size()),
            0
        );

        let mut cmd = self.lock_virtual_command();
        if cmd == DecoderCommand::Stop || cmd == DecoderCommand::Seek || data.is_empty() {
            return cmd;
        }

        debug_assert!(!self.initial_seek_pending);
        debug_assert!(!self.initial_seek_running);

        // send stream tags
        if self.update_stream_tag(stream) {
            let stream_tag = self.stream_tag.clone().unwrap_or_default();
            let tag = match &self.decoder_tag {
                // merge with the decoder tag; the stream tag is fresher
                Some(decoder_tag) => Tag::merge(decoder_tag, &stream_tag),
                None => stream_tag,
            };
            cmd = self.do_send_tag(&tag);
            if cmd != DecoderCommand::None {
                return cmd;
            }
        }

        let converted;
        let mut pcm: &[u8] = match self.convert.as_mut() {
            Some(convert) => match convert.convert(data) {
                Ok(out) => {
                    converted = out;
                    &converted
                }
                Err(err) => {
                    // no better way to bail out than stopping playback
                    self.error = Some(DecoderError::Convert(err));
                    return DecoderCommand::Stop;
                }
            },
            None => {
                debug_assert_eq!(self.in_format, self.out_format);
                data
            }
        };

        let Some(out_format) = self.out_format else {
            return DecoderCommand::Stop;
        };
        let start_time = self.dc.start_time();

        while !pcm.is_empty() {
            if let Err(pending) = self.get_chunk() {
                debug_assert!(pending != DecoderCommand::None);
                return pending;
            }

            let chunk_time = SongTime::from_s(self.timestamp).saturating_sub(start_time);
            let written = {
                let Some(chunk) = self.current_chunk.as_mut() else {
                    return DecoderCommand::Stop;
                };
                let dest = chunk.write(out_format, chunk_time, kbit_rate);
                if dest.is_empty() {
                    None
                } else {
                    let nbytes = dest.len().min(pcm.len());
                    dest[..nbytes].copy_from_slice(&pcm[..nbytes]);
                    Some((nbytes, chunk.expand(out_format, nbytes)))
                }
            };

            let Some((nbytes, full)) = written else {
                // the chunk is full for this format, flush and retry
                self.flush_chunk();
                continue;
            };
            if full {
                self.flush_chunk();
            }

            pcm = &pcm[nbytes..];
            self.timestamp += nbytes as f64 / out_format.time_to_size();

            if let Some(end_time) = self.dc.end_time() {
                if self.timestamp >= end_time.to_s() {
                    // the end of the playing range has been reached
                    return DecoderCommand::Stop;
                }
            }
        }

        DecoderCommand::None
    }

    // ------------------------------------------------------------------
    // ReplayGain & MixRamp
    // ------------------------------------------------------------------

    /// Implementation of [`DecoderClient::submit_replay_gain`].
    pub fn submit_replay_gain(&mut self, info: Option<&ReplayGainInfo>) {
        let Some(info) = info else {
            self.replay_gain_serial = 0;
            return;
        };

        let serial = self.dc.next_replay_gain_serial();

        let settings = self.dc.settings().replay_gain;
        if settings.mode != ReplayGainMode::Off {
            let mode = if settings.mode == ReplayGainMode::Album {
                ReplayGainMode::Album
            } else {
                ReplayGainMode::Track
            };
            let tuple = info.tuple_for(mode);
            let scale =
                tuple.calculate_scale(settings.preamp(), settings.missing_preamp(), settings.limit);
            self.dc.set_replay_gain_db(20.0 * scale.log10());
        }

        self.replay_gain_info = Some(*info);
        self.replay_gain_serial = serial;

        if self.current_chunk.is_some() {
            // the new gain applies only to the samples that follow
            self.flush_chunk();
        }
    }

    /// Implementation of [`DecoderClient::submit_mixramp`].
    pub fn submit_mixramp(&mut self, info: MixRampInfo) {
        self.dc.set_mix_ramp(info);
    }
}

impl Drop for DecoderBridge {
    fn drop(&mut self) {
        // a chunk still held on teardown goes back to the allocator
        if let Some(chunk) = self.current_chunk.take() {
            self.dc.buffer().return_chunk(chunk);
        }
    }
}

impl DecoderClient for DecoderBridge {
    fn ready(&mut self, audio_format: AudioFormat, seekable: bool, duration: Option<SongTime>) {
        DecoderBridge::ready(self, audio_format, seekable, duration);
    }

    fn get_command(&mut self) -> DecoderCommand {
        DecoderBridge::get_command(self)
    }

    fn command_finished(&mut self) {
        DecoderBridge::command_finished(self);
    }

    fn seek_time(&mut self) -> SongTime {
        DecoderBridge::seek_time(self)
    }

    fn seek_frame(&mut self) -> u64 {
        DecoderBridge::seek_frame(self)
    }

    fn seek_error(&mut self) {
        DecoderBridge::seek_error(self);
    }

    fn open_uri(&mut self, uri: &str) -> Result<Arc<InputStreamHandle>> {
        DecoderBridge::open_uri(self, uri)
    }

    fn read(&mut self, stream: &InputStreamHandle, buffer: &mut [u8]) -> usize {
        DecoderBridge::read(self, stream, buffer)
    }

    fn read_full(&mut self, stream: &InputStreamHandle, buffer: &mut [u8]) -> bool {
        DecoderBridge::read_full(self, stream, buffer)
    }

    fn skip(&mut self, stream: &InputStreamHandle, length: usize) -> bool {
        DecoderBridge::skip(self, stream, length)
    }

    fn submit_timestamp(&mut self, seconds: f64) {
        DecoderBridge::submit_timestamp(self, seconds);
    }

    fn submit_data(
        &mut self,
        stream: Option<&InputStreamHandle>,
        data: &[u8],
        kbit_rate: u16,
    ) -> DecoderCommand {
        DecoderBridge::submit_data(self, stream, data, kbit_rate)
    }

    fn submit_tag(&mut self, stream: Option<&InputStreamHandle>, tag: Tag) -> DecoderCommand {
        DecoderBridge::submit_tag(self, stream, tag)
    }

    fn submit_replay_gain(&mut self, info: Option<&ReplayGainInfo>) {
        DecoderBridge::submit_replay_gain(self, info);
    }

    fn submit_mixramp(&mut self, info: MixRampInfo) {
        DecoderBridge::submit_mixramp(self, info);
    }
}

// ============================================================================
// Decoder Thread Body
// ============================================================================

/// Run one decode: acknowledge the `Start` command, drive the plugin, and
/// publish the outcome. Returns the captured error, if any.
pub fn run_decoder(
    dc: &Arc<DecoderControl>,
    opener: Arc<dyn InputStreamOpener>,
    plugin: &mut dyn DecoderPlugin,
) -> Option<DecoderError> {
    let mut bridge = DecoderBridge::new(Arc::clone(dc), opener);

    // acknowledge the START command before the plugin runs, so the
    // initial-seek synthesis observes a clear command word
    bridge.command_finished();

    if let Err(err) = plugin.decode(&mut bridge) {
        if !err.is_stop() && bridge.error.is_none() {
            bridge.error = Some(err);
        }
    }

    let error = bridge.take_error();
    if let Some(err) = &error {
        error!("decoder failed: {err}");
    }

    dc.decoder_finished();
    error
}
