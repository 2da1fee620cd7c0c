//! # Decoder Control
//!
//! The state shared between the player thread and the decoder thread: the
//! command word, negotiated audio formats, seek positions, the chunk
//! allocator and pipe handles, one mutex and two condition variables.
//!
//! ## Command protocol
//!
//! The player writes `command` under the mutex and signals `cond`; the
//! decoder observes it (by polling or after a wakeup), acts, and
//! acknowledges through `command_finished`, which resets the word to
//! `None` and signals `client_cond`. Commands are never consumed by
//! reading — only the acknowledgment clears them, which is what allows the
//! bridge to synthesize the virtual initial-seek command.
//!
//! ## Waiting rules
//!
//! Only the decoder thread ever waits on `cond`; the player waits on
//! `client_cond`. Because `cond` has a single waiter it may be shared with
//! an input stream's mutex (see `InputStreamHandle`) without ever being
//! bound to two mutexes at once.

use crate::buffer::MusicBuffer;
use crate::error::DecoderError;
use crate::pipe::MusicPipe;
use crate::settings::PlaybackSettings;
use crate::song::Song;
use core_audio::{AudioFormat, MixRampInfo, SongTime};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::Arc;

// ============================================================================
// Commands and States
// ============================================================================

/// The command word written by the player and acknowledged by the decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecoderCommand {
    /// Nothing requested
    #[default]
    None,
    /// Begin decoding the configured song
    Start,
    /// Abandon decoding
    Stop,
    /// Reposition to `seek_time`
    Seek,
}

/// Lifecycle state of the decoder thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Created, plugin still initializing
    Start,
    /// Format negotiated, frames flowing
    Decode,
    /// Decoder returned
    Stop,
}

impl DecoderCommand {
    fn to_u8(self) -> u8 {
        match self {
            DecoderCommand::None => 0,
            DecoderCommand::Start => 1,
            DecoderCommand::Stop => 2,
            DecoderCommand::Seek => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => DecoderCommand::Start,
            2 => DecoderCommand::Stop,
            3 => DecoderCommand::Seek,
            _ => DecoderCommand::None,
        }
    }
}

impl DecoderState {
    fn to_u8(self) -> u8 {
        match self {
            DecoderState::Start => 0,
            DecoderState::Decode => 1,
            DecoderState::Stop => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => DecoderState::Decode,
            2 => DecoderState::Stop,
            _ => DecoderState::Start,
        }
    }
}

// ============================================================================
// Shared State
// ============================================================================

/// The mutex-protected protocol fields.
pub(crate) struct DecoderShared {
    pub(crate) command: DecoderCommand,
    pub(crate) state: DecoderState,
    pub(crate) seek_error: bool,
    pub(crate) seekable: bool,
    pub(crate) in_audio_format: Option<AudioFormat>,
    pub(crate) out_audio_format: Option<AudioFormat>,
    pub(crate) total_time: Option<SongTime>,
    pub(crate) seek_time: SongTime,
    pub(crate) replay_gain_db: f32,
    pub(crate) mix_ramp: MixRampInfo,
}

/// Shared coordination state of one decode run.
pub struct DecoderControl {
    shared: Mutex<DecoderShared>,

    /// Wakes the decoder thread (commands, returned chunks). The stream
    /// handles share this condvar so a STOP can interrupt a blocked read.
    cond: Arc<Condvar>,
    /// Wakes the player thread (ready, command acknowledged, chunk pushed).
    client_cond: Condvar,

    // Lock-free mirrors of `command`/`state`, written only under the mutex,
    // peeked by the decoder's read-cancellation predicate.
    command_cell: AtomicU8,
    state_cell: AtomicU8,

    song: Song,
    start_time: SongTime,
    end_time: Option<SongTime>,
    pipe: Arc<MusicPipe>,
    buffer: Arc<MusicBuffer>,
    settings: PlaybackSettings,

    /// Rotating non-zero serial for ReplayGain updates; 0 means "no gain".
    replay_gain_serial: AtomicU32,
}

impl DecoderControl {
    /// Set up a decode run for `song`. The control starts in state `Start`
    /// with an outstanding `Start` command, which the decoder thread
    /// acknowledges before running the plugin.
    pub fn new(
        song: Song,
        pipe: Arc<MusicPipe>,
        buffer: Arc<MusicBuffer>,
        settings: PlaybackSettings,
    ) -> Self {
        let start_time = song.start_time;
        let end_time = song.end_time;

        Self {
            shared: Mutex::new(DecoderShared {
                command: DecoderCommand::Start,
                state: DecoderState::Start,
                seek_error: false,
                seekable: false,
                in_audio_format: None,
                out_audio_format: None,
                total_time: None,
                seek_time: SongTime::ZERO,
                replay_gain_db: 0.0,
                mix_ramp: MixRampInfo::default(),
            }),
            cond: Arc::new(Condvar::new()),
            client_cond: Condvar::new(),
            command_cell: AtomicU8::new(DecoderCommand::Start.to_u8()),
            state_cell: AtomicU8::new(DecoderState::Start.to_u8()),
            song,
            start_time,
            end_time,
            pipe,
            buffer,
            settings,
            replay_gain_serial: AtomicU32::new(0),
        }
    }

    // ------------------------------------------------------------------
    // Locking primitives (crate-internal)
    // ------------------------------------------------------------------

    pub(crate) fn lock(&self) -> MutexGuard<'_, DecoderShared> {
        self.shared.lock()
    }

    pub(crate) fn cond_wait(&self, guard: &mut MutexGuard<'_, DecoderShared>) {
        self.cond.wait(guard);
    }

    pub(crate) fn shared_cond(&self) -> Arc<Condvar> {
        Arc::clone(&self.cond)
    }

    /// Wake the player. Takes the mutex briefly so the notification cannot
    /// slip into the window between the player's predicate check and its
    /// wait.
    pub(crate) fn notify_client(&self) {
        let _shared = self.lock();
        self.client_cond.notify_all();
    }

    pub(crate) fn set_command_with(&self, shared: &mut DecoderShared, command: DecoderCommand) {
        shared.command = command;
        self.command_cell.store(command.to_u8(), Ordering::Release);
    }

    pub(crate) fn set_state_with(&self, shared: &mut DecoderShared, state: DecoderState) {
        shared.state = state;
        self.state_cell.store(state.to_u8(), Ordering::Release);
    }

    // ------------------------------------------------------------------
    // Lock-free peeks
    // ------------------------------------------------------------------

    /// Read the command word without taking the mutex. Used from the
    /// read-cancellation predicate while the stream mutex is held.
    pub fn peek_command(&self) -> DecoderCommand {
        DecoderCommand::from_u8(self.command_cell.load(Ordering::Acquire))
    }

    /// Read the decoder state without taking the mutex.
    pub fn peek_state(&self) -> DecoderState {
        DecoderState::from_u8(self.state_cell.load(Ordering::Acquire))
    }

    // ------------------------------------------------------------------
    // Player-side operations
    // ------------------------------------------------------------------

    /// Post a command without waiting for the acknowledgment.
    pub fn send_command(&self, command: DecoderCommand) {
        let mut shared = self.lock();
        self.set_command_with(&mut shared, command);
        self.cond.notify_all();
    }

    /// Post a command and block until the decoder acknowledged it.
    pub fn send_command_wait(&self, command: DecoderCommand) {
        let mut shared = self.lock();
        self.set_command_with(&mut shared, command);
        self.cond.notify_all();
        while shared.command != DecoderCommand::None {
            self.client_cond.wait(&mut shared);
        }
    }

    /// Request a reposition and wait for the outcome.
    pub fn seek(&self, position: SongTime) -> Result<(), DecoderError> {
        let mut shared = self.lock();
        debug_assert_eq!(shared.state, DecoderState::Decode);

        shared.seek_error = false;
        shared.seek_time = position;
        self.set_command_with(&mut shared, DecoderCommand::Seek);
        self.cond.notify_all();
        while shared.command != DecoderCommand::None {
            self.client_cond.wait(&mut shared);
        }

        if shared.seek_error {
            Err(DecoderError::SeekFailed)
        } else {
            Ok(())
        }
    }

    /// Tell the decoder to abandon the song and wait until it acknowledged
    /// (or already finished).
    pub fn stop(&self) {
        let mut shared = self.lock();
        if shared.state == DecoderState::Stop {
            return;
        }
        self.set_command_with(&mut shared, DecoderCommand::Stop);
        self.cond.notify_all();
        while shared.command != DecoderCommand::None {
            self.client_cond.wait(&mut shared);
        }
    }

    /// Block until the decoder finished initialization (left state
    /// `Start`), either by becoming ready or by failing.
    pub fn wait_decoder_ready(&self) {
        let mut shared = self.lock();
        while shared.state == DecoderState::Start {
            self.client_cond.wait(&mut shared);
        }
    }

    /// Wake the decoder thread, e.g. after chunks were returned to the
    /// allocator. Takes the mutex briefly so the notification cannot slip
    /// into the window between the decoder's predicate check and its wait.
    pub fn signal(&self) {
        let _shared = self.lock();
        self.cond.notify_all();
    }

    /// Block the player until `wakeup` returns true. The predicate is
    /// evaluated under the control mutex and re-evaluated after every
    /// decoder signal (chunk pushed, command acknowledged, run finished);
    /// it must not call back into this control.
    pub fn wait_for_decoder(&self, mut wakeup: impl FnMut(DecoderState, DecoderCommand) -> bool) {
        let mut shared = self.lock();
        while !wakeup(shared.state, shared.command) {
            self.client_cond.wait(&mut shared);
        }
    }

    // ------------------------------------------------------------------
    // Decoder-side operations
    // ------------------------------------------------------------------

    /// Mark the decode run as finished. Called by the decoder thread after
    /// the plugin returned; releases a player blocked in any handshake.
    pub fn decoder_finished(&self) {
        let mut shared = self.lock();
        self.set_state_with(&mut shared, DecoderState::Stop);
        self.set_command_with(&mut shared, DecoderCommand::None);
        self.client_cond.notify_all();
    }

    /// Next ReplayGain serial: rotates and never lands on 0.
    pub(crate) fn next_replay_gain_serial(&self) -> u32 {
        loop {
            let current = self.replay_gain_serial.load(Ordering::Relaxed);
            let mut next = current.wrapping_add(1);
            if next == 0 {
                next = 1;
            }
            if self
                .replay_gain_serial
                .compare_exchange(current, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return next;
            }
        }
    }

    pub(crate) fn set_replay_gain_db(&self, db: f32) {
        self.lock().replay_gain_db = db;
    }

    /// Replace the mix-ramp descriptor of the current song.
    pub fn set_mix_ramp(&self, info: MixRampInfo) {
        self.lock().mix_ramp = info;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn command(&self) -> DecoderCommand {
        self.lock().command
    }

    pub fn state(&self) -> DecoderState {
        self.lock().state
    }

    pub fn seek_error(&self) -> bool {
        self.lock().seek_error
    }

    pub fn seekable(&self) -> bool {
        self.lock().seekable
    }

    pub fn in_audio_format(&self) -> Option<AudioFormat> {
        self.lock().in_audio_format
    }

    pub fn out_audio_format(&self) -> Option<AudioFormat> {
        self.lock().out_audio_format
    }

    pub fn total_time(&self) -> Option<SongTime> {
        self.lock().total_time
    }

    pub fn replay_gain_db(&self) -> f32 {
        self.lock().replay_gain_db
    }

    pub fn mix_ramp(&self) -> MixRampInfo {
        self.lock().mix_ramp.clone()
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn start_time(&self) -> SongTime {
        self.start_time
    }

    pub fn end_time(&self) -> Option<SongTime> {
        self.end_time
    }

    pub fn pipe(&self) -> &Arc<MusicPipe> {
        &self.pipe
    }

    pub fn buffer(&self) -> &Arc<MusicBuffer> {
        &self.buffer
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }
}
