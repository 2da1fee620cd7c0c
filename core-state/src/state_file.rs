//! # Playlist State File
//!
//! Saves and restores the playback state as a line-oriented ASCII section:
//!
//! ```text
//! state:
//! play
//! current: 3
//! time: 120
//! random: 0
//! repeat: 1
//! single: 0
//! consume: 0
//! crossfade: 0
//! mixrampdb: 0.000000
//! mixrampdelay: 0.000000
//! playlist_begin
//! 0:song1.mp3
//! 1:song2.mp3
//! playlist_end
//! ```
//!
//! The `state:` header is followed by the state value on the next line.
//! Unknown keys are ignored on restore; an out-of-range `current` is
//! clamped to 0.

use crate::error::Result;
use crate::queue::{load_queue_line, save_queue, QueueEntry};
use std::io::{BufRead, Write};
use tracing::warn;

const HEADER: &str = "state:";
const KEY_CURRENT: &str = "current: ";
const KEY_TIME: &str = "time: ";
const KEY_RANDOM: &str = "random: ";
const KEY_REPEAT: &str = "repeat: ";
const KEY_SINGLE: &str = "single: ";
const KEY_CONSUME: &str = "consume: ";
const KEY_CROSSFADE: &str = "crossfade: ";
const KEY_MIXRAMPDB: &str = "mixrampdb: ";
const KEY_MIXRAMPDELAY: &str = "mixrampdelay: ";
const PLAYLIST_BEGIN: &str = "playlist_begin";
const PLAYLIST_END: &str = "playlist_end";

/// Player activity at the time the state was saved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayerState {
    Play,
    Pause,
    #[default]
    Stop,
}

impl PlayerState {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerState::Play => "play",
            PlayerState::Pause => "pause",
            PlayerState::Stop => "stop",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "play" => Some(PlayerState::Play),
            "pause" => Some(PlayerState::Pause),
            "stop" => Some(PlayerState::Stop),
            _ => None,
        }
    }
}

/// Snapshot of the playback state persisted across restarts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistState {
    pub state: PlayerState,
    /// Queue position of the current song.
    pub current: Option<usize>,
    /// Elapsed playback time of the current song in whole seconds.
    pub elapsed_seconds: u64,
    pub random: bool,
    pub repeat: bool,
    pub single: bool,
    pub consume: bool,
    pub crossfade_seconds: u32,
    pub mixramp_db: f32,
    pub mixramp_delay: f32,
    pub queue: Vec<QueueEntry>,
}

impl PlaylistState {
    /// Write the state section.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "{}", HEADER)?;
        writeln!(writer, "{}", self.state.as_str())?;

        match self.state {
            PlayerState::Play | PlayerState::Pause => {
                if let Some(current) = self.current {
                    writeln!(writer, "{}{}", KEY_CURRENT, current)?;
                }
                writeln!(writer, "{}{}", KEY_TIME, self.elapsed_seconds)?;
            }
            PlayerState::Stop => {
                if let Some(current) = self.current {
                    writeln!(writer, "{}{}", KEY_CURRENT, current)?;
                }
            }
        }

        writeln!(writer, "{}{}", KEY_RANDOM, self.random as u8)?;
        writeln!(writer, "{}{}", KEY_REPEAT, self.repeat as u8)?;
        writeln!(writer, "{}{}", KEY_SINGLE, self.single as u8)?;
        writeln!(writer, "{}{}", KEY_CONSUME, self.consume as u8)?;
        writeln!(writer, "{}{}", KEY_CROSSFADE, self.crossfade_seconds)?;
        writeln!(writer, "{}{:.6}", KEY_MIXRAMPDB, self.mixramp_db)?;
        writeln!(writer, "{}{:.6}", KEY_MIXRAMPDELAY, self.mixramp_delay)?;

        writeln!(writer, "{}", PLAYLIST_BEGIN)?;
        save_queue(writer, &self.queue)?;
        writeln!(writer, "{}", PLAYLIST_END)?;
        Ok(())
    }

    /// Read the state section back.
    ///
    /// `first_line` is the line the caller already consumed while
    /// dispatching sections; `Ok(None)` means it is not the start of a
    /// state section. Reads the remaining lines to the end of the reader.
    pub fn restore<R: BufRead>(first_line: &str, reader: &mut R) -> Result<Option<Self>> {
        if first_line.trim_end() != HEADER {
            return Ok(None);
        }

        let mut state = PlaylistState::default();

        // the state value lives on the line after the header
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(Some(state));
        }
        state.state = PlayerState::parse(line.trim_end()).unwrap_or_default();

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim_end();

            if let Some(value) = line.strip_prefix(KEY_TIME) {
                state.elapsed_seconds = value.parse().unwrap_or(0);
            } else if let Some(value) = line.strip_prefix(KEY_RANDOM) {
                state.random = value == "1";
            } else if let Some(value) = line.strip_prefix(KEY_REPEAT) {
                state.repeat = value == "1";
            } else if let Some(value) = line.strip_prefix(KEY_SINGLE) {
                state.single = value == "1";
            } else if let Some(value) = line.strip_prefix(KEY_CONSUME) {
                state.consume = value == "1";
            } else if let Some(value) = line.strip_prefix(KEY_CROSSFADE) {
                state.crossfade_seconds = value.parse().unwrap_or(0);
            } else if let Some(value) = line.strip_prefix(KEY_MIXRAMPDB) {
                state.mixramp_db = value.parse().unwrap_or(0.0);
            } else if let Some(value) = line.strip_prefix(KEY_MIXRAMPDELAY) {
                state.mixramp_delay = value.parse().unwrap_or(0.0);
            } else if let Some(value) = line.strip_prefix(KEY_CURRENT) {
                // invalid positions are clamped to the first song
                state.current = Some(value.parse().unwrap_or(0));
            } else if line == PLAYLIST_BEGIN {
                load_playlist(reader, &mut state.queue)?;
            }
            // unknown keys are ignored
        }

        if let Some(current) = state.current {
            if !state.queue.is_empty() && current >= state.queue.len() {
                state.current = Some(0);
            }
        }

        Ok(Some(state))
    }

    /// Change-detection hash over everything the state file records.
    pub fn state_hash(&self) -> u32 {
        let current = self.current.map_or(0, |c| c as u32 + 1);
        let elapsed = if self.state != PlayerState::Stop {
            (self.elapsed_seconds as u32) << 8
        } else {
            0
        };

        (self.queue.len() as u32)
            ^ elapsed
            ^ (current << 16)
            ^ (self.crossfade_seconds << 20)
            ^ ((self.state as u32) << 24)
            ^ ((self.random as u32) << 27)
            ^ ((self.repeat as u32) << 28)
            ^ ((self.single as u32) << 29)
            ^ ((self.consume as u32) << 30)
    }
}

fn load_playlist<R: BufRead>(reader: &mut R, entries: &mut Vec<QueueEntry>) -> Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            warn!("'{}' not found in state file", PLAYLIST_END);
            return Ok(());
        }

        let line = line.trim_end();
        if line == PLAYLIST_END {
            return Ok(());
        }
        load_queue_line(entries, line)?;
    }
}
