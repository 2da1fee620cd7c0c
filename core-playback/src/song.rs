//! # Song
//!
//! The track handed to the decoder: a source URI, the tag from the queue,
//! and an optional playback sub-range.

use core_audio::{SongTime, Tag};

/// One track as scheduled for decoding.
#[derive(Debug, Clone, Default)]
pub struct Song {
    /// Source location, resolved by the input stream opener.
    pub uri: String,
    /// Tag known from the queue before decoding starts.
    pub tag: Option<Tag>,
    /// Playback starts here (CUE-style sub-range).
    pub start_time: SongTime,
    /// Playback ends here; `None` plays to the end of the file.
    pub end_time: Option<SongTime>,
}

impl Song {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn with_range(mut self, start_time: SongTime, end_time: Option<SongTime>) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }
}
