//! # Queue Serialization
//!
//! The line format for queue entries inside the state file:
//!
//! ```text
//! 0:song1.mp3
//! 1:song2.mp3
//! Prio: 1 10
//! ```
//!
//! One `<index>:<uri>` line per song, followed by a `Prio:` line when the
//! song carries a non-zero priority.

use crate::error::{Result, StateError};
use std::io::Write;

/// One song in the persisted queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueEntry {
    /// Source location of the song.
    pub uri: String,
    /// Play priority in random mode; 0 is normal.
    pub priority: u8,
}

impl QueueEntry {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

/// Write all queue entries in the state-file line format.
pub fn save_queue<W: Write>(writer: &mut W, entries: &[QueueEntry]) -> Result<()> {
    for (index, entry) in entries.iter().enumerate() {
        writeln!(writer, "{}:{}", index, entry.uri)?;
        if entry.priority != 0 {
            writeln!(writer, "Prio: {} {}", index, entry.priority)?;
        }
    }
    Ok(())
}

/// Apply one queue line to the entries restored so far.
pub fn load_queue_line(entries: &mut Vec<QueueEntry>, line: &str) -> Result<()> {
    if let Some(rest) = line.strip_prefix("Prio: ") {
        let mut parts = rest.splitn(2, ' ');
        let index: usize = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| StateError::Malformed(line.to_string()))?;
        let priority: u8 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| StateError::Malformed(line.to_string()))?;

        let entry = entries
            .get_mut(index)
            .ok_or_else(|| StateError::Malformed(line.to_string()))?;
        entry.priority = priority;
        return Ok(());
    }

    let (index, uri) = line
        .split_once(':')
        .ok_or_else(|| StateError::Malformed(line.to_string()))?;
    index
        .parse::<usize>()
        .map_err(|_| StateError::Malformed(line.to_string()))?;
    entries.push(QueueEntry::new(uri));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(entries: &[QueueEntry]) -> Vec<QueueEntry> {
        let mut buf = Vec::new();
        save_queue(&mut buf, entries).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let mut restored = Vec::new();
        for line in text.lines() {
            load_queue_line(&mut restored, line).unwrap();
        }
        restored
    }

    #[test]
    fn test_round_trip_plain() {
        let entries = vec![
            QueueEntry::new("music/a.flac"),
            QueueEntry::new("music/b.mp3"),
        ];
        assert_eq!(round_trip(&entries), entries);
    }

    #[test]
    fn test_round_trip_with_priorities() {
        let entries = vec![
            QueueEntry::new("a.ogg"),
            QueueEntry::new("b.ogg").with_priority(10),
            QueueEntry::new("c.ogg").with_priority(255),
        ];
        assert_eq!(round_trip(&entries), entries);
    }

    #[test]
    fn test_uri_may_contain_colons() {
        let entries = vec![QueueEntry::new("http://example.com:8000/stream")];
        assert_eq!(round_trip(&entries), entries);
    }

    #[test]
    fn test_malformed_lines_rejected() {
        let mut entries = Vec::new();
        assert!(load_queue_line(&mut entries, "no separator").is_err());
        assert!(load_queue_line(&mut entries, "Prio: 0 5").is_err()); // no such entry
        assert!(load_queue_line(&mut entries, "x:uri").is_err());
    }
}
