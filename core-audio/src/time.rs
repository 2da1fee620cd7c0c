//! # Song Time
//!
//! Millisecond-precision positions and spans within a song.
//!
//! Positions are always non-negative; "unknown" durations are expressed as
//! `Option<SongTime>` by callers.

use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

/// A non-negative position (or span) within a song, with millisecond
/// precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SongTime(Duration);

impl SongTime {
    /// The beginning of the song.
    pub const ZERO: SongTime = SongTime(Duration::ZERO);

    /// Create from whole milliseconds.
    pub fn from_ms(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }

    /// Create from fractional seconds. Negative input clamps to zero.
    pub fn from_s(seconds: f64) -> Self {
        if seconds <= 0.0 || !seconds.is_finite() {
            return Self::ZERO;
        }
        Self(Duration::from_secs_f64(seconds))
    }

    /// Position in whole milliseconds.
    pub fn to_ms(self) -> u64 {
        self.0.as_millis() as u64
    }

    /// Position in fractional seconds.
    pub fn to_s(self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Returns `true` if this position is past the beginning.
    pub fn is_positive(self) -> bool {
        !self.0.is_zero()
    }

    /// Convert to a frame index at the given sample rate.
    pub fn to_scale(self, sample_rate: u32) -> u64 {
        self.to_ms() * u64::from(sample_rate) / 1000
    }

    /// Subtract, clamping at zero.
    pub fn saturating_sub(self, other: SongTime) -> SongTime {
        Self(self.0.saturating_sub(other.0))
    }

    /// The underlying [`Duration`].
    pub fn as_duration(self) -> Duration {
        self.0
    }
}

impl From<Duration> for SongTime {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl Add for SongTime {
    type Output = SongTime;

    fn add(self, rhs: SongTime) -> SongTime {
        Self(self.0 + rhs.0)
    }
}

impl Sub for SongTime {
    type Output = SongTime;

    fn sub(self, rhs: SongTime) -> SongTime {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for SongTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.to_s())
    }
}
