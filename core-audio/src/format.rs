//! # Audio Format Types
//!
//! Describes raw PCM layouts flowing between the decoder bridge, the
//! conversion chain and the output pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Sample Format
// ============================================================================

/// Storage format of a single PCM sample.
///
/// `S24` is packed into 4 bytes with the low 24 bits significant
/// (sign-extended).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Unsigned 8-bit
    U8,
    /// Signed 16-bit little-endian
    S16,
    /// Signed 24-bit in a 32-bit little-endian container
    S24,
    /// Signed 32-bit little-endian
    S32,
    /// 32-bit float in the range [-1.0, 1.0]
    F32,
}

impl SampleFormat {
    /// Size of one sample in bytes.
    pub fn sample_size(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 | SampleFormat::S32 | SampleFormat::F32 => 4,
        }
    }

    /// Short lowercase name, as used in format strings.
    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S24 => "s24",
            SampleFormat::S32 => "s32",
            SampleFormat::F32 => "f32",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Audio Format
// ============================================================================

/// A fully specified PCM stream layout.
///
/// Rendered as `"44100:s16:2"` (rate, sample format, channels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz (e.g. 44100, 48000)
    pub sample_rate: u32,
    /// Storage format of one sample
    pub format: SampleFormat,
    /// Number of interleaved channels (1 = mono, 2 = stereo)
    pub channels: u8,
}

impl AudioFormat {
    /// Create a new format descriptor.
    pub fn new(sample_rate: u32, format: SampleFormat, channels: u8) -> Self {
        Self {
            sample_rate,
            format,
            channels,
        }
    }

    /// Standard CD quality (44.1 kHz, 16-bit stereo).
    pub fn cd_quality() -> Self {
        Self::new(44_100, SampleFormat::S16, 2)
    }

    /// Returns `true` if all fields carry a value.
    pub fn is_defined(&self) -> bool {
        self.sample_rate != 0 && self.channels != 0
    }

    /// Returns `true` if the format is one the engine can process.
    pub fn is_valid(&self) -> bool {
        (1..=768_000).contains(&self.sample_rate) && (1..=8).contains(&self.channels)
    }

    /// Size of one frame (one sample per channel) in bytes.
    pub fn frame_size(&self) -> usize {
        self.format.sample_size() * usize::from(self.channels)
    }

    /// Number of PCM bytes per second of audio.
    pub fn time_to_size(&self) -> f64 {
        f64::from(self.sample_rate) * self.frame_size() as f64
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.sample_rate, self.format, self.channels)
    }
}

// ============================================================================
// Format Override Mask
// ============================================================================

/// Per-field override mask used by the output-format policy.
///
/// Unset fields pass the source value through; set fields pin the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormatSpec {
    /// Pin the output sample rate
    #[serde(default)]
    pub sample_rate: Option<u32>,
    /// Pin the output sample format
    #[serde(default)]
    pub format: Option<SampleFormat>,
    /// Pin the output channel count
    #[serde(default)]
    pub channels: Option<u8>,
}

impl AudioFormatSpec {
    /// Apply the mask to a source format, yielding the output format.
    pub fn apply_to(&self, source: AudioFormat) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate.unwrap_or(source.sample_rate),
            format: self.format.unwrap_or(source.format),
            channels: self.channels.unwrap_or(source.channels),
        }
    }

    /// Returns `true` if no field is pinned.
    pub fn is_empty(&self) -> bool {
        self.sample_rate.is_none() && self.format.is_none() && self.channels.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size() {
        assert_eq!(AudioFormat::cd_quality().frame_size(), 4);
        assert_eq!(
            AudioFormat::new(48_000, SampleFormat::F32, 6).frame_size(),
            24
        );
        assert_eq!(AudioFormat::new(8_000, SampleFormat::U8, 1).frame_size(), 1);
    }

    #[test]
    fn test_time_to_size() {
        // 44100 frames/s * 4 bytes/frame
        let format = AudioFormat::cd_quality();
        assert_eq!(format.time_to_size(), 176_400.0);
    }

    #[test]
    fn test_validity() {
        assert!(AudioFormat::cd_quality().is_valid());
        assert!(!AudioFormat::new(0, SampleFormat::S16, 2).is_defined());
        assert!(!AudioFormat::new(44_100, SampleFormat::S16, 9).is_valid());
        assert!(!AudioFormat::new(1_000_000, SampleFormat::S16, 2).is_valid());
    }

    #[test]
    fn test_display() {
        assert_eq!(AudioFormat::cd_quality().to_string(), "44100:s16:2");
    }

    #[test]
    fn test_spec_apply() {
        let spec = AudioFormatSpec {
            sample_rate: Some(48_000),
            format: None,
            channels: None,
        };
        let out = spec.apply_to(AudioFormat::cd_quality());
        assert_eq!(out, AudioFormat::new(48_000, SampleFormat::S16, 2));

        assert!(AudioFormatSpec::default().is_empty());
        assert_eq!(
            AudioFormatSpec::default().apply_to(AudioFormat::cd_quality()),
            AudioFormat::cd_quality()
        );
    }
}
