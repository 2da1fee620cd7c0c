//! # ReplayGain
//!
//! Per-track and per-album loudness normalization values as carried in
//! audio file metadata, plus the scale computation applied by the decoder
//! bridge.

use serde::{Deserialize, Serialize};

/// Hard cap on the linear amplification factor, to keep a bogus gain value
/// in a tag from producing ear-splitting output.
const MAX_SCALE: f32 = 15.0;

/// Which ReplayGain tuple is applied during playback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayGainMode {
    /// Gain is not applied
    #[default]
    Off,
    /// Use the per-track tuple
    Track,
    /// Use the per-album tuple
    Album,
    /// Pick track or album depending on playback order
    Auto,
}

/// One gain/peak pair as found in a tag.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayGainTuple {
    /// Suggested gain adjustment in dB
    pub gain: f32,
    /// Peak sample amplitude of the material, 1.0 = full scale
    pub peak: f32,
}

impl ReplayGainTuple {
    pub fn new(gain: f32, peak: f32) -> Self {
        Self { gain, peak }
    }

    /// A tuple carrying no gain value.
    pub fn undefined() -> Self {
        Self::new(f32::NEG_INFINITY, 0.0)
    }

    /// Returns `true` if a gain value is present.
    pub fn is_defined(&self) -> bool {
        self.gain > -100.0 && self.gain.is_finite()
    }

    /// Compute the linear amplification factor.
    ///
    /// `preamp` and `missing_preamp` are linear factors (already converted
    /// from dB). With `limit` set, the factor is reduced so the known peak
    /// does not clip.
    pub fn calculate_scale(&self, preamp: f32, missing_preamp: f32, limit: bool) -> f32 {
        if !self.is_defined() {
            return missing_preamp;
        }

        let mut scale = 10f32.powf(self.gain / 20.0) * preamp;
        if scale > MAX_SCALE {
            scale = MAX_SCALE;
        }
        if limit && self.peak > 0.0 && scale * self.peak > 1.0 {
            scale = 1.0 / self.peak;
        }
        scale
    }
}

/// The full ReplayGain payload of one song.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayGainInfo {
    pub track: ReplayGainTuple,
    pub album: ReplayGainTuple,
}

impl ReplayGainInfo {
    /// Select the tuple for a (non-`Off`) playback mode. Anything that is
    /// not explicitly `Album` resolves to the track tuple.
    pub fn tuple_for(&self, mode: ReplayGainMode) -> &ReplayGainTuple {
        match mode {
            ReplayGainMode::Album => &self.album,
            _ => &self.track,
        }
    }

    /// Returns `true` if either tuple carries a gain.
    pub fn is_defined(&self) -> bool {
        self.track.is_defined() || self.album.is_defined()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_basic() {
        // -6.0206 dB is a factor of 0.5
        let tuple = ReplayGainTuple::new(-6.0206, 1.0);
        let scale = tuple.calculate_scale(1.0, 1.0, false);
        assert!((scale - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_scale_peak_limit() {
        // +6 dB on material peaking at 0.9 would clip; the limiter caps the
        // factor at 1/peak.
        let tuple = ReplayGainTuple::new(6.0, 0.9);
        let limited = tuple.calculate_scale(1.0, 1.0, true);
        assert!((limited - 1.0 / 0.9).abs() < 1e-5);

        let unlimited = tuple.calculate_scale(1.0, 1.0, false);
        assert!(unlimited > limited);
    }

    #[test]
    fn test_scale_missing_preamp() {
        let tuple = ReplayGainTuple::undefined();
        assert!(!tuple.is_defined());
        assert_eq!(tuple.calculate_scale(2.0, 0.7, true), 0.7);
    }

    #[test]
    fn test_scale_cap() {
        let tuple = ReplayGainTuple::new(40.0, 0.0);
        assert_eq!(tuple.calculate_scale(1.0, 1.0, false), 15.0);
    }

    #[test]
    fn test_tuple_selection() {
        let info = ReplayGainInfo {
            track: ReplayGainTuple::new(-1.0, 1.0),
            album: ReplayGainTuple::new(-2.0, 1.0),
        };
        assert_eq!(info.tuple_for(ReplayGainMode::Album).gain, -2.0);
        assert_eq!(info.tuple_for(ReplayGainMode::Track).gain, -1.0);
        // Auto resolves to track at this layer
        assert_eq!(info.tuple_for(ReplayGainMode::Auto).gain, -1.0);
    }

    #[test]
    fn test_mode_serde() {
        let mode: ReplayGainMode = serde_json::from_str("\"album\"").unwrap();
        assert_eq!(mode, ReplayGainMode::Album);
        assert_eq!(serde_json::to_string(&ReplayGainMode::Off).unwrap(), "\"off\"");
    }
}
