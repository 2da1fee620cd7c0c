//! # Playback Settings
//!
//! Engine configuration consumed by the decoder bridge: the output-format
//! policy and the ReplayGain parameters.

use core_audio::{AudioFormat, AudioFormatSpec, ReplayGainMode};
use serde::{Deserialize, Serialize};

/// Configuration of the decode/output path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Output-format override mask; unset fields follow the source.
    pub output_format: AudioFormatSpec,
    /// ReplayGain parameters.
    pub replay_gain: ReplayGainSettings,
}

impl PlaybackSettings {
    /// The output policy: pin configured fields, pass the rest through.
    pub fn output_audio_format(&self, source: AudioFormat) -> AudioFormat {
        self.output_format.apply_to(source)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.replay_gain.validate()
    }
}

/// ReplayGain parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayGainSettings {
    /// Which gain tuple is applied.
    pub mode: ReplayGainMode,
    /// Pre-amplification for tagged songs in dB, range [-15, 15].
    pub preamp_db: f32,
    /// Pre-amplification for untagged songs in dB, range [-15, 15].
    pub missing_preamp_db: f32,
    /// Reduce the gain so the known peak amplitude does not clip.
    pub limit: bool,
}

impl Default for ReplayGainSettings {
    fn default() -> Self {
        Self {
            mode: ReplayGainMode::Off,
            preamp_db: 0.0,
            missing_preamp_db: 0.0,
            limit: true,
        }
    }
}

impl ReplayGainSettings {
    /// Pre-amplification as a linear factor.
    pub fn preamp(&self) -> f32 {
        10f32.powf(self.preamp_db / 20.0)
    }

    /// Missing-tag pre-amplification as a linear factor.
    pub fn missing_preamp(&self) -> f32 {
        10f32.powf(self.missing_preamp_db / 20.0)
    }

    /// Validate the parameter ranges.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("preamp_db", self.preamp_db),
            ("missing_preamp_db", self.missing_preamp_db),
        ] {
            if !value.is_finite() || !(-15.0..=15.0).contains(&value) {
                return Err(format!(
                    "{} must be between -15 and 15 dB, got: {}",
                    name, value
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_audio::SampleFormat;

    #[test]
    fn test_default_output_policy_is_passthrough() {
        let settings = PlaybackSettings::default();
        let source = AudioFormat::cd_quality();
        assert_eq!(settings.output_audio_format(source), source);
    }

    #[test]
    fn test_output_policy_pins_fields() {
        let mut settings = PlaybackSettings::default();
        settings.output_format.sample_rate = Some(48_000);
        settings.output_format.format = Some(SampleFormat::F32);

        let out = settings.output_audio_format(AudioFormat::cd_quality());
        assert_eq!(out, AudioFormat::new(48_000, SampleFormat::F32, 2));
    }

    #[test]
    fn test_replay_gain_validation() {
        let mut settings = ReplayGainSettings::default();
        assert!(settings.validate().is_ok());

        settings.preamp_db = 20.0;
        assert!(settings.validate().is_err());

        settings.preamp_db = f32::NAN;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_preamp_linear() {
        let settings = ReplayGainSettings {
            preamp_db: 6.0206,
            ..Default::default()
        };
        assert!((settings.preamp() - 2.0).abs() < 1e-3);
        assert_eq!(ReplayGainSettings::default().preamp(), 1.0);
    }

    #[test]
    fn test_serde_defaults() {
        let settings: PlaybackSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.replay_gain.mode, ReplayGainMode::Off);
        assert!(settings.replay_gain.limit);
        assert!(settings.output_format.is_empty());

        let settings: PlaybackSettings =
            serde_json::from_str(r#"{"replay_gain": {"mode": "track", "preamp_db": 3.0}}"#)
                .unwrap();
        assert_eq!(settings.replay_gain.mode, ReplayGainMode::Track);
        assert_eq!(settings.replay_gain.preamp_db, 3.0);
    }
}
