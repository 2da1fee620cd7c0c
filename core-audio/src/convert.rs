//! # PCM Conversion Chain
//!
//! Converts interleaved PCM between two [`AudioFormat`]s. Everything is
//! normalized through interleaved f32 in the range [-1.0, 1.0], then
//! remixed, resampled and re-encoded:
//!
//! ```text
//! source bytes → f32 frames → channel remix → linear resample → target bytes
//! ```
//!
//! Resampling interpolates linearly within one submitted block; decoder
//! plugins hand over blocks large enough that the block-edge error is
//! inaudible.

use crate::format::{AudioFormat, SampleFormat};
use thiserror::Error;
use tracing::debug;

/// Errors of the conversion chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// The source format cannot be processed.
    #[error("invalid conversion source format: {0}")]
    InvalidSource(AudioFormat),

    /// The target format cannot be produced.
    #[error("invalid conversion target format: {0}")]
    InvalidTarget(AudioFormat),

    /// The input buffer is not a whole number of source frames.
    #[error("buffer length {length} is not a multiple of the {frame_size}-byte frame")]
    Misaligned { length: usize, frame_size: usize },
}

/// An open conversion chain between two PCM formats.
pub struct PcmConvert {
    in_format: AudioFormat,
    out_format: AudioFormat,
}

impl PcmConvert {
    /// Open a chain converting `in_format` to `out_format`.
    pub fn open(in_format: AudioFormat, out_format: AudioFormat) -> Result<Self, ConvertError> {
        if !in_format.is_valid() {
            return Err(ConvertError::InvalidSource(in_format));
        }
        if !out_format.is_valid() {
            return Err(ConvertError::InvalidTarget(out_format));
        }

        debug!(%in_format, %out_format, "opening pcm conversion chain");
        Ok(Self {
            in_format,
            out_format,
        })
    }

    pub fn in_format(&self) -> AudioFormat {
        self.in_format
    }

    pub fn out_format(&self) -> AudioFormat {
        self.out_format
    }

    /// Convert one block of source PCM to the target format.
    ///
    /// The input must be a whole number of source frames.
    pub fn convert(&mut self, src: &[u8]) -> Result<Vec<u8>, ConvertError> {
        let frame_size = self.in_format.frame_size();
        if src.len() % frame_size != 0 {
            return Err(ConvertError::Misaligned {
                length: src.len(),
                frame_size,
            });
        }

        let samples = decode_to_f32(self.in_format.format, src);
        let samples = remix_channels(samples, self.in_format.channels, self.out_format.channels);
        let samples = resample_linear(
            samples,
            self.out_format.channels,
            self.in_format.sample_rate,
            self.out_format.sample_rate,
        );

        let mut out = Vec::with_capacity(samples.len() * self.out_format.format.sample_size());
        encode_from_f32(self.out_format.format, &samples, &mut out);
        Ok(out)
    }
}

// ============================================================================
// Sample format stages
// ============================================================================

fn decode_to_f32(format: SampleFormat, src: &[u8]) -> Vec<f32> {
    match format {
        SampleFormat::U8 => src.iter().map(|&b| (f32::from(b) - 128.0) / 128.0).collect(),
        SampleFormat::S16 => src
            .chunks_exact(2)
            .map(|c| f32::from(i16::from_le_bytes([c[0], c[1]])) / 32_768.0)
            .collect(),
        SampleFormat::S24 => src
            .chunks_exact(4)
            .map(|c| {
                let v = i32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                v as f32 / 8_388_608.0
            })
            .collect(),
        SampleFormat::S32 => src
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32 / 2_147_483_648.0)
            .collect(),
        SampleFormat::F32 => src
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

fn encode_from_f32(format: SampleFormat, samples: &[f32], out: &mut Vec<u8>) {
    for &sample in samples {
        let s = sample.clamp(-1.0, 1.0);
        match format {
            SampleFormat::U8 => out.push((s * 127.0 + 128.0) as u8),
            SampleFormat::S16 => {
                out.extend_from_slice(&((s * 32_767.0).round() as i16).to_le_bytes())
            }
            SampleFormat::S24 => {
                out.extend_from_slice(&((s * 8_388_607.0).round() as i32).to_le_bytes())
            }
            SampleFormat::S32 => {
                out.extend_from_slice(&((f64::from(s) * 2_147_483_647.0).round() as i32).to_le_bytes())
            }
            SampleFormat::F32 => out.extend_from_slice(&s.to_le_bytes()),
        }
    }
}

// ============================================================================
// Channel stage
// ============================================================================

fn remix_channels(samples: Vec<f32>, in_channels: u8, out_channels: u8) -> Vec<f32> {
    if in_channels == out_channels {
        return samples;
    }

    let in_ch = usize::from(in_channels);
    let out_ch = usize::from(out_channels);
    let frames = samples.len() / in_ch;
    let mut out = Vec::with_capacity(frames * out_ch);

    for frame in samples.chunks_exact(in_ch) {
        match (in_ch, out_ch) {
            (1, _) => {
                // mono fan-out
                out.extend(std::iter::repeat(frame[0]).take(out_ch));
            }
            (_, 1) => {
                // full downmix
                out.push(frame.iter().sum::<f32>() / in_ch as f32);
            }
            (_, 2) => {
                // keep the front pair
                out.push(frame[0]);
                out.push(frame[1]);
            }
            _ => {
                // generic: collapse to mono, then fan out
                let mono = frame.iter().sum::<f32>() / in_ch as f32;
                out.extend(std::iter::repeat(mono).take(out_ch));
            }
        }
    }

    out
}

// ============================================================================
// Rate stage
// ============================================================================

fn resample_linear(samples: Vec<f32>, channels: u8, in_rate: u32, out_rate: u32) -> Vec<f32> {
    if in_rate == out_rate {
        return samples;
    }

    let ch = usize::from(channels);
    let in_frames = samples.len() / ch;
    if in_frames == 0 {
        return Vec::new();
    }

    let out_frames = (in_frames as u64 * u64::from(out_rate) / u64::from(in_rate)) as usize;
    let step = f64::from(in_rate) / f64::from(out_rate);
    let mut out = Vec::with_capacity(out_frames * ch);

    for i in 0..out_frames {
        let pos = i as f64 * step;
        let i0 = pos as usize;
        let i1 = (i0 + 1).min(in_frames - 1);
        let frac = (pos - i0 as f64) as f32;

        for c in 0..ch {
            let a = samples[i0 * ch + c];
            let b = samples[i1 * ch + c];
            out.push(a + (b - a) * frac);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_invalid() {
        let bad = AudioFormat::new(0, SampleFormat::S16, 2);
        let good = AudioFormat::cd_quality();
        assert!(matches!(
            PcmConvert::open(bad, good),
            Err(ConvertError::InvalidSource(_))
        ));
        assert!(matches!(
            PcmConvert::open(good, bad),
            Err(ConvertError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_misaligned_input() {
        let format = AudioFormat::cd_quality();
        let mut convert =
            PcmConvert::open(format, AudioFormat::new(44_100, SampleFormat::F32, 2)).unwrap();
        let err = convert.convert(&[0u8; 6]).unwrap_err();
        assert!(matches!(err, ConvertError::Misaligned { frame_size: 4, .. }));
    }

    #[test]
    fn test_s16_to_f32() {
        let in_format = AudioFormat::new(44_100, SampleFormat::S16, 1);
        let out_format = AudioFormat::new(44_100, SampleFormat::F32, 1);
        let mut convert = PcmConvert::open(in_format, out_format).unwrap();

        let src: Vec<u8> = [0i16, 16_384, -16_384, 32_767]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let out = convert.convert(&src).unwrap();
        let samples: Vec<f32> = out
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - 0.5).abs() < 1e-4);
        assert!((samples[2] + 0.5).abs() < 1e-4);
        assert!(samples[3] <= 1.0 && samples[3] > 0.99);
    }

    #[test]
    fn test_mono_to_stereo() {
        let in_format = AudioFormat::new(44_100, SampleFormat::S16, 1);
        let out_format = AudioFormat::new(44_100, SampleFormat::S16, 2);
        let mut convert = PcmConvert::open(in_format, out_format).unwrap();

        let src: Vec<u8> = [100i16, -200].iter().flat_map(|s| s.to_le_bytes()).collect();
        let out = convert.convert(&src).unwrap();

        // 2 mono frames become 2 stereo frames
        assert_eq!(out.len(), 8);
        let samples: Vec<i16> = out
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(samples[0], samples[1]);
        assert_eq!(samples[2], samples[3]);
    }

    #[test]
    fn test_rate_halving_size() {
        let in_format = AudioFormat::new(48_000, SampleFormat::S16, 2);
        let out_format = AudioFormat::new(24_000, SampleFormat::S16, 2);
        let mut convert = PcmConvert::open(in_format, out_format).unwrap();

        let src = vec![0u8; 400 * in_format.frame_size()];
        let out = convert.convert(&src).unwrap();
        assert_eq!(out.len(), 200 * out_format.frame_size());
    }

    #[test]
    fn test_identity_passthrough() {
        let format = AudioFormat::cd_quality();
        let mut convert = PcmConvert::open(format, format).unwrap();

        let src: Vec<u8> = (0..16).collect();
        // s16 pass-through re-quantizes but keeps the byte count
        let out = convert.convert(&src).unwrap();
        assert_eq!(out.len(), src.len());
    }
}
