//! # Core Audio Module
//!
//! Foundational audio types for the playback engine:
//!
//! - **Formats**: PCM layout descriptors and the output-format override mask
//! - **Time**: millisecond-precision song positions
//! - **Tags**: typed song metadata with source merging
//! - **ReplayGain / MixRamp**: loudness normalization and crossfade metadata
//! - **Conversion**: the PCM format/channel/rate conversion chain
//!
//! Everything in this crate is plain data plus pure computation; the
//! thread coordination around it lives in `core-playback`.

pub mod convert;
pub mod error;
pub mod format;
pub mod mixramp;
pub mod replay_gain;
pub mod tag;
pub mod time;

pub use convert::{ConvertError, PcmConvert};
pub use error::{AudioError, Result};
pub use format::{AudioFormat, AudioFormatSpec, SampleFormat};
pub use mixramp::MixRampInfo;
pub use replay_gain::{ReplayGainInfo, ReplayGainMode, ReplayGainTuple};
pub use tag::{Tag, TagItem, TagKind};
pub use time::SongTime;
