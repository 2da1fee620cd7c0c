//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the playback engine:
//! - Logging and tracing bootstrap
//! - Shared runtime error type

pub mod error;
pub mod logging;

pub use error::{Error, Result};
