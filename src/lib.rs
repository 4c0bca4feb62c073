//! WMA to MP3 tree converter
//!
//! Walks a source directory, decodes every Windows Media Audio file with
//! FFmpeg and writes an MP3 at the mirrored path in the destination tree,
//! keeping the source bitrate and the common WM tags.

pub mod bitrate;
pub mod config;
pub mod convert;
pub mod error;
pub mod ffmpeg;
pub mod framework;
pub mod tags;
pub mod walker;

#[cfg(test)]
mod testing;

pub use config::ConverterConfig;
pub use error::{ConvertError, Result};
pub use walker::{WalkSummary, Walker};
