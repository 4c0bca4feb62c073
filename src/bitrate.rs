//! Bitrate reader
//!
//! Reads the average bitrate of the source's first stream and picks the
//! encoder bitrate from it.

use crate::config::{BitrateConfig, BitratePolicy};
use crate::error::{ConvertError, Result};
use crate::framework::MediaSource;

/// Stream whose descriptor carries the bitrate attribute
pub const BITRATE_STREAM_INDEX: usize = 0;

/// Convert bits/sec to kbps, rejecting anything that rounds to zero or below.
pub fn bits_to_kbps(bits_per_sec: i64) -> Result<u32> {
    let kbps = bits_per_sec / 1000;
    if kbps <= 0 {
        return Err(ConvertError::InvalidBitrate(kbps));
    }
    u32::try_from(kbps).map_err(|_| ConvertError::InvalidBitrate(kbps))
}

/// Source stream bitrate in kbps.
pub fn read_bitrate<S: MediaSource + ?Sized>(source: &S) -> Result<u32> {
    let bits_per_sec = source.stream_average_bitrate(BITRATE_STREAM_INDEX)?;
    bits_to_kbps(bits_per_sec)
}

/// Encoder bitrate in kbps for a source measured at `source_kbps`.
pub fn target_kbps(config: &BitrateConfig, source_kbps: u32) -> u32 {
    match config.policy {
        BitratePolicy::MatchSource => source_kbps,
        BitratePolicy::Fixed => config.fixed_kbps,
    }
}
