//! FFmpeg backend for the media framework traits
//!
//! This module handles:
//! - FFmpeg initialization and log routing
//! - Source property queries (bitrate, WM attributes)
//! - WMA decoding to planar PCM
//! - MP3 encoding with ID3 tags

pub mod decoder;
pub mod encoder;
pub mod helpers;
pub mod resampler;
pub mod source;

use std::path::Path;
use std::sync::Once;

use crate::error::{FfmpegError, Result};
use crate::framework::{EncoderSettings, MediaFramework};
pub use ffmpeg_next as ffmpeg;

pub use decoder::FfmpegReader;
pub use encoder::FfmpegWriter;
pub use source::FfmpegSource;

static LOG_FILTER: Once = Once::new();

/// Initialize FFmpeg library
///
/// Safe to call more than once; the log callback is installed only on the
/// first call.
pub fn init() -> std::result::Result<(), FfmpegError> {
    ffmpeg::init()
        .map_err(|e| FfmpegError::InitFailed(format!("ffmpeg::init() failed: {}", e)))?;
    LOG_FILTER.call_once(install_log_filter);
    Ok(())
}

/// Route FFmpeg's own log output through `tracing`, dropping known-benign
/// messages.
///
/// Must run before any other thread uses FFmpeg; the log callback is global.
fn install_log_filter() {
    // SAFETY: both functions modify global FFmpeg state and are safe to call
    // after `ffmpeg::init()`.  `init` guards this with a `Once`.
    unsafe {
        ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_WARNING as i32);
        ffmpeg::ffi::av_log_set_callback(Some(ffmpeg_log_callback));
    }
}

/// Expected messages from the ASF demuxer and the MP3 muxer.
const SUPPRESSED_MESSAGES: &[&str] = &[
    "Estimating duration from bitrate, this may be inaccurate",
    "Could not update timestamps for skipped samples",
    "Could not update timestamps for discarded samples",
    "Queue input is backward in time",
];

unsafe extern "C" fn ffmpeg_log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: ffmpeg::ffi::va_list,
) {
    use std::ffi::CStr;

    if level > unsafe { ffmpeg::ffi::av_log_get_level() } {
        return;
    }

    let mut buf = [0 as std::ffi::c_char; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );

    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();
    let msg = msg.trim_end();
    if msg.is_empty() || SUPPRESSED_MESSAGES.iter().any(|s| msg.contains(s)) {
        return;
    }

    if level <= ffmpeg::ffi::AV_LOG_ERROR as std::ffi::c_int {
        tracing::error!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg::ffi::AV_LOG_WARNING as std::ffi::c_int {
        tracing::warn!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg::ffi::AV_LOG_INFO as std::ffi::c_int {
        tracing::info!(target: "ffmpeg", "{}", msg);
    } else {
        tracing::debug!(target: "ffmpeg", "{}", msg);
    }
}

/// Get the version information of the linked libavcodec.
pub fn version_info() -> String {
    // SAFETY: `avcodec_version` reads a compile-time constant.
    let v = unsafe { ffmpeg::ffi::avcodec_version() };
    format!("libavcodec {}.{}.{}", v >> 16, (v >> 8) & 0xff, v & 0xff)
}

/// The FFmpeg media framework. Hold one for the whole run; it owns library
/// startup and logs shutdown when dropped.
pub struct FfmpegFramework {
    _private: (),
}

impl FfmpegFramework {
    /// Initialize FFmpeg and check that a WMA decoder and an MP3 encoder are
    /// both present.
    pub fn startup() -> Result<Self> {
        init()?;

        if ffmpeg::codec::decoder::find(ffmpeg::codec::Id::WMAV2).is_none() {
            return Err(FfmpegError::InitFailed("no WMA decoder in this FFmpeg build".into()).into());
        }
        if !encoder::is_mp3_encoder_available() {
            return Err(FfmpegError::EncoderNotFound(format!(
                "{} not found in this FFmpeg build",
                encoder::MP3_ENCODER_NAME
            ))
            .into());
        }

        tracing::info!(version = %version_info(), "FFmpeg initialized");
        Ok(Self { _private: () })
    }
}

impl MediaFramework for FfmpegFramework {
    type Source = FfmpegSource;
    type Reader = FfmpegReader;
    type Writer = FfmpegWriter;

    fn open_source(&self, path: &Path) -> Result<FfmpegSource> {
        FfmpegSource::open(path)
    }

    fn open_reader(&self, path: &Path) -> Result<FfmpegReader> {
        FfmpegReader::open(path)
    }

    fn create_writer(&self, path: &Path, settings: EncoderSettings) -> Result<FfmpegWriter> {
        FfmpegWriter::create(path, settings)
    }
}

impl Drop for FfmpegFramework {
    fn drop(&mut self) {
        tracing::debug!("FFmpeg framework shut down");
    }
}
