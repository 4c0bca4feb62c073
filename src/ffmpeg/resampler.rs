//! Audio resampler for the decode side
//!
//! Converts decoded frames of any sample format to planar `f32` with at most
//! two channels, at a rate the MP3 encoder accepts.

use crate::error::{FfmpegError, Result};
use crate::framework::PcmFormat;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

/// Sample format handed to the MP3 encoder
pub const PCM_SAMPLE_FORMAT: Sample = Sample::F32(ffmpeg::util::format::sample::Type::Planar);
/// Highest sample rate an MP3 stream can carry
pub const MAX_MP3_SAMPLE_RATE: u32 = 48_000;
/// Capacity of each frame handed to the resampler when flushing
const FLUSH_FRAME_SAMPLES: usize = 4096;

/// Output format for a decoded stream with the given rate and channel count.
pub fn target_format(sample_rate: u32, channels: u16) -> PcmFormat {
    PcmFormat {
        sample_rate: sample_rate.min(MAX_MP3_SAMPLE_RATE),
        channels: channels.clamp(1, 2),
    }
}

/// Channel layout for a target channel count (mono or stereo).
pub fn target_layout(channels: u16) -> ChannelLayout {
    if channels == 1 {
        ChannelLayout::MONO
    } else {
        ChannelLayout::STEREO
    }
}

/// Audio resampler wrapping FFmpeg's `SwrContext`
pub struct AudioResampler {
    context: resampling::Context,
    output: PcmFormat,
}

impl AudioResampler {
    /// Create a resampler converting frames shaped like `src_frame` to
    /// `output`.
    pub fn new(src_frame: &ffmpeg::util::frame::Audio, output: PcmFormat) -> Result<Self> {
        let src_layout = if src_frame.channel_layout().bits() == 0 {
            // No channel layout set; fall back based on channel count
            match src_frame.channels() {
                1 => ChannelLayout::MONO,
                _ => ChannelLayout::STEREO,
            }
        } else {
            src_frame.channel_layout()
        };

        let context = resampling::Context::get(
            src_frame.format(),
            src_layout,
            src_frame.rate(),
            PCM_SAMPLE_FORMAT,
            target_layout(output.channels),
            output.sample_rate,
        )
        .map_err(|e| {
            FfmpegError::ResamplerCreate(format!("Failed to create resampling context: {}", e))
        })?;

        Ok(Self { context, output })
    }

    /// Convert one decoded frame. Returns `None` when the resampler buffered
    /// everything and has no output yet.
    pub fn convert(
        &mut self,
        frame: &ffmpeg::util::frame::Audio,
    ) -> Result<Option<ffmpeg::util::frame::Audio>> {
        // Output frame must be empty so swr_convert_frame allocates it from
        // the SwrContext configuration.
        let mut out = ffmpeg::util::frame::Audio::empty();

        self.context
            .run(frame, &mut out)
            .map_err(|e| FfmpegError::DecodePacket(format!("Resampling error: {}", e)))?;

        if out.samples() == 0 {
            return Ok(None);
        }
        Ok(Some(out))
    }

    /// Drain samples still held by the resampler, one frame at a time.
    /// Returns `None` once nothing is left.
    ///
    /// The output frame is allocated up front with the target format and
    /// layout; `swr_convert_frame` rejects a bare frame when flushing.
    pub fn flush(&mut self) -> Result<Option<ffmpeg::util::frame::Audio>> {
        let mut out = ffmpeg::util::frame::Audio::new(
            PCM_SAMPLE_FORMAT,
            FLUSH_FRAME_SAMPLES,
            target_layout(self.output.channels),
        );
        out.set_rate(self.output.sample_rate);

        if let Err(e) = self.context.flush(&mut out) {
            // A pass-through context has nothing buffered
            tracing::debug!("Resampler flush returned non-fatal error: {}", e);
            return Ok(None);
        }

        if out.samples() == 0 {
            return Ok(None);
        }
        Ok(Some(out))
    }
}
