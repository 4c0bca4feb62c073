//! MP3 encoder and file writer
//!
//! Wraps an FFmpeg `libmp3lame` codec context fed with planar `f32` frames,
//! and an `mp3` output context that carries the ID3v2 tags.

use std::path::{Path, PathBuf};

use crate::error::{FfmpegError, Result};
use crate::framework::{EncoderSettings, PcmBlock, PcmFormat, PcmWriter};
use crate::tags::TagData;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;

use super::helpers::{
    audio_plane_data_mut, encoder_codec_parameters, encoder_exists, fltp_plane_as_f32_mut,
};
use super::resampler::{target_layout, PCM_SAMPLE_FORMAT};

/// Name of the MP3 encoder in the FFmpeg codec registry
pub const MP3_ENCODER_NAME: &str = "libmp3lame";
/// MPEG-1 Layer III frame size (samples per channel per frame)
pub const MP3_FRAME_SIZE: usize = 1152;

/// MP3 encoder backed by a real FFmpeg codec context
pub struct Mp3Encoder {
    encoder: ffmpeg::encoder::Audio,
    frame_size: usize,
    output_timebase: ffmpeg::Rational,
}

impl Mp3Encoder {
    /// Open an MP3 encoder for `format` at `bitrate` bits/sec.
    pub fn open(format: PcmFormat, bitrate: usize) -> Result<Self> {
        let codec = codec::encoder::find_by_name(MP3_ENCODER_NAME)
            .or_else(|| codec::encoder::find(codec::Id::MP3))
            .ok_or_else(|| {
                FfmpegError::EncoderNotFound(format!(
                    "{} not found in this FFmpeg build",
                    MP3_ENCODER_NAME
                ))
            })?;

        // Build context and configure the audio encoder BEFORE opening
        let mut context = codec::Context::new_with_codec(codec);
        context.set_time_base(ffmpeg::Rational::new(1, format.sample_rate as i32));

        let mut audio_enc = context.encoder().audio().map_err(|e| {
            FfmpegError::EncoderConfigure(format!("Cannot get audio encoder handle: {}", e))
        })?;

        audio_enc.set_rate(format.sample_rate as i32);
        audio_enc.set_format(PCM_SAMPLE_FORMAT);
        audio_enc.set_channel_layout(target_layout(format.channels));
        audio_enc.set_bit_rate(bitrate);

        let encoder = audio_enc.open_as(codec).map_err(|e| {
            FfmpegError::EncoderConfigure(format!(
                "Failed to open MP3 encoder ({} Hz, {} ch, {} bps): {}",
                format.sample_rate, format.channels, bitrate, e
            ))
        })?;

        let frame_size = encoder.frame_size() as usize;

        Ok(Self {
            encoder,
            frame_size: if frame_size == 0 {
                MP3_FRAME_SIZE
            } else {
                frame_size
            },
            output_timebase: ffmpeg::Rational::new(1, format.sample_rate as i32),
        })
    }

    /// Send one PCM frame to the encoder.
    pub fn send_frame(&mut self, frame: &ffmpeg::util::frame::Audio) -> Result<()> {
        self.encoder.send_frame(frame).map_err(|e| {
            FfmpegError::EncodeFrame(format!("MP3 encoder send_frame error: {}", e)).into()
        })
    }

    /// Send EOF to flush the encoder's buffered output.
    pub fn send_eof(&mut self) -> Result<()> {
        self.encoder.send_eof().map_err(|e| {
            FfmpegError::EncodeFrame(format!("MP3 encoder send_eof error: {}", e)).into()
        })
    }

    /// Receive one encoded packet, or `None` if the encoder needs more input.
    pub fn receive_packet(&mut self) -> Result<Option<ffmpeg::codec::packet::Packet>> {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        match self.encoder.receive_packet(&mut packet) {
            Ok(()) => Ok(Some(packet)),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(FfmpegError::EncodeFrame(format!(
                "MP3 encoder receive_packet error: {}",
                e
            ))
            .into()),
        }
    }

    /// Samples per channel the encoder expects in every frame but the last.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// The output timebase (1 / sample_rate).
    pub fn output_timebase(&self) -> ffmpeg::Rational {
        self.output_timebase
    }

    /// Codec parameters for the encoded stream (for muxer stream setup).
    pub fn codec_parameters(&self) -> ffmpeg::codec::Parameters {
        encoder_codec_parameters(&self.encoder)
    }
}

/// Check whether the FFmpeg build includes an MP3 encoder.
pub fn is_mp3_encoder_available() -> bool {
    encoder_exists(MP3_ENCODER_NAME)
}

/// ID3 dictionary entries (FFmpeg generic keys) for a tag set. Absent
/// fields are left out entirely.
pub fn id3_entries(tags: &TagData) -> Vec<(&'static str, &str)> {
    [
        ("title", &tags.title),
        ("artist", &tags.artist),
        ("album", &tags.album),
        ("date", &tags.year),
        ("genre", &tags.genre),
        ("track", &tags.track),
        ("album_artist", &tags.album_artist),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
    .collect()
}

/// [`PcmWriter`] producing one MP3 file
pub struct FfmpegWriter {
    output: ffmpeg::format::context::Output,
    encoder: Mp3Encoder,
    format: PcmFormat,
    /// Per-channel samples not yet sent to the encoder
    buffered: Vec<Vec<f32>>,
    next_pts: i64,
    stream_timebase: ffmpeg::Rational,
    finished: bool,
    path: PathBuf,
}

impl FfmpegWriter {
    /// Create `path` (overwriting it) and write the container header with
    /// the tag set.
    pub fn create(path: &Path, settings: EncoderSettings) -> Result<Self> {
        let format = settings.format;
        let encoder = Mp3Encoder::open(format, settings.bitrate_kbps as usize * 1000)?;

        let mut output = ffmpeg::format::output_as(&path, "mp3").map_err(|e| {
            FfmpegError::MuxerCreate(format!("Failed to create {:?}: {}", path, e))
        })?;

        {
            let mut out_stream = output
                .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
                .map_err(|e| FfmpegError::MuxerCreate(format!("add_stream: {}", e)))?;
            out_stream.set_parameters(encoder.codec_parameters());
            out_stream.set_time_base(encoder.output_timebase());
        }

        let mut metadata = ffmpeg::Dictionary::new();
        for (key, value) in id3_entries(&settings.tags) {
            metadata.set(key, value);
        }
        output.set_metadata(metadata);

        output
            .write_header()
            .map_err(|e| FfmpegError::WriteHeader(format!("{:?}: {}", path, e)))?;

        // The muxer may pick its own stream timebase in write_header
        let stream_timebase = output
            .stream(0)
            .map(|s| s.time_base())
            .unwrap_or_else(|| encoder.output_timebase());

        tracing::debug!(
            path = %path.display(),
            sample_rate = format.sample_rate,
            channels = format.channels,
            bitrate_kbps = settings.bitrate_kbps,
            frame_size = encoder.frame_size(),
            "Opened MP3 writer"
        );

        Ok(Self {
            output,
            encoder,
            format,
            buffered: vec![Vec::new(); format.channels as usize],
            next_pts: 0,
            stream_timebase,
            finished: false,
            path: path.to_path_buf(),
        })
    }

    /// Encode `samples` buffered samples per channel as one frame.
    fn encode_buffered(&mut self, samples: usize) -> Result<()> {
        let channels = self.format.channels;
        let mut frame =
            ffmpeg::util::frame::Audio::new(PCM_SAMPLE_FORMAT, samples, target_layout(channels));
        frame.set_rate(self.format.sample_rate);
        frame.set_pts(Some(self.next_pts));

        for (ch, buffer) in self.buffered.iter_mut().enumerate() {
            let plane = audio_plane_data_mut(&mut frame, ch);
            let floats = fltp_plane_as_f32_mut(plane, samples).ok_or_else(|| {
                FfmpegError::EncodeFrame(format!(
                    "FLTP plane {} has bad alignment or length for {} samples",
                    ch, samples
                ))
            })?;
            floats.copy_from_slice(&buffer[..samples]);
            buffer.drain(..samples);
        }

        self.encoder.send_frame(&frame)?;
        self.next_pts += samples as i64;
        self.write_packets()
    }

    /// Drain every ready packet into the output file.
    fn write_packets(&mut self) -> Result<()> {
        while let Some(mut packet) = self.encoder.receive_packet()? {
            packet.set_stream(0);
            packet.rescale_ts(self.encoder.output_timebase(), self.stream_timebase);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| FfmpegError::WritePacket(format!("{:?}: {}", self.path, e)))?;
        }
        Ok(())
    }

    fn buffered_samples(&self) -> usize {
        self.buffered.first().map(Vec::len).unwrap_or(0)
    }
}

impl PcmWriter for FfmpegWriter {
    fn write_block(&mut self, block: &PcmBlock) -> Result<()> {
        if block.channels() != self.buffered.len() {
            return Err(FfmpegError::EncodeFrame(format!(
                "block has {} channels, encoder expects {}",
                block.channels(),
                self.buffered.len()
            ))
            .into());
        }

        for (buffer, plane) in self.buffered.iter_mut().zip(block.planes()) {
            buffer.extend_from_slice(plane);
        }

        let frame_size = self.encoder.frame_size();
        while self.buffered_samples() >= frame_size {
            self.encode_buffered(frame_size)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let remaining = self.buffered_samples();
        if remaining > 0 {
            self.encode_buffered(remaining)?;
        }
        self.encoder.send_eof()?;
        self.write_packets()?;

        self.output
            .write_trailer()
            .map_err(|e| FfmpegError::WriteTrailer(format!("{:?}: {}", self.path, e)))?;

        tracing::debug!(path = %self.path.display(), samples = self.next_pts, "Finished MP3 writer");
        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.finish() {
                tracing::warn!(path = %self.path.display(), "Finalizing MP3 writer on drop failed: {}", e);
            }
        }
    }
}
