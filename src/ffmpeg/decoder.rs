//! Streaming audio decoder
//!
//! Reads packets of the best audio stream, decodes them to PCM and hands out
//! planar `f32` blocks through [`PcmReader`].

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, FfmpegError, Result};
use crate::framework::{PcmBlock, PcmFormat, PcmReader};
use ffmpeg_next as ffmpeg;

use super::helpers::{audio_plane_data, fltp_plane_as_f32};
use super::resampler::{target_format, AudioResampler};

/// Audio decoder backed by an FFmpeg codec context
pub struct AudioDecoder {
    decoder: ffmpeg::decoder::Audio,
    stream_index: usize,
}

impl AudioDecoder {
    /// Open a decoder for the given stream from its own codec parameters.
    pub fn open(stream: &ffmpeg::format::stream::Stream) -> Result<Self> {
        let stream_index = stream.index();
        let context =
            ffmpeg::codec::Context::from_parameters(stream.parameters()).map_err(|e| {
                FfmpegError::DecoderCreate(format!(
                    "Failed to create codec context for stream {}: {}",
                    stream_index, e
                ))
            })?;

        let decoder = context.decoder().audio().map_err(|e| {
            FfmpegError::DecoderCreate(format!(
                "Failed to open audio decoder for stream {}: {}",
                stream_index, e
            ))
        })?;

        Ok(Self {
            decoder,
            stream_index,
        })
    }

    /// Send a compressed packet to the decoder.
    ///
    /// `AVERROR_INVALIDDATA` skips the packet with a debug log.
    pub fn send_packet(&mut self, packet: &ffmpeg::codec::packet::Packet) -> Result<()> {
        match self.decoder.send_packet(packet) {
            Ok(()) => Ok(()),
            Err(ffmpeg::Error::InvalidData) => {
                tracing::debug!(
                    stream_index = self.stream_index,
                    "send_packet: skipping invalid packet"
                );
                Ok(())
            }
            Err(e) => Err(FfmpegError::DecodePacket(format!(
                "send_packet error on stream {}: {}",
                self.stream_index, e
            ))
            .into()),
        }
    }

    /// Send EOF to flush the decoder's internal buffers.
    pub fn send_eof(&mut self) -> Result<()> {
        match self.decoder.send_eof() {
            Ok(()) => Ok(()),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(()),
            Err(ffmpeg::Error::Eof) => Ok(()),
            Err(e) => Err(FfmpegError::DecodePacket(format!(
                "send_eof error on stream {}: {}",
                self.stream_index, e
            ))
            .into()),
        }
    }

    /// Receive one decoded frame, or `None` if the decoder needs more input.
    pub fn receive_frame(&mut self) -> Result<Option<ffmpeg::util::frame::Audio>> {
        let mut frame = ffmpeg::util::frame::Audio::empty();
        match self.decoder.receive_frame(&mut frame) {
            Ok(()) => Ok(Some(frame)),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(FfmpegError::DecodePacket(format!(
                "receive_frame error on stream {}: {}",
                self.stream_index, e
            ))
            .into()),
        }
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn sample_rate(&self) -> u32 {
        self.decoder.rate()
    }

    pub fn channels(&self) -> u16 {
        self.decoder.channels()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Reading,
    Draining,
    Done,
}

/// [`PcmReader`] over one input file
pub struct FfmpegReader {
    input: ffmpeg::format::context::Input,
    decoder: AudioDecoder,
    resampler: Option<AudioResampler>,
    format: PcmFormat,
    pending: VecDeque<PcmBlock>,
    state: ReaderState,
    path: PathBuf,
}

impl FfmpegReader {
    pub fn open(path: &Path) -> Result<Self> {
        let input = ffmpeg::format::input(&path)
            .map_err(|e| FfmpegError::OpenInput(format!("Failed to open {:?}: {}", path, e)))?;

        let decoder = {
            let stream = input
                .streams()
                .best(ffmpeg::media::Type::Audio)
                .ok_or_else(|| ConvertError::NoAudioStream(path.to_path_buf()))?;
            AudioDecoder::open(&stream)?
        };
        let format = target_format(decoder.sample_rate(), decoder.channels());

        tracing::debug!(
            path = %path.display(),
            stream_index = decoder.stream_index(),
            source_rate = decoder.sample_rate(),
            source_channels = decoder.channels(),
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Opened decoder"
        );

        Ok(Self {
            input,
            decoder,
            resampler: None,
            format,
            pending: VecDeque::new(),
            state: ReaderState::Reading,
            path: path.to_path_buf(),
        })
    }

    /// Pull every frame the decoder has ready and queue it as PCM blocks.
    fn drain_decoder(&mut self) -> Result<()> {
        while let Some(frame) = self.decoder.receive_frame()? {
            let resampler = match self.resampler {
                Some(ref mut r) => r,
                None => {
                    tracing::debug!(
                        sample_rate = frame.rate(),
                        channels = frame.channels(),
                        format = ?frame.format(),
                        "Creating resampler from first frame"
                    );
                    self.resampler.insert(AudioResampler::new(&frame, self.format)?)
                }
            };
            if let Some(out) = resampler.convert(&frame)? {
                self.pending.push_back(frame_to_block(&out)?);
            }
        }
        Ok(())
    }

    /// Read packets until at least one block is queued or input ends.
    fn fill(&mut self) -> Result<()> {
        while self.pending.is_empty() && self.state != ReaderState::Done {
            match self.state {
                ReaderState::Reading => {
                    let mut packet = ffmpeg::Packet::empty();
                    match packet.read(&mut self.input) {
                        Ok(()) => {
                            if packet.stream() != self.decoder.stream_index() {
                                continue;
                            }
                            self.decoder.send_packet(&packet)?;
                            self.drain_decoder()?;
                        }
                        Err(ffmpeg::Error::Eof) => self.state = ReaderState::Draining,
                        Err(e) => {
                            return Err(FfmpegError::ReadFrame(format!(
                                "Failed to read packet from {:?}: {}",
                                self.path, e
                            ))
                            .into())
                        }
                    }
                }
                ReaderState::Draining => {
                    self.decoder.send_eof()?;
                    self.drain_decoder()?;
                    if let Some(resampler) = self.resampler.as_mut() {
                        while let Some(out) = resampler.flush()? {
                            self.pending.push_back(frame_to_block(&out)?);
                        }
                    }
                    self.state = ReaderState::Done;
                }
                ReaderState::Done => {}
            }
        }
        Ok(())
    }
}

impl PcmReader for FfmpegReader {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn read_block(&mut self) -> Result<Option<PcmBlock>> {
        self.fill()?;
        Ok(self.pending.pop_front())
    }
}

/// Copy an FLTP frame into a [`PcmBlock`].
fn frame_to_block(frame: &ffmpeg::util::frame::Audio) -> Result<PcmBlock> {
    let samples = frame.samples();
    let channels = frame.channels() as usize;
    let mut planes = Vec::with_capacity(channels);
    for ch in 0..channels {
        let data = audio_plane_data(frame, ch);
        let floats = fltp_plane_as_f32(data, samples).ok_or_else(|| {
            FfmpegError::DecodePacket(format!(
                "FLTP plane {} has bad alignment or length: format={:?}, samples={}, bytes={}",
                ch,
                frame.format(),
                samples,
                data.len()
            ))
        })?;
        planes.push(floats.to_vec());
    }
    Ok(PcmBlock::new(planes))
}
