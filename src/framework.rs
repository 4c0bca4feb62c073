//! Media framework seam
//!
//! The readers and the conversion driver are written against these traits.
//! [`crate::ffmpeg::FfmpegFramework`] is the production implementation; tests
//! substitute an in-memory framework that counts handle acquire/release.
//!
//! Every handle is an owned value. Dropping it releases the underlying
//! framework resource, so early returns through `?` never leak.

use std::path::Path;

use crate::error::Result;
use crate::tags::TagData;

/// A typed metadata property value.
///
/// `Absent` covers both a missing key and any framework type the reader
/// does not model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    UnsignedInteger(u32),
    Absent,
}

/// Named, typed key-value metadata lookup for one media file.
pub trait MetadataStore {
    /// Look up a property by its framework name (e.g. `WM/AlbumTitle`).
    fn property(&self, name: &str) -> PropertyValue;
}

/// An open, read-only media file used for property queries.
pub trait MediaSource {
    type Metadata: MetadataStore;

    /// Average bitrate of stream `index` in bits/sec. An unset attribute is
    /// reported as `0`.
    fn stream_average_bitrate(&self, index: usize) -> Result<i64>;

    /// Open the file's metadata store.
    fn metadata(&self) -> Result<Self::Metadata>;
}

/// Sample layout of decoded audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// One block of decoded planar `f32` audio, one plane per channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PcmBlock {
    planes: Vec<Vec<f32>>,
}

impl PcmBlock {
    /// Build a block from per-channel planes.
    ///
    /// Planes are truncated to the shortest one so every channel carries the
    /// same number of samples.
    pub fn new(mut planes: Vec<Vec<f32>>) -> Self {
        let samples = planes.iter().map(Vec::len).min().unwrap_or(0);
        for plane in &mut planes {
            plane.truncate(samples);
        }
        Self { planes }
    }

    /// Samples per channel.
    pub fn samples(&self) -> usize {
        self.planes.first().map(Vec::len).unwrap_or(0)
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples() == 0
    }

    pub fn planes(&self) -> &[Vec<f32>] {
        &self.planes
    }
}

/// Streaming decoder producing PCM blocks until the source is exhausted.
pub trait PcmReader {
    /// Format of every block this reader yields.
    fn format(&self) -> PcmFormat;

    /// Next decoded block, or `None` once the source is exhausted.
    fn read_block(&mut self) -> Result<Option<PcmBlock>>;
}

/// Streaming encoder writing one destination file.
pub trait PcmWriter {
    fn write_block(&mut self, block: &PcmBlock) -> Result<()>;

    /// Flush buffered audio and write trailing frames and tag blocks.
    ///
    /// Calling `finish` more than once is a no-op after the first call.
    fn finish(&mut self) -> Result<()>;
}

/// Everything the encoder needs to open a destination file.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub format: PcmFormat,
    pub bitrate_kbps: u32,
    pub tags: TagData,
}

/// Process-scoped media framework capability.
pub trait MediaFramework {
    type Source: MediaSource;
    type Reader: PcmReader;
    type Writer: PcmWriter;

    /// Open `path` read-only for bitrate and metadata queries.
    fn open_source(&self, path: &Path) -> Result<Self::Source>;

    /// Open `path` for streaming decode.
    fn open_reader(&self, path: &Path) -> Result<Self::Reader>;

    /// Create (or overwrite) `path` as an encoded destination file.
    fn create_writer(&self, path: &Path, settings: EncoderSettings) -> Result<Self::Writer>;
}
