//! Conversion driver
//!
//! Converts one source file into one destination file:
//! 1. probe bitrate and tags (handles dropped before decoding starts)
//! 2. open the streaming decoder
//! 3. open the encoder with the decoded format, bitrate and tags
//! 4. copy every decoded block into the encoder
//! 5. finish the encoder, even when the copy failed

use std::path::Path;

use crate::bitrate::{read_bitrate, target_kbps};
use crate::config::BitrateConfig;
use crate::error::Result;
use crate::framework::{EncoderSettings, MediaFramework, MediaSource, PcmReader, PcmWriter};
use crate::tags::{read_tags, TagData};

/// Summary of one finished conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    /// Source stream bitrate in kbps
    pub source_kbps: u32,
    /// Bitrate the encoder was opened with, in kbps
    pub bitrate_kbps: u32,
    pub tags: TagData,
    /// Number of decoded blocks copied into the encoder
    pub blocks: u64,
    /// Samples per channel copied into the encoder
    pub samples: u64,
}

/// Read the source bitrate (kbps) and tag set.
///
/// Every framework handle opened here is dropped before returning.
pub fn probe_source<F: MediaFramework>(framework: &F, path: &Path) -> Result<(u32, TagData)> {
    let source = framework.open_source(path)?;
    let source_kbps = read_bitrate(&source)?;
    let metadata = source.metadata()?;
    let tags = read_tags(&metadata);
    Ok((source_kbps, tags))
}

/// Convert `source_path` into `dest_path`, overwriting any existing file.
pub fn convert_file<F: MediaFramework>(
    framework: &F,
    bitrate: &BitrateConfig,
    source_path: &Path,
    dest_path: &Path,
) -> Result<ConversionReport> {
    let (source_kbps, tags) = probe_source(framework, source_path)?;
    let bitrate_kbps = target_kbps(bitrate, source_kbps);

    tracing::info!(
        source = %source_path.display(),
        title = tags.title.as_deref().unwrap_or(""),
        artist = tags.artist.as_deref().unwrap_or(""),
        album = tags.album.as_deref().unwrap_or(""),
        year = tags.year.as_deref().unwrap_or(""),
        genre = tags.genre.as_deref().unwrap_or(""),
        track = tags.track.as_deref().unwrap_or(""),
        album_artist = tags.album_artist.as_deref().unwrap_or(""),
        source_kbps,
        bitrate_kbps,
        "Converting"
    );

    let mut reader = framework.open_reader(source_path)?;
    let settings = EncoderSettings {
        format: reader.format(),
        bitrate_kbps,
        tags: tags.clone(),
    };
    let mut writer = framework.create_writer(dest_path, settings)?;

    let copied = copy_blocks(&mut reader, &mut writer);
    let finished = writer.finish();

    match (copied, finished) {
        (Ok((blocks, samples)), Ok(())) => Ok(ConversionReport {
            source_kbps,
            bitrate_kbps,
            tags,
            blocks,
            samples,
        }),
        (Err(e), finished) => {
            if let Err(finish_err) = finished {
                tracing::warn!(
                    dest = %dest_path.display(),
                    "Encoder finalization also failed: {}",
                    finish_err
                );
            }
            report_incomplete(dest_path, &e);
            Err(e)
        }
        (Ok(_), Err(e)) => {
            report_incomplete(dest_path, &e);
            Err(e)
        }
    }
}

/// Copy every block from `reader` into `writer`; returns (blocks, samples).
fn copy_blocks<R: PcmReader, W: PcmWriter>(reader: &mut R, writer: &mut W) -> Result<(u64, u64)> {
    let mut blocks = 0u64;
    let mut samples = 0u64;
    while let Some(block) = reader.read_block()? {
        if block.is_empty() {
            continue;
        }
        writer.write_block(&block)?;
        blocks += 1;
        samples += block.samples() as u64;
    }
    Ok((blocks, samples))
}

fn report_incomplete(dest_path: &Path, err: &crate::error::ConvertError) {
    tracing::error!(
        dest = %dest_path.display(),
        "Conversion failed, destination file may be incomplete: {}",
        err
    );
}
