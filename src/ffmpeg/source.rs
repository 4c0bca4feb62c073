//! Property queries over an FFmpeg input context
//!
//! FFmpeg's ASF demuxer renames most `WM/*` attributes to generic keys and
//! exposes every value as a string. [`FfmpegMetadata`] maps the WM property
//! names back to those keys and restores the attribute types.

use std::path::Path;

use crate::error::{ConvertError, FfmpegError, Result};
use crate::framework::{MediaSource, MetadataStore, PropertyValue};
use crate::tags::property;
use ffmpeg_next as ffmpeg;

use super::helpers::codec_params_bit_rate;

/// Storage type of an ASF attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeType {
    Unicode,
    Dword,
}

/// How one WM property is found in FFmpeg's container metadata
struct PropertyMapping {
    name: &'static str,
    /// Dictionary keys to try, in order
    keys: &'static [&'static str],
    attribute_type: AttributeType,
}

const PROPERTY_MAPPINGS: &[PropertyMapping] = &[
    PropertyMapping {
        name: property::TITLE,
        keys: &["title"],
        attribute_type: AttributeType::Unicode,
    },
    PropertyMapping {
        name: property::AUTHOR,
        keys: &["artist", "Author"],
        attribute_type: AttributeType::Unicode,
    },
    PropertyMapping {
        name: property::ALBUM_TITLE,
        keys: &["album", "WM/AlbumTitle"],
        attribute_type: AttributeType::Unicode,
    },
    // The demuxer leaves WM/Year under its own name
    PropertyMapping {
        name: property::YEAR,
        keys: &["WM/Year", "date"],
        attribute_type: AttributeType::Unicode,
    },
    PropertyMapping {
        name: property::GENRE,
        keys: &["genre", "WM/Genre"],
        attribute_type: AttributeType::Unicode,
    },
    PropertyMapping {
        name: property::TRACK_NUMBER,
        keys: &["track", "WM/TrackNumber"],
        attribute_type: AttributeType::Dword,
    },
    PropertyMapping {
        name: property::ALBUM_ARTIST,
        keys: &["album_artist", "WM/AlbumArtist"],
        attribute_type: AttributeType::Unicode,
    },
];

fn mapping_for(name: &str) -> Option<&'static PropertyMapping> {
    PROPERTY_MAPPINGS
        .iter()
        .find(|m| m.name.eq_ignore_ascii_case(name))
}

/// Restore the attribute type of a dictionary string.
fn typed_value(raw: &str, attribute_type: AttributeType) -> PropertyValue {
    match attribute_type {
        AttributeType::Unicode => PropertyValue::Text(raw.to_string()),
        AttributeType::Dword => match raw.trim().parse::<u32>() {
            Ok(n) => PropertyValue::UnsignedInteger(n),
            Err(_) => PropertyValue::Text(raw.to_string()),
        },
    }
}

/// Lookup over any string dictionary; split out so the mapping is testable
/// without a media file.
fn lookup<'a>(name: &str, get: impl Fn(&str) -> Option<&'a str>) -> PropertyValue {
    let Some(mapping) = mapping_for(name) else {
        return PropertyValue::Absent;
    };
    mapping
        .keys
        .iter()
        .find_map(|&key| get(key))
        .map(|raw| typed_value(raw, mapping.attribute_type))
        .unwrap_or(PropertyValue::Absent)
}

/// Snapshot of an input's container metadata. Keys compare
/// case-insensitively, as in `av_dict_get`.
pub struct FfmpegMetadata {
    entries: Vec<(String, String)>,
}

impl MetadataStore for FfmpegMetadata {
    fn property(&self, name: &str) -> PropertyValue {
        lookup(name, |key| {
            self.entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str())
        })
    }
}

/// Read-only input used for bitrate and metadata queries
pub struct FfmpegSource {
    input: ffmpeg::format::context::Input,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self> {
        let input = ffmpeg::format::input(&path)
            .map_err(|e| FfmpegError::OpenInput(format!("Failed to open {:?}: {}", path, e)))?;
        tracing::debug!(path = %path.display(), "Opened source");
        Ok(Self { input })
    }
}

impl MediaSource for FfmpegSource {
    type Metadata = FfmpegMetadata;

    fn stream_average_bitrate(&self, index: usize) -> Result<i64> {
        let stream = self
            .input
            .stream(index)
            .ok_or_else(|| ConvertError::StreamNotFound(format!("stream {}", index)))?;
        Ok(codec_params_bit_rate(&stream.parameters()))
    }

    fn metadata(&self) -> Result<FfmpegMetadata> {
        let entries = self
            .input
            .metadata()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Ok(FfmpegMetadata { entries })
    }
}
