//! Metadata reader
//!
//! Pulls the fixed tag set out of a [`MetadataStore`]. Each property is
//! accepted only when the store reports the expected type; anything else is
//! treated as absent.

use crate::framework::{MetadataStore, PropertyValue};

/// Property names queried from the source file.
pub mod property {
    pub const TITLE: &str = "Title";
    pub const AUTHOR: &str = "Author";
    pub const ALBUM_TITLE: &str = "WM/AlbumTitle";
    pub const YEAR: &str = "WM/Year";
    pub const GENRE: &str = "WM/Genre";
    pub const TRACK_NUMBER: &str = "WM/TrackNumber";
    pub const ALBUM_ARTIST: &str = "WM/AlbumArtist";
}

/// Tag set written to the encoded file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagData {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    pub genre: Option<String>,
    /// Decimal rendering of the unsigned track number
    pub track: Option<String>,
    pub album_artist: Option<String>,
}

impl TagData {
    pub fn is_empty(&self) -> bool {
        *self == TagData::default()
    }
}

/// Read the fixed tag set from `store`.
pub fn read_tags<M: MetadataStore + ?Sized>(store: &M) -> TagData {
    TagData {
        title: text_property(store, property::TITLE),
        artist: text_property(store, property::AUTHOR),
        album: text_property(store, property::ALBUM_TITLE),
        year: text_property(store, property::YEAR),
        genre: text_property(store, property::GENRE),
        track: uint_property(store, property::TRACK_NUMBER),
        album_artist: text_property(store, property::ALBUM_ARTIST),
    }
}

fn text_property<M: MetadataStore + ?Sized>(store: &M, name: &str) -> Option<String> {
    match store.property(name) {
        PropertyValue::Text(value) => Some(value),
        PropertyValue::UnsignedInteger(_) | PropertyValue::Absent => None,
    }
}

fn uint_property<M: MetadataStore + ?Sized>(store: &M, name: &str) -> Option<String> {
    match store.property(name) {
        PropertyValue::UnsignedInteger(value) => Some(value.to_string()),
        PropertyValue::Text(_) | PropertyValue::Absent => None,
    }
}
