//! End-to-end tests against the real FFmpeg backend

use std::fs;
use std::path::Path;

use ffmpeg_next as ffmpeg;
use tempfile::tempdir;

use crate::config::{BitrateConfig, BitratePolicy, ConverterConfig};
use crate::convert::{convert_file, probe_source};
use crate::error::ConvertError;
use crate::ffmpeg::FfmpegFramework;
use crate::integration::fixtures::{codecs_available, WmaFixture};
use crate::walker::Walker;

/// Metadata and stream facts of an encoded output file
struct OutputProbe {
    codec: ffmpeg::codec::Id,
    sample_rate: u32,
    channels: u16,
    tags: Vec<(String, String)>,
}

impl OutputProbe {
    fn read(path: &Path) -> Self {
        let input = ffmpeg::format::input(&path).expect("output must be readable");
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Audio)
            .expect("output must carry an audio stream");
        let decoder = ffmpeg::codec::Context::from_parameters(stream.parameters())
            .and_then(|c| c.decoder().audio())
            .expect("output stream must be decodable");
        Self {
            codec: stream.parameters().id(),
            sample_rate: decoder.rate(),
            channels: decoder.channels(),
            tags: input
                .metadata()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

fn starts_with_id3(path: &Path) -> bool {
    fs::read(path)
        .map(|bytes| bytes.starts_with(b"ID3"))
        .unwrap_or(false)
}

#[test]
fn test_probe_reads_wm_properties() {
    if !codecs_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let source = dir.path().join("tagged.wma");
    WmaFixture::tagged_stereo().write(&source).unwrap();

    let framework = FfmpegFramework::startup().unwrap();
    let (kbps, tags) = probe_source(&framework, &source).unwrap();

    // wmav2 rounds its bitrate to a whole block size
    assert!((120..=130).contains(&kbps), "unexpected source bitrate {}", kbps);
    assert_eq!(tags.title.as_deref(), Some("Sine Song"));
    assert_eq!(tags.artist.as_deref(), Some("Test Artist"));
    assert_eq!(tags.album.as_deref(), Some("Test Album"));
    assert_eq!(tags.year.as_deref(), Some("2004"));
    assert_eq!(tags.genre.as_deref(), Some("Ambient"));
    assert_eq!(tags.track.as_deref(), Some("3"));
    assert_eq!(tags.album_artist.as_deref(), Some("Various Artists"));
}

#[test]
fn test_convert_file_writes_tagged_mp3() {
    if !codecs_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let source = dir.path().join("tagged.wma");
    let dest = dir.path().join("tagged.mp3");
    WmaFixture::tagged_stereo().write(&source).unwrap();

    let framework = FfmpegFramework::startup().unwrap();
    let report = convert_file(&framework, &BitrateConfig::default(), &source, &dest).unwrap();

    assert_eq!(report.bitrate_kbps, report.source_kbps);
    assert!(report.samples > 0);
    assert!(starts_with_id3(&dest));

    let probe = OutputProbe::read(&dest);
    assert_eq!(probe.codec, ffmpeg::codec::Id::MP3);
    assert_eq!(probe.sample_rate, 44_100);
    assert_eq!(probe.channels, 2);
    assert_eq!(probe.tag("title"), Some("Sine Song"));
    assert_eq!(probe.tag("artist"), Some("Test Artist"));
    assert_eq!(probe.tag("album"), Some("Test Album"));
    assert_eq!(probe.tag("genre"), Some("Ambient"));
    assert_eq!(probe.tag("track"), Some("3"));
    assert_eq!(probe.tag("album_artist"), Some("Various Artists"));
    assert!(probe.tag("date").is_some_and(|d| d.starts_with("2004")));
}

#[test]
fn test_fixed_bitrate_policy() {
    if !codecs_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let source = dir.path().join("mono.wma");
    let dest = dir.path().join("mono.mp3");
    WmaFixture::untagged_mono().write(&source).unwrap();

    let framework = FfmpegFramework::startup().unwrap();
    let bitrate = BitrateConfig {
        policy: BitratePolicy::Fixed,
        fixed_kbps: 96,
    };
    let report = convert_file(&framework, &bitrate, &source, &dest).unwrap();

    assert_eq!(report.bitrate_kbps, 96);
    assert!(report.tags.is_empty());
    let probe = OutputProbe::read(&dest);
    assert_eq!(probe.codec, ffmpeg::codec::Id::MP3);
    assert_eq!(probe.channels, 1);
    assert_eq!(probe.sample_rate, 22_050);
    assert_eq!(probe.tag("title"), None);
}

#[test]
fn test_walker_converts_tree() {
    if !codecs_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let src = dir.path().join("music");
    let dst = dir.path().join("out");
    fs::create_dir_all(src.join("album")).unwrap();
    WmaFixture::tagged_stereo().write(&src.join("one.wma")).unwrap();
    WmaFixture::untagged_mono().write(&src.join("album").join("Two.WMA")).unwrap();
    fs::write(src.join("notes.txt"), "not audio").unwrap();

    let framework = FfmpegFramework::startup().unwrap();
    let config = ConverterConfig::default();
    let summary = Walker::new(&framework, &config).run(&src, &dst).unwrap();

    assert_eq!(summary.files_converted, 2);
    assert!(starts_with_id3(&dst.join("one.mp3")));
    assert!(dst.join("album").join("Two.mp3").is_file());
    assert!(!dst.join("notes.txt").exists());
    assert!(!dst.join("notes.mp3").exists());
}

#[test]
fn test_second_walk_reencodes_byte_identical_output() {
    if !codecs_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let src = dir.path().join("music");
    let dst = dir.path().join("out");
    fs::create_dir_all(src.join("album")).unwrap();
    WmaFixture::tagged_stereo().write(&src.join("one.wma")).unwrap();
    WmaFixture::untagged_mono().write(&src.join("album").join("two.wma")).unwrap();

    let framework = FfmpegFramework::startup().unwrap();
    let config = ConverterConfig::default();
    let walker = Walker::new(&framework, &config);
    let one = dst.join("one.mp3");
    let two = dst.join("album").join("two.mp3");

    walker.run(&src, &dst).unwrap();
    let first_one = fs::read(&one).unwrap();
    let first_two = fs::read(&two).unwrap();
    assert!(first_one.starts_with(b"ID3"));

    fs::write(&one, b"stale output").unwrap();
    let summary = walker.run(&src, &dst).unwrap();

    assert_eq!(summary.files_converted, 2);
    assert_eq!(fs::read(&one).unwrap(), first_one);
    assert_eq!(fs::read(&two).unwrap(), first_two);
}

#[test]
fn test_undecodable_file_aborts_walk() {
    if !codecs_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let src = dir.path().join("music");
    let dst = dir.path().join("out");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("broken.wma"), b"definitely not an ASF header").unwrap();

    let framework = FfmpegFramework::startup().unwrap();
    let config = ConverterConfig::default();
    let err = Walker::new(&framework, &config).run(&src, &dst).unwrap_err();

    assert!(matches!(
        err,
        ConvertError::Ffmpeg(_) | ConvertError::InvalidBitrate(_) | ConvertError::StreamNotFound(_)
    ));
    assert!(!dst.join("broken.mp3").exists());
}
