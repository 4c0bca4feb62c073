//! In-memory media framework for tests
//!
//! Every handle it hands out increments a shared acquire counter on creation
//! and a release counter on drop, so tests can assert that no handle
//! outlives a conversion.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{ConvertError, FfmpegError, Result};
use crate::framework::{
    EncoderSettings, MediaFramework, MediaSource, MetadataStore, PcmBlock, PcmFormat, PcmReader,
    PcmWriter, PropertyValue,
};

/// Shared acquire/release bookkeeping
#[derive(Debug, Default)]
pub struct HandleCounters {
    acquired: Cell<usize>,
    released: Cell<usize>,
    readers_opened: Cell<usize>,
    writers_opened: Cell<usize>,
}

impl HandleCounters {
    pub fn acquired(&self) -> usize {
        self.acquired.get()
    }

    pub fn released(&self) -> usize {
        self.released.get()
    }

    /// Handles acquired but not yet released
    pub fn live(&self) -> usize {
        self.acquired() - self.released()
    }

    pub fn readers_opened(&self) -> usize {
        self.readers_opened.get()
    }

    pub fn writers_opened(&self) -> usize {
        self.writers_opened.get()
    }
}

/// Counted handle; released on drop.
struct Handle {
    counters: Rc<HandleCounters>,
}

impl Handle {
    fn acquire(counters: &Rc<HandleCounters>) -> Self {
        counters.acquired.set(counters.acquired.get() + 1);
        Self {
            counters: Rc::clone(counters),
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.counters.released.set(self.counters.released.get() + 1);
    }
}

/// Description of one source file as the mock framework sees it
#[derive(Debug, Clone)]
pub struct MockFile {
    bitrate_bps: i64,
    properties: HashMap<String, PropertyValue>,
    format: PcmFormat,
    block_count: usize,
    block_samples: usize,
    fail_after: Option<usize>,
}

impl MockFile {
    pub fn new(bitrate_bps: i64) -> Self {
        Self {
            bitrate_bps,
            properties: HashMap::new(),
            format: PcmFormat {
                sample_rate: 44_100,
                channels: 2,
            },
            block_count: 1,
            block_samples: 256,
            fail_after: None,
        }
    }

    pub fn with_property(mut self, name: &str, value: PropertyValue) -> Self {
        self.properties.insert(name.to_string(), value);
        self
    }

    pub fn with_blocks(mut self, count: usize, samples: usize) -> Self {
        self.block_count = count;
        self.block_samples = samples;
        self
    }

    /// Fail decoding after `blocks` blocks have been produced.
    pub fn failing_after(mut self, blocks: usize) -> Self {
        self.fail_after = Some(blocks);
        self
    }

    fn block(&self, index: usize) -> PcmBlock {
        let planes = (0..self.format.channels as usize)
            .map(|ch| {
                (0..self.block_samples)
                    .map(|i| ((index * 31 + ch * 7 + i) % 200) as f32 / 100.0 - 1.0)
                    .collect()
            })
            .collect();
        PcmBlock::new(planes)
    }
}

/// What a mock writer received
#[derive(Debug, Clone)]
pub struct WrittenFile {
    pub settings: EncoderSettings,
    pub samples: u64,
    pub checksum: f64,
    pub finished: bool,
}

/// Mock framework keyed by source file name
pub struct MockFramework {
    files: HashMap<String, MockFile>,
    default_file: MockFile,
    counters: Rc<HandleCounters>,
    outputs: Rc<RefCell<HashMap<PathBuf, WrittenFile>>>,
    fail_finish: bool,
}

impl MockFramework {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            default_file: MockFile::new(128_000).with_blocks(2, 256),
            counters: Rc::new(HandleCounters::default()),
            outputs: Rc::new(RefCell::new(HashMap::new())),
            fail_finish: false,
        }
    }

    /// Make every writer's `finish` fail, as a trailer write error would.
    pub fn with_failing_finish(mut self) -> Self {
        self.fail_finish = true;
        self
    }

    /// Register `file` for every source whose file name is `name`.
    pub fn with_file(mut self, name: &str, file: MockFile) -> Self {
        self.files.insert(name.to_string(), file);
        self
    }

    pub fn counters(&self) -> &HandleCounters {
        &self.counters
    }

    pub fn written(&self, path: &Path) -> Option<WrittenFile> {
        self.outputs.borrow().get(path).cloned()
    }

    fn lookup(&self, path: &Path) -> MockFile {
        path.file_name()
            .and_then(|name| self.files.get(name.to_string_lossy().as_ref()))
            .unwrap_or(&self.default_file)
            .clone()
    }
}

pub struct MockSource {
    file: MockFile,
    counters: Rc<HandleCounters>,
    _handle: Handle,
}

pub struct MockMetadata {
    properties: HashMap<String, PropertyValue>,
    _handle: Handle,
}

impl MetadataStore for MockMetadata {
    fn property(&self, name: &str) -> PropertyValue {
        self.properties
            .get(name)
            .cloned()
            .unwrap_or(PropertyValue::Absent)
    }
}

impl MediaSource for MockSource {
    type Metadata = MockMetadata;

    fn stream_average_bitrate(&self, index: usize) -> Result<i64> {
        if index != 0 {
            return Err(ConvertError::StreamNotFound(format!("stream {}", index)));
        }
        Ok(self.file.bitrate_bps)
    }

    fn metadata(&self) -> Result<MockMetadata> {
        Ok(MockMetadata {
            properties: self.file.properties.clone(),
            _handle: Handle::acquire(&self.counters),
        })
    }
}

pub struct MockReader {
    file: MockFile,
    next: usize,
    _handle: Handle,
}

impl PcmReader for MockReader {
    fn format(&self) -> PcmFormat {
        self.file.format
    }

    fn read_block(&mut self) -> Result<Option<PcmBlock>> {
        if self.file.fail_after == Some(self.next) {
            return Err(FfmpegError::DecodePacket("mock decode failure".into()).into());
        }
        if self.next >= self.file.block_count {
            return Ok(None);
        }
        let block = self.file.block(self.next);
        self.next += 1;
        Ok(Some(block))
    }
}

pub struct MockWriter {
    path: PathBuf,
    fail_finish: bool,
    outputs: Rc<RefCell<HashMap<PathBuf, WrittenFile>>>,
    _handle: Handle,
}

impl MockWriter {
    fn update<T>(&self, f: impl FnOnce(&mut WrittenFile) -> T) -> T {
        let mut outputs = self.outputs.borrow_mut();
        let entry = outputs
            .get_mut(&self.path)
            .expect("writer entry registered at creation");
        f(entry)
    }

    fn render(written: &WrittenFile) -> String {
        let settings = &written.settings;
        let tags = &settings.tags;
        let mut out = String::new();
        let _ = writeln!(out, "bitrate={}", settings.bitrate_kbps);
        let _ = writeln!(out, "rate={}", settings.format.sample_rate);
        let _ = writeln!(out, "channels={}", settings.format.channels);
        for (key, value) in [
            ("title", &tags.title),
            ("artist", &tags.artist),
            ("album", &tags.album),
            ("year", &tags.year),
            ("genre", &tags.genre),
            ("track", &tags.track),
            ("album_artist", &tags.album_artist),
        ] {
            let _ = writeln!(out, "{}={}", key, value.as_deref().unwrap_or(""));
        }
        let _ = writeln!(out, "samples={}", written.samples);
        let _ = writeln!(out, "checksum={:.6}", written.checksum);
        out
    }
}

impl PcmWriter for MockWriter {
    fn write_block(&mut self, block: &PcmBlock) -> Result<()> {
        self.update(|w| {
            w.samples += block.samples() as u64;
            w.checksum += block
                .planes()
                .iter()
                .flatten()
                .map(|s| *s as f64)
                .sum::<f64>();
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let rendered = self.update(|w| {
            if w.finished {
                return None;
            }
            w.finished = true;
            Some(Self::render(w))
        });
        let Some(content) = rendered else {
            return Ok(());
        };
        if self.fail_finish {
            return Err(FfmpegError::WriteTrailer("mock trailer failure".into()).into());
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Drop for MockWriter {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

impl MediaFramework for MockFramework {
    type Source = MockSource;
    type Reader = MockReader;
    type Writer = MockWriter;

    fn open_source(&self, path: &Path) -> Result<MockSource> {
        Ok(MockSource {
            file: self.lookup(path),
            counters: Rc::clone(&self.counters),
            _handle: Handle::acquire(&self.counters),
        })
    }

    fn open_reader(&self, path: &Path) -> Result<MockReader> {
        self.counters
            .readers_opened
            .set(self.counters.readers_opened.get() + 1);
        Ok(MockReader {
            file: self.lookup(path),
            next: 0,
            _handle: Handle::acquire(&self.counters),
        })
    }

    fn create_writer(&self, path: &Path, settings: EncoderSettings) -> Result<MockWriter> {
        self.counters
            .writers_opened
            .set(self.counters.writers_opened.get() + 1);
        std::fs::File::create(path)?;
        self.outputs.borrow_mut().insert(
            path.to_path_buf(),
            WrittenFile {
                settings,
                samples: 0,
                checksum: 0.0,
                finished: false,
            },
        );
        Ok(MockWriter {
            path: path.to_path_buf(),
            fail_finish: self.fail_finish,
            outputs: Rc::clone(&self.outputs),
            _handle: Handle::acquire(&self.counters),
        })
    }
}
