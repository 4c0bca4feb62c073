//! Directory walker
//!
//! Depth-first mirror of a source tree into a destination tree. Files in a
//! directory are converted before its subdirectories are visited; entries
//! are visited in file-name order. The first conversion error aborts the
//! walk, leaving earlier outputs on disk.

use std::path::{Path, PathBuf};

use crate::config::{ConverterConfig, TARGET_EXTENSION};
use crate::convert::convert_file;
use crate::error::{ConvertError, Result};
use crate::framework::MediaFramework;

/// Totals for one walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub files_converted: usize,
    pub directories_visited: usize,
}

/// Walks a source tree and converts every matching file.
pub struct Walker<'a, F: MediaFramework> {
    framework: &'a F,
    config: &'a ConverterConfig,
}

impl<'a, F: MediaFramework> Walker<'a, F> {
    pub fn new(framework: &'a F, config: &'a ConverterConfig) -> Self {
        Self { framework, config }
    }

    /// Mirror `source_dir` into `dest_dir`.
    pub fn run(&self, source_dir: &Path, dest_dir: &Path) -> Result<WalkSummary> {
        let mut summary = WalkSummary::default();
        self.process_directory(source_dir, dest_dir, &mut summary)?;
        Ok(summary)
    }

    fn process_directory(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        summary: &mut WalkSummary,
    ) -> Result<()> {
        if !dest_dir.is_dir() {
            std::fs::create_dir_all(dest_dir).map_err(|source| ConvertError::DirectoryAccess {
                path: dest_dir.to_path_buf(),
                source,
            })?;
            tracing::debug!(dest = %dest_dir.display(), "Created directory");
        }
        summary.directories_visited += 1;

        let (files, directories) = list_directory(source_dir)?;

        for file in files
            .iter()
            .filter(|f| matches_extension(f, self.config.source_extension()))
        {
            let dest_file = destination_path(dest_dir, file);
            convert_file(self.framework, &self.config.bitrate, file, &dest_file)?;
            tracing::info!(
                source = %file.display(),
                dest = %dest_file.display(),
                "Wrote"
            );
            summary.files_converted += 1;
        }

        for directory in &directories {
            if let Some(name) = directory.file_name() {
                self.process_directory(directory, &dest_dir.join(name), summary)?;
            }
        }

        Ok(())
    }
}

/// Sorted regular files and subdirectories of `dir`. Symbolic links are
/// followed.
fn list_directory(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let read_dir = std::fs::read_dir(dir).map_err(|source| ConvertError::DirectoryAccess {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|source| ConvertError::DirectoryAccess {
            path: dir.to_path_buf(),
            source,
        })?;
        entries.push(entry.path());
    }
    entries.sort();

    let (directories, files): (Vec<PathBuf>, Vec<PathBuf>) =
        entries.into_iter().partition(|p| p.is_dir());
    let files = files.into_iter().filter(|p| p.is_file()).collect();
    Ok((files, directories))
}

/// ASCII case-insensitive extension match.
pub fn matches_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Destination for `source_file` inside `dest_dir`: same file name with the
/// target extension.
pub fn destination_path(dest_dir: &Path, source_file: &Path) -> PathBuf {
    let mut dest = match source_file.file_name() {
        Some(name) => dest_dir.join(name),
        None => dest_dir.to_path_buf(),
    };
    dest.set_extension(TARGET_EXTENSION);
    dest
}
