//! Converter configuration
//!
//! Loaded from an optional TOML file. Every key has a default so an empty
//! file (or no file at all) yields the standard WMA → MP3 behaviour.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConvertError, Result};

/// Extension given to every encoded file
pub const TARGET_EXTENSION: &str = "mp3";

/// Bitrate used by [`BitratePolicy::Fixed`] when the file does not set one
pub const DEFAULT_FIXED_KBPS: u32 = 192;

/// How the encoder bitrate is chosen for each file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitratePolicy {
    /// Encode at the source stream's average bitrate
    MatchSource,
    /// Encode every file at `fixed_kbps`
    Fixed,
}

/// Bitrate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BitrateConfig {
    pub policy: BitratePolicy,

    /// Target bitrate in kbps, only read under [`BitratePolicy::Fixed`]
    pub fixed_kbps: u32,
}

impl Default for BitrateConfig {
    fn default() -> Self {
        Self {
            policy: BitratePolicy::MatchSource,
            fixed_kbps: DEFAULT_FIXED_KBPS,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins if set
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Converter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Extension (without the dot) of the files to convert, matched
    /// case-insensitively
    pub source_extension: String,

    /// Bitrate selection
    pub bitrate: BitrateConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            source_extension: "wma".to_string(),
            bitrate: BitrateConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ConverterConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: ConverterConfig = toml::from_str(&content)
            .map_err(|e| ConvertError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConvertError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Reject settings the converter cannot act on.
    pub fn validate(&self) -> Result<()> {
        let ext = self.source_extension.trim_start_matches('.');
        if ext.is_empty() {
            return Err(ConvertError::Config(
                "source_extension must not be empty".to_string(),
            ));
        }
        if ext.eq_ignore_ascii_case(TARGET_EXTENSION) {
            return Err(ConvertError::Config(format!(
                "source_extension cannot be the target extension '{}'",
                TARGET_EXTENSION
            )));
        }
        if self.bitrate.policy == BitratePolicy::Fixed && self.bitrate.fixed_kbps == 0 {
            return Err(ConvertError::Config(
                "bitrate.fixed_kbps must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Source extension without a leading dot
    pub fn source_extension(&self) -> &str {
        self.source_extension.trim_start_matches('.')
    }
}
