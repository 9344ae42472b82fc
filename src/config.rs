//! Configuration management for avifpress

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AvifpressError, Result};

/// Extensions admitted by default, matching the usual web image suspects.
pub const DEFAULT_EXTENSIONS: &[&str] = &["gif", "jpg", "jpeg", "png", "webp"];

/// Extension given to converted files.
pub const OUTPUT_EXTENSION: &str = "avif";

/// Whole-run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of conversions in flight (None = logical CPU count)
    pub concurrency: Option<usize>,

    /// Keep source files after a successful conversion
    pub keep_originals: bool,

    /// What to do when the destination file already exists
    pub on_collision: CollisionPolicy,

    /// Extension allow-list, matched case-sensitively
    pub extensions: Vec<String>,

    /// AVIF encoder settings, fixed for the whole run
    pub encoder: EncoderSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: None,
            keep_originals: false,
            on_collision: CollisionPolicy::Overwrite,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            encoder: EncoderSettings::default(),
        }
    }
}

/// Policy for an already-existing destination file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Silently replace the existing file
    Overwrite,
    /// Fail the task and leave the existing file alone
    Error,
}

/// AVIF encoder parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// Output quality, 1-100
    pub quality: u8,

    /// Encoder speed/effort, 1 (slowest, best) to 10 (fastest)
    pub speed: u8,

    /// Lossless output; forces quality 100
    pub lossless: bool,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            speed: 5,
            lossless: false,
        }
    }
}

impl EncoderSettings {
    /// Quality actually handed to the encoder
    pub fn effective_quality(&self) -> u8 {
        if self.lossless {
            100
        } else {
            self.quality
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            AvifpressError::config(format!(
                "Failed to read config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| AvifpressError::config(format!("TOML parsing error: {}", e)))?;

        Ok(config)
    }

    /// Resolved concurrency budget, always >= 1
    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Build the path filter from the configured allow-list
    pub fn filter(&self) -> Result<PathFilter> {
        PathFilter::new(self.extensions.clone())
    }

    /// Validate configuration before a run
    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.concurrency {
            if n == 0 {
                return Err(AvifpressError::config(
                    "Concurrency must be greater than 0",
                ));
            }
        }

        if self.encoder.quality == 0 || self.encoder.quality > 100 {
            return Err(AvifpressError::config(
                "Encoder quality must be between 1 and 100",
            ));
        }

        if self.encoder.speed == 0 || self.encoder.speed > 10 {
            return Err(AvifpressError::config(
                "Encoder speed must be between 1 and 10",
            ));
        }

        // Surface filter problems before any task is scheduled
        self.filter()?;

        Ok(())
    }
}

/// Case-sensitive extension predicate deciding batch membership
///
/// Only ever consulted for regular files; directory and symlink exclusion
/// happens in the walker before this predicate runs.
#[derive(Debug, Clone)]
pub struct PathFilter {
    extensions: Vec<String>,
}

impl PathFilter {
    /// Create a filter from an extension allow-list
    pub fn new(extensions: Vec<String>) -> Result<Self> {
        if extensions.is_empty() {
            return Err(AvifpressError::config("Extension allow-list is empty"));
        }

        for ext in &extensions {
            if ext.is_empty() || ext.contains('.') || ext.contains(std::path::MAIN_SEPARATOR) {
                return Err(AvifpressError::config(format!(
                    "Invalid extension in allow-list: {:?} (expected e.g. \"jpg\")",
                    ext
                )));
            }
        }

        Ok(Self { extensions })
    }

    /// Check whether a path belongs in the batch
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|allowed| allowed == ext))
            .unwrap_or(false)
    }
}
