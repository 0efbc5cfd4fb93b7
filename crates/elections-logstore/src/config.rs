//! Log store configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LogStoreError, Result};

/// Configuration shared by every store a registry opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogStoreConfig {
    /// Directory holding log, index, and backup files
    pub log_dir: PathBuf,
    /// File stem of the system scope; club and event stems extend it
    pub base_name: String,
    /// File stem of the vote log family
    pub vote_base_name: String,
    /// Number of compressed generations to retain
    pub max_backups: usize,
    /// Log size in bytes that triggers rotation (0 disables rotation)
    pub max_file_size: u64,
    /// Read size for line counting and index rebuilds; must be a power of two
    pub chunk_size: usize,
    /// Lines per viewer page
    pub page_size: usize,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./log"),
            base_name: "elections".to_string(),
            vote_base_name: "elections-votes".to_string(),
            max_backups: 10,
            max_file_size: 5_000_000,
            chunk_size: 128 * 1024,
            page_size: 50,
        }
    }
}

impl LogStoreConfig {
    /// Create a config rooted at `log_dir` with default limits
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Default::default()
        }
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LogStoreError::config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Check the invariants the store relies on
    pub fn validate(&self) -> Result<()> {
        if !self.chunk_size.is_power_of_two() {
            return Err(LogStoreError::config(format!(
                "chunk_size must be a power of two, got {}",
                self.chunk_size
            )));
        }
        if self.page_size == 0 {
            return Err(LogStoreError::config("page_size must be at least 1"));
        }
        if self.base_name.is_empty() || self.vote_base_name.is_empty() {
            return Err(LogStoreError::config("base names must not be empty"));
        }
        Ok(())
    }

    /// Same limits, different file family (used for the vote log)
    pub fn for_base_name(&self, base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            ..self.clone()
        }
    }

    /// Config for the vote log family
    pub fn vote_log(&self) -> Self {
        self.for_base_name(self.vote_base_name.clone())
    }

    /// Set the retention count
    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    /// Set the rotation threshold
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the viewer page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}
