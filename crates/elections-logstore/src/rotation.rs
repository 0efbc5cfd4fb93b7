//! Size-triggered rotation into a chain of compressed generations
//!
//! `base.log.1.zip` is always the most recent generation; older ones shift
//! up by one on every rotation and fall off past the retention count.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::error::{LogStoreError, Result};

/// Rotation policy and backup naming for one log file
#[derive(Debug, Clone)]
pub struct RotationManager {
    log_path: PathBuf,
    max_backups: usize,
    max_file_size: u64,
}

impl RotationManager {
    pub fn new(log_path: impl Into<PathBuf>, max_backups: usize, max_file_size: u64) -> Self {
        Self {
            log_path: log_path.into(),
            max_backups,
            max_file_size,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Whether a log of `current_size` bytes has reached the threshold
    pub fn should_rotate(&self, current_size: u64) -> bool {
        self.max_file_size > 0 && current_size >= self.max_file_size
    }

    /// Path of backup generation `generation` (1 = most recent)
    pub fn backup_path(&self, generation: usize) -> PathBuf {
        let mut name = self.log_path.as_os_str().to_owned();
        name.push(format!(".{}.zip", generation));
        PathBuf::from(name)
    }

    /// Existing backups, most recent first
    pub fn backups(&self) -> Vec<PathBuf> {
        (1..=self.max_backups)
            .map(|generation| self.backup_path(generation))
            .filter(|path| path.exists())
            .collect()
    }

    /// Archive the current log and delete it
    ///
    /// The caller must have closed its write handle and is responsible for
    /// resetting the offset index. Partial failures are not rolled back.
    pub fn rotate(&self) -> Result<()> {
        if self.max_backups > 0 {
            self.drop_beyond_retention()?;

            for generation in (1..self.max_backups).rev() {
                let src = self.backup_path(generation);
                if src.exists() {
                    let dst = self.backup_path(generation + 1);
                    remove_if_exists(&dst)?;
                    fs::rename(&src, &dst)?;
                }
            }

            if self.log_path.exists() {
                let staging = self.staging_path();
                remove_if_exists(&staging)?;
                self.compress_into(&staging)?;

                let newest = self.backup_path(1);
                remove_if_exists(&newest)?;
                fs::rename(&staging, &newest)?;
                debug!(backup = %newest.display(), "Compressed log generation");
            }
        }

        remove_if_exists(&self.log_path)?;
        info!(
            log = %self.log_path.display(),
            backups = self.backups().len(),
            "Rotated log"
        );
        Ok(())
    }

    /// Remove generations left over from a larger retention setting
    fn drop_beyond_retention(&self) -> Result<()> {
        let mut generation = self.max_backups + 1;
        loop {
            let stale = self.backup_path(generation);
            if !stale.exists() {
                return Ok(());
            }
            fs::remove_file(&stale)?;
            generation += 1;
        }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.log_path.as_os_str().to_owned();
        name.push(".zip");
        PathBuf::from(name)
    }

    fn compress_into(&self, archive_path: &Path) -> Result<()> {
        let entry_name = self
            .log_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| LogStoreError::io("Log path has no file name"))?;

        let mut source = File::open(&self.log_path)?;
        let mut archive = ZipWriter::new(File::create(archive_path)?);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(true);

        archive.start_file(entry_name, options)?;
        io::copy(&mut source, &mut archive)?;
        archive.finish()?;
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
