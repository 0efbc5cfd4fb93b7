//! One scope's log: plaintext file, offset index, and rotation state
//!
//! Appends, rotations, and rebuilds on a store are serialized by a single
//! lock. Page reads only take it long enough to copy the index.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::config::LogStoreConfig;
use crate::error::{LogStoreError, Result};
use crate::index::{OffsetIndex, count_lines};
use crate::level::Severity;
use crate::pager::{self, Page, PageRequest};
use crate::record::LogRecord;
use crate::rotation::RotationManager;
use crate::scope::ScopeKey;

/// User recorded on records the store writes about itself
pub const SYSTEM_USER: &str = "System";

/// Log file, index, and rotation state for one scope
#[derive(Debug)]
pub struct LogStore {
    scope: ScopeKey,
    log_path: PathBuf,
    index_path: PathBuf,
    chunk_size: usize,
    inner: Mutex<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    /// Append handle on the log file
    writer: Option<File>,
    index: OffsetIndex,
    rotation: RotationManager,
    /// Set when a rebuild failed and the index cannot be trusted
    degraded: bool,
}

impl LogStore {
    /// Open (or create) the store for `scope` in the configured family
    ///
    /// An inconsistent or unreadable index is rebuilt. A failed rebuild is
    /// reported and leaves the store degraded instead of failing the open.
    #[instrument(skip_all, fields(scope = %scope, base = %config.base_name))]
    pub fn open(scope: ScopeKey, config: &LogStoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.log_dir)?;

        let log_path = scope.log_path(&config.log_dir, &config.base_name);
        let index_path = scope.index_path(&config.log_dir, &config.base_name);

        let (mut index, mut needs_rebuild) = match OffsetIndex::load(&index_path, config.chunk_size) {
            Ok(index) => (index, false),
            Err(e) => {
                warn!(error = %e, "Unreadable offset index, scheduling rebuild");
                (OffsetIndex::empty(&index_path, config.chunk_size), true)
            }
        };

        if !needs_rebuild && index.resume_seed(&log_path).unwrap_or(false) {
            debug!("Resuming post-rotation seed");
        } else if !needs_rebuild {
            needs_rebuild = match index.verify(&log_path) {
                Ok(consistent) => !consistent,
                Err(e) => {
                    warn!(error = %e, "Offset index verification failed");
                    true
                }
            };
        }

        let store = Self {
            scope,
            log_path: log_path.clone(),
            index_path,
            chunk_size: config.chunk_size,
            inner: Mutex::new(StoreInner {
                writer: None,
                index,
                rotation: RotationManager::new(log_path, config.max_backups, config.max_file_size),
                degraded: false,
            }),
        };

        if needs_rebuild {
            match store.rebuild() {
                Ok(()) => {
                    let record = LogRecord::new(
                        Severity::Critical,
                        scope,
                        SYSTEM_USER,
                        "",
                        "Rebuilt file offsets list",
                    );
                    store.write_record(&record)?;
                }
                Err(e) => store.report_rebuild_failure(&e),
            }
        }

        info!(path = %store.log_path.display(), "Opened log store");
        Ok(store)
    }

    pub fn scope(&self) -> ScopeKey {
        self.scope
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Whether the last rebuild attempt failed
    pub fn is_degraded(&self) -> bool {
        self.inner.lock().degraded
    }

    /// Append a record's lines, index them, and rotate if the log is full
    pub fn write_record(&self, record: &LogRecord) -> Result<()> {
        let lines = record.physical_lines();

        {
            let mut inner = self.inner.lock();
            inner.append_lines(&self.log_path, &lines)?;

            let size = inner.log_size(&self.log_path)?;
            if inner.rotation.should_rotate(size) {
                debug!(scope = %self.scope, size, "Log reached rotation threshold");
                inner.rotate(&self.log_path)?;
            }
        }

        if record.severity == Severity::Critical {
            error!(scope = %self.scope, user = %record.user, "{}", record.message);
        }
        Ok(())
    }

    /// Force a rotation regardless of size
    ///
    /// The caller should follow up with a record so the new generation does
    /// not sit empty behind its seed offset.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.rotate(&self.log_path)?;
        info!(scope = %self.scope, "Log reset");
        Ok(())
    }

    /// Line count of the log file, or of its index file
    pub fn line_count(&self, use_index_file: bool) -> Result<usize> {
        let path = if use_index_file {
            &self.index_path
        } else {
            &self.log_path
        };
        count_lines(path, self.chunk_size)
    }

    /// Copy of the in-memory offsets
    pub fn offsets(&self) -> Vec<u64> {
        self.inner.lock().index.offsets().to_vec()
    }

    /// Check the index against the log by line count
    pub fn verify(&self) -> Result<bool> {
        let inner = self.inner.lock();
        inner.index.verify(&self.log_path)
    }

    /// Regenerate the index from the log
    pub fn rebuild(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.index.rebuild(&self.log_path) {
            Ok(()) => {
                inner.degraded = false;
                Ok(())
            }
            Err(e) => {
                inner.degraded = true;
                Err(e)
            }
        }
    }

    /// Retry a rebuild after an earlier failure, reporting the outcome
    pub fn retry_rebuild(&self) -> Result<()> {
        match self.rebuild() {
            Ok(()) => {
                info!(scope = %self.scope, "Degraded store recovered");
                Ok(())
            }
            Err(e) => {
                self.report_rebuild_failure(&e);
                Err(e)
            }
        }
    }

    /// Existing compressed generations, most recent first
    pub fn backups(&self) -> Vec<PathBuf> {
        self.inner.lock().rotation.backups()
    }

    /// Fetch one page against a fresh snapshot of the index
    pub fn fetch_page(&self, request: &PageRequest) -> Result<Page> {
        let offsets = self.offsets();
        let line_count = self.line_count(true)?;
        pager::fetch_page_from_file(&self.log_path, &offsets, line_count, request)
    }

    fn report_rebuild_failure(&self, err: &LogStoreError) {
        // The store may be what is broken, so go around it.
        eprintln!(
            " *** Log file '{}': failed to rebuild offsets: {}",
            self.log_path.display(),
            err
        );
        error!(scope = %self.scope, error = %err, "Offset index rebuild failed, store degraded");
        self.inner.lock().degraded = true;
    }
}

impl StoreInner {
    fn writer(&mut self, log_path: &Path) -> Result<&mut File> {
        if self.writer.is_none() {
            let file = OpenOptions::new().create(true).append(true).open(log_path)?;
            self.writer = Some(file);
        }
        self.writer
            .as_mut()
            .ok_or_else(|| LogStoreError::io("Log file not open"))
    }

    /// Write each physical line, indexing it at the true end of file
    fn append_lines(&mut self, log_path: &Path, lines: &[String]) -> Result<()> {
        for line in lines {
            let writer = self.writer(log_path)?;
            let offset = writer.seek(SeekFrom::End(0))?;

            let mut bytes = Vec::with_capacity(line.len() + 1);
            bytes.extend_from_slice(line.as_bytes());
            bytes.push(b'\n');
            writer.write_all(&bytes)?;

            self.index.append(offset)?;
        }
        Ok(())
    }

    fn log_size(&mut self, log_path: &Path) -> Result<u64> {
        Ok(self.writer(log_path)?.metadata()?.len())
    }

    /// Archive the log, reseed the index, and reopen for appends
    fn rotate(&mut self, log_path: &Path) -> Result<()> {
        self.writer = None;
        self.index.close();

        let rotated = self.rotation.rotate();
        let reseeded = self.index.reseed();
        let reopened = self.writer(log_path).map(|_| ());

        rotated.and(reseeded).and(reopened)
    }
}
