//! Byte-offset index over a plaintext log
//!
//! The index file sits next to its log and holds one decimal offset per
//! line, each the position of the first byte of the matching log line.
//! Keeping it in step with the log lets a viewer seek straight to any line.
//!
//! ## Storage Format
//!
//! ```text
//! 0\n
//! 71\n
//! 139\n
//! ```
//!
//! After a rotation the file holds a single seed `0` that stands for the
//! first line of the next generation; the first append at offset 0
//! consumes it rather than writing a duplicate.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{LogStoreError, Result};

/// In-memory copy of a persisted offset index
#[derive(Debug)]
pub struct OffsetIndex {
    /// Path of the index file
    path: PathBuf,
    /// Chunk size for counting and rebuild reads
    chunk_size: usize,
    /// Line start offsets, mirroring the file
    offsets: Vec<u64>,
    /// True while the only entry is a post-rotation seed
    seeded: bool,
    /// Append handle, opened on first use
    writer: Option<File>,
}

impl OffsetIndex {
    /// An empty index that will persist to `path`
    pub fn empty(path: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            path: path.into(),
            chunk_size,
            offsets: Vec::new(),
            seeded: false,
            writer: None,
        }
    }

    /// Parse the persisted index; a missing file yields an empty index
    pub fn load(path: impl Into<PathBuf>, chunk_size: usize) -> Result<Self> {
        let mut index = Self::empty(path, chunk_size);

        let file = match File::open(&index.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %index.path.display(), "No index file, starting empty");
                return Ok(index);
            }
            Err(e) => return Err(e.into()),
        };

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let offset = trimmed
                .parse::<u64>()
                .map_err(|e| LogStoreError::IndexFormat {
                    path: index.path.display().to_string(),
                    line: line_no + 1,
                    detail: e.to_string(),
                })?;
            index.offsets.push(offset);
        }

        debug!(path = %index.path.display(), entries = index.offsets.len(), "Loaded offset index");
        Ok(index)
    }

    /// Path of the index file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Chunk size used for counting and rebuilds
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// All persisted offsets, including a pending seed
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Number of persisted entries, including a pending seed
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Offset of line `line` (0-based)
    pub fn get(&self, line: usize) -> Option<u64> {
        self.offsets.get(line).copied()
    }

    /// Whether the index holds only the post-rotation seed
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Record the start offset of a newly written line
    pub fn append(&mut self, offset: u64) -> Result<()> {
        if self.seeded {
            self.seeded = false;
            if offset == 0 {
                return Ok(());
            }
            // The generation did not start empty; the seed is wrong.
            warn!(path = %self.path.display(), offset, "Discarding stale index seed");
            self.offsets.clear();
            self.write_all_entries()?;
        }

        if let Some(&last) = self.offsets.last()
            && offset <= last
        {
            warn!(
                path = %self.path.display(),
                offset,
                last,
                "Offset does not advance; index will fail verification"
            );
        }

        self.writer()?.write_all(format!("{}\n", offset).as_bytes())?;
        self.offsets.push(offset);
        Ok(())
    }

    /// Compare line counts of the log and the persisted index
    ///
    /// Only counts are compared; an index with the right number of wrong
    /// offsets passes.
    pub fn verify(&self, log_path: &Path) -> Result<bool> {
        let log_lines = count_lines(log_path, self.chunk_size)?;
        let index_lines = count_lines(&self.path, self.chunk_size)?;

        if log_lines != index_lines {
            warn!(
                log = %log_path.display(),
                log_lines,
                index_lines,
                "Line count mismatch between log and index"
            );
        }
        Ok(log_lines == index_lines)
    }

    /// Discard the index and regenerate it by scanning the log
    pub fn rebuild(&mut self, log_path: &Path) -> Result<()> {
        self.writer = None;

        let offsets = scan_offsets(log_path, self.chunk_size)?;
        self.offsets = offsets;
        self.seeded = false;
        self.write_all_entries()?;

        info!(
            log = %log_path.display(),
            index = %self.path.display(),
            lines = self.offsets.len(),
            "Rebuilt offset index"
        );
        Ok(())
    }

    /// Replace the index with the single post-rotation seed
    pub fn reseed(&mut self) -> Result<()> {
        self.writer = None;
        self.offsets = vec![0];
        self.write_all_entries()?;
        self.seeded = true;
        Ok(())
    }

    /// Treat a lone `0` as a pending seed when the log has nothing in it
    ///
    /// That is the state a rotation leaves on disk until the next write.
    pub fn resume_seed(&mut self, log_path: &Path) -> Result<bool> {
        if self.offsets != [0] {
            return Ok(false);
        }
        let log_empty = match fs::metadata(log_path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        self.seeded = log_empty;
        Ok(log_empty)
    }

    /// Drop the append handle so the file can be replaced underneath us
    pub fn close(&mut self) {
        self.writer = None;
    }

    fn writer(&mut self) -> Result<&mut File> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.writer = Some(file);
        }
        self.writer
            .as_mut()
            .ok_or_else(|| LogStoreError::io("Index file not open"))
    }

    /// Write the whole in-memory index to a sibling file and swap it in
    fn write_all_entries(&mut self) -> Result<()> {
        self.writer = None;

        let tmp_path = tmp_sibling(&self.path);
        {
            let mut out = BufWriter::new(File::create(&tmp_path)?);
            for offset in &self.offsets {
                writeln!(out, "{}", offset)?;
            }
            out.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Count lines in a file with fixed-size chunk reads
///
/// A line is a `\n` terminator, plus one for trailing bytes without a
/// terminator. Missing files have zero lines.
pub fn count_lines(path: &Path, chunk_size: usize) -> Result<usize> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut count = 0usize;
    let mut last_byte = None;

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        count += buf[..n].iter().filter(|&&b| b == b'\n').count();
        last_byte = Some(buf[n - 1]);
    }

    if matches!(last_byte, Some(b) if b != b'\n') {
        count += 1;
    }
    Ok(count)
}

/// Locate every line start in a log with fixed-size chunk reads
fn scan_offsets(log_path: &Path, chunk_size: usize) -> Result<Vec<u64>> {
    let mut file = match File::open(log_path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let file_len = file.metadata()?.len();
    let mut offsets = Vec::new();
    if file_len == 0 {
        return Ok(offsets);
    }
    offsets.push(0);

    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut chunk_start = 0u64;

    while chunk_start < file_len {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for (pos, _) in buf[..n].iter().enumerate().filter(|(_, b)| **b == b'\n') {
            let next_line = chunk_start + pos as u64 + 1;
            if next_line < file_len {
                offsets.push(next_line);
            }
        }
        chunk_start += n as u64;
    }

    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom};
    use tempfile::TempDir;

    fn write_log(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("test.log");
        fs::write(&path, contents).unwrap();
        path
    }

    fn read_line_at(path: &Path, offset: u64) -> String {
        let mut file = File::open(path).unwrap();
        file.seek(SeekFrom::Start(offset)).unwrap();
        let mut line = String::new();
        BufReader::new(file).read_line(&mut line).unwrap();
        line.trim_end_matches('\n').to_string()
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let index = OffsetIndex::load(dir.path().join("none.offsets.log"), 64).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_append_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.offsets.log");

        let mut index = OffsetIndex::empty(&path, 64);
        index.append(0).unwrap();
        index.append(17).unwrap();
        index.append(40).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0\n17\n40\n");

        let reloaded = OffsetIndex::load(&path, 64).unwrap();
        assert_eq!(reloaded.offsets(), &[0, 17, 40]);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.offsets.log");
        fs::write(&path, "0\n12\nabc\n").unwrap();

        let err = OffsetIndex::load(&path, 64).unwrap_err();
        assert!(matches!(err, LogStoreError::IndexFormat { line: 3, .. }));
    }

    #[test]
    fn test_count_lines() {
        let dir = TempDir::new().unwrap();
        assert_eq!(count_lines(&write_log(&dir, ""), 4).unwrap(), 0);
        assert_eq!(count_lines(&write_log(&dir, "a\nbb\n"), 4).unwrap(), 2);
        assert_eq!(count_lines(&write_log(&dir, "a\nbb\nccc"), 4).unwrap(), 3);
        assert_eq!(count_lines(&dir.path().join("missing"), 4).unwrap(), 0);
    }

    #[test]
    fn test_rebuild_across_chunk_boundaries() {
        let dir = TempDir::new().unwrap();
        let contents = "first line\nx\n\nthe fourth line is longer\nfive\n";
        let log = write_log(&dir, contents);

        let mut index = OffsetIndex::empty(dir.path().join("test.offsets.log"), 4);
        index.rebuild(&log).unwrap();

        let expected: Vec<&str> = contents.lines().collect();
        assert_eq!(index.len(), expected.len());
        for (i, line) in expected.iter().enumerate() {
            assert_eq!(read_line_at(&log, index.get(i).unwrap()), *line);
        }
        assert!(index.verify(&log).unwrap());
    }

    #[test]
    fn test_rebuild_empty_and_missing_logs() {
        let dir = TempDir::new().unwrap();
        let mut index = OffsetIndex::empty(dir.path().join("e.offsets.log"), 8);

        index.rebuild(&write_log(&dir, "")).unwrap();
        assert!(index.is_empty());

        index.rebuild(&dir.path().join("missing.log")).unwrap();
        assert!(index.is_empty());
        assert_eq!(fs::read_to_string(index.path()).unwrap(), "");
    }

    #[test]
    fn test_verify_detects_mismatch() {
        let dir = TempDir::new().unwrap();
        let log = write_log(&dir, "one\ntwo\nthree\n");
        let mut index = OffsetIndex::empty(dir.path().join("test.offsets.log"), 8);
        index.append(0).unwrap();
        index.append(4).unwrap();

        assert!(!index.verify(&log).unwrap());
        index.rebuild(&log).unwrap();
        assert!(index.verify(&log).unwrap());
        assert_eq!(index.offsets(), &[0, 4, 8]);
    }

    #[test]
    fn test_rebuild_is_idempotent_on_consistent_index() {
        let dir = TempDir::new().unwrap();
        let log = write_log(&dir, "alpha\nbeta\ngamma\n");
        let mut index = OffsetIndex::empty(dir.path().join("test.offsets.log"), 16);
        index.rebuild(&log).unwrap();
        let before = fs::read_to_string(index.path()).unwrap();

        assert!(index.verify(&log).unwrap());
        index.rebuild(&log).unwrap();
        assert_eq!(fs::read_to_string(index.path()).unwrap(), before);
    }

    #[test]
    fn test_seed_is_consumed_by_first_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.offsets.log");
        let mut index = OffsetIndex::empty(&path, 64);
        index.append(0).unwrap();
        index.append(10).unwrap();

        index.reseed().unwrap();
        assert!(index.is_seeded());
        assert_eq!(fs::read_to_string(&path).unwrap(), "0\n");

        index.append(0).unwrap();
        index.append(25).unwrap();
        assert!(!index.is_seeded());
        assert_eq!(index.offsets(), &[0, 25]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "0\n25\n");
    }

    #[test]
    fn test_seed_survives_reload_while_log_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.offsets.log");
        let log = dir.path().join("s.log");
        OffsetIndex::empty(&path, 64).reseed().unwrap();

        let mut index = OffsetIndex::load(&path, 64).unwrap();
        assert!(index.resume_seed(&log).unwrap());
        assert!(index.is_seeded());

        fs::write(&log, "").unwrap();
        let mut index = OffsetIndex::load(&path, 64).unwrap();
        assert!(index.resume_seed(&log).unwrap());
        index.append(0).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0\n");

        // A log with content makes the lone zero a real entry
        fs::write(&log, "a\nb\n").unwrap();
        let mut index = OffsetIndex::load(&path, 64).unwrap();
        assert!(!index.resume_seed(&log).unwrap());
        assert!(!index.is_seeded());
    }
}
