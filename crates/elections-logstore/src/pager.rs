//! Random-access paging over an indexed log
//!
//! Every candidate line is read by seeking straight to its indexed offset,
//! so a page costs at most a few page-sizes of reads no matter how large the
//! log is. The pager holds no state; callers keep the returned cursor and
//! hand it back on the next request.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{LogStoreError, Result};
use crate::level::Severity;
use crate::record::line_severity;

/// Browse intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    First,
    Last,
    Next,
    Prev,
    /// Jump to a 1-based line number
    Goto(usize),
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::First => f.write_str("first"),
            Direction::Last => f.write_str("last"),
            Direction::Next => f.write_str("next"),
            Direction::Prev => f.write_str("prev"),
            Direction::Goto(line) => write!(f, "goto {}", line),
        }
    }
}

impl FromStr for Direction {
    type Err = LogStoreError;

    /// Accepts the four browse words, or a line number as a goto
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(Direction::First),
            "last" => Ok(Direction::Last),
            "next" => Ok(Direction::Next),
            "prev" | "previous" => Ok(Direction::Prev),
            other => other
                .parse()
                .map(Direction::Goto)
                .map_err(|_| LogStoreError::config(format!("Unknown browse direction '{}'", s))),
        }
    }
}

/// One paging request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub direction: Direction,
    pub page_size: usize,
    /// Last line shown by the previous request (0-based)
    pub cursor: usize,
    /// Lines in the window the previous request returned; PREV skips that
    /// many matches. Defaults to a full page.
    pub shown: Option<usize>,
    pub min_severity: Option<Severity>,
    pub text_filter: Option<String>,
}

impl PageRequest {
    pub fn new(direction: Direction, page_size: usize) -> Self {
        Self {
            direction,
            page_size,
            cursor: 0,
            shown: None,
            min_severity: None,
            text_filter: None,
        }
    }

    pub fn with_cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_shown(mut self, shown: Option<usize>) -> Self {
        self.shown = shown;
        self
    }

    pub fn with_min_severity(mut self, severity: Option<Severity>) -> Self {
        self.min_severity = severity;
        self
    }

    /// Empty filters are treated as no filter
    pub fn with_text_filter(mut self, filter: Option<String>) -> Self {
        self.text_filter = filter.filter(|f| !f.is_empty());
        self
    }

    fn matches(&self, text: &str) -> bool {
        if let Some(min) = self.min_severity
            && line_severity(text) < min
        {
            return false;
        }
        match &self.text_filter {
            Some(filter) => text.contains(filter.as_str()),
            None => true,
        }
    }
}

/// A line returned in a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLine {
    /// 1-based line number
    pub line_number: usize,
    pub text: String,
}

/// Result of a paging request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub lines: Vec<PageLine>,
    /// Cursor to pass back with the next request
    pub cursor: usize,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.text.as_str()).collect()
    }
}

/// Fetch one page from an indexed log
///
/// `line_count` is capped to the length of `offsets`. Out-of-range cursors
/// are clamped, never rejected.
pub fn fetch_page<R: Read + Seek>(
    reader: R,
    offsets: &[u64],
    line_count: usize,
    request: &PageRequest,
) -> Result<Page> {
    let total = line_count.min(offsets.len());
    if total == 0 || request.page_size == 0 {
        return Ok(Page::default());
    }

    let last = total - 1;
    let page_size = request.page_size;
    let cursor = request.cursor.min(last);
    let direction = match request.direction {
        Direction::Next if cursor == last => Direction::Last,
        Direction::Prev if cursor == 0 => Direction::First,
        other => other,
    };

    let mut scanner = Scanner {
        reader: BufReader::new(reader),
        offsets,
        request,
        buf: Vec::new(),
    };

    let page = match direction {
        Direction::First => scanner.forward(0, last, page_size)?,
        Direction::Goto(line) => scanner.forward(line.saturating_sub(1).min(last), last, page_size)?,
        Direction::Next => scanner.forward(cursor + 1, last, page_size)?,
        Direction::Last => Page {
            lines: scanner.backward(last, page_size, 0)?,
            cursor: last,
        },
        Direction::Prev => {
            // The window ending at `cursor` is what the caller is looking at.
            let shown = request.shown.unwrap_or(page_size);
            let lines = scanner.backward(cursor, page_size, shown)?;
            let cursor = lines.last().map(|line| line.line_number - 1).unwrap_or(0);
            Page { lines, cursor }
        }
    };

    trace!(
        direction = %direction,
        lines = page.lines.len(),
        cursor = page.cursor,
        "Fetched page"
    );
    Ok(page)
}

/// Fetch one page from a log file on disk; a missing file is an empty page
pub fn fetch_page_from_file(
    log_path: &Path,
    offsets: &[u64],
    line_count: usize,
    request: &PageRequest,
) -> Result<Page> {
    match File::open(log_path) {
        Ok(file) => fetch_page(file, offsets, line_count, request),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Page::default()),
        Err(e) => Err(e.into()),
    }
}

struct Scanner<'a, R> {
    reader: BufReader<R>,
    offsets: &'a [u64],
    request: &'a PageRequest,
    buf: Vec<u8>,
}

impl<R: Read + Seek> Scanner<'_, R> {
    /// Scan `start..=last`; the cursor is the last line examined
    fn forward(&mut self, start: usize, last: usize, page_size: usize) -> Result<Page> {
        let mut lines = Vec::new();
        let mut examined = start;

        for line in start..=last {
            examined = line;
            if let Some(page_line) = self.matching_line(line)? {
                lines.push(page_line);
                if lines.len() == page_size {
                    break;
                }
            }
        }

        Ok(Page {
            lines,
            cursor: examined,
        })
    }

    /// Scan `from` down to 0, skipping the first `skip` matches
    fn backward(&mut self, from: usize, page_size: usize, skip: usize) -> Result<Vec<PageLine>> {
        let mut lines = Vec::new();
        let mut skipped = 0;

        for line in (0..=from).rev() {
            if let Some(page_line) = self.matching_line(line)? {
                if skipped < skip {
                    skipped += 1;
                    continue;
                }
                lines.push(page_line);
                if lines.len() == page_size {
                    break;
                }
            }
        }

        lines.reverse();
        Ok(lines)
    }

    fn matching_line(&mut self, line: usize) -> Result<Option<PageLine>> {
        let Some(text) = self.read_line(line)? else {
            return Ok(None);
        };
        if !self.request.matches(&text) {
            return Ok(None);
        }
        Ok(Some(PageLine {
            line_number: line + 1,
            text,
        }))
    }

    /// Read the line at `offsets[line]`; `None` past end of file
    fn read_line(&mut self, line: usize) -> Result<Option<String>> {
        let Some(&offset) = self.offsets.get(line) else {
            return Ok(None);
        };

        self.reader.seek(SeekFrom::Start(offset))?;
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }

        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}
