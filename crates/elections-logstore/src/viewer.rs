//! Operator browse flow over one store
//!
//! Wraps the pager with what a viewing session needs: a persisted cursor,
//! goto handling, one retry after an empty page, and display parsing.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LogStoreError, Result};
use crate::level::Severity;
use crate::pager::{Direction, Page, PageRequest};
use crate::record::LogEntryView;
use crate::scope::ScopeKey;
use crate::store::LogStore;

/// Per-session paging state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSession {
    /// Last line shown (0-based); `None` before the first page
    pub cursor: Option<usize>,
    /// Lines on the page ending at `cursor`
    #[serde(default)]
    pub shown: Option<usize>,
}

impl ViewSession {
    /// Load a session file; a missing file is a fresh session
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| LogStoreError::config(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string(self)
            .map_err(|e| LogStoreError::config(format!("Cannot encode session: {}", e)))?;
        fs::write(path, text)?;
        Ok(())
    }
}

/// What the operator asked to see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseRequest {
    pub direction: Direction,
    /// 1-based line to jump to; overrides `direction`
    pub goto_line: Option<usize>,
    pub min_severity: Option<Severity>,
    pub text_filter: Option<String>,
}

impl BrowseRequest {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            goto_line: None,
            min_severity: None,
            text_filter: None,
        }
    }

    pub fn with_goto(mut self, line: Option<usize>) -> Self {
        self.goto_line = line;
        self
    }

    pub fn with_min_severity(mut self, severity: Option<Severity>) -> Self {
        self.min_severity = severity;
        self
    }

    pub fn with_text_filter(mut self, filter: Option<String>) -> Self {
        self.text_filter = filter;
        self
    }
}

/// A page ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPage {
    pub scope: ScopeKey,
    pub entries: Vec<LogEntryView>,
    pub cursor: usize,
    pub line_count: usize,
}

/// Browses one store with a fixed page size
#[derive(Debug)]
pub struct LogViewer<'a> {
    store: &'a LogStore,
    page_size: usize,
}

impl<'a> LogViewer<'a> {
    pub fn new(store: &'a LogStore, page_size: usize) -> Self {
        Self { store, page_size }
    }

    /// Fetch the requested page and advance the session cursor
    pub fn browse(&self, session: &mut ViewSession, request: &BrowseRequest) -> Result<ViewPage> {
        if self.store.is_degraded()
            && let Err(e) = self.store.retry_rebuild()
        {
            warn!(scope = %self.store.scope(), error = %e, "Browsing a degraded log");
        }

        let direction = match request.goto_line {
            Some(line) => Direction::Goto(line),
            None => request.direction,
        };
        // A session that has not shown anything yet starts at the top.
        let (direction, cursor) = match (direction, session.cursor) {
            (Direction::Next | Direction::Prev, None) => (Direction::First, 0),
            (direction, cursor) => (direction, cursor.unwrap_or(0)),
        };

        let mut page = self.fetch(direction, cursor, session.shown, request)?;
        if page.is_empty() {
            // Either everything near the boundary was filtered out or the
            // log rotated under us; a fresh snapshot gets one more try.
            let retry = match direction {
                Direction::First | Direction::Goto(_) => Direction::Next,
                other => other,
            };
            debug!(scope = %self.store.scope(), direction = %retry, cursor = page.cursor, "Retrying empty page");
            page = self.fetch(retry, page.cursor, session.shown, request)?;
        }

        let line_count = self.store.line_count(true)?;
        let cursor = if direction == Direction::Last {
            line_count.saturating_sub(1)
        } else {
            page.cursor
        };
        session.cursor = Some(cursor);
        session.shown = Some(page.lines.len());

        let entries = page
            .lines
            .iter()
            .map(|line| LogEntryView::parse(line.line_number, &line.text))
            .collect();

        Ok(ViewPage {
            scope: self.store.scope(),
            entries,
            cursor,
            line_count,
        })
    }

    fn fetch(
        &self,
        direction: Direction,
        cursor: usize,
        shown: Option<usize>,
        request: &BrowseRequest,
    ) -> Result<Page> {
        let page_request = PageRequest::new(direction, self.page_size)
            .with_cursor(cursor)
            .with_shown(shown)
            .with_min_severity(request.min_severity)
            .with_text_filter(request.text_filter.clone());
        self.store.fetch_page(&page_request)
    }
}
