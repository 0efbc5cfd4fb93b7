//! Audit records and the line wire format
//!
//! Every record becomes one or more physical lines:
//!
//! ```text
//! MM-DD-YYYY HH:MM:SS.mmm;LEVEL   ;clubId/eventId/user;ipAddr;message
//! ```
//!
//! Embedded line breaks in the message are written as raw continuation
//! lines with no prefix, each of which is its own entry in the offset index.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::level::Severity;
use crate::scope::ScopeKey;

/// Timestamp layout of the first field
pub const TIMESTAMP_FORMAT: &str = "%m-%d-%Y %H:%M:%S%.3f";

/// A single audit record before formatting
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub scope: ScopeKey,
    pub user: String,
    pub remote_addr: String,
    pub message: String,
}

impl LogRecord {
    /// Create a record stamped with the current local time
    pub fn new(
        severity: Severity,
        scope: ScopeKey,
        user: impl Into<String>,
        remote_addr: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            scope,
            user: user.into(),
            remote_addr: remote_addr.into(),
            message: message.into(),
        }
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The formatted physical lines, without terminators
    pub fn physical_lines(&self) -> Vec<String> {
        let mut parts = self.message.split('\n').map(|part| part.trim_end_matches('\r'));
        let first = parts.next().unwrap_or_default();

        let mut lines = Vec::with_capacity(1 + self.message.matches('\n').count());
        lines.push(format!(
            "{};{:<8};{}/{}/{};{};{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.severity,
            self.scope.club_id,
            self.scope.event_id,
            single_line(&self.user),
            single_line(&self.remote_addr),
            first
        ));
        lines.extend(parts.map(str::to_string));
        lines
    }
}

/// Line breaks in a header field would forge an unindexed line
fn single_line(field: &str) -> std::borrow::Cow<'_, str> {
    if field.contains(['\n', '\r']) {
        field.replace(['\n', '\r'], " ").into()
    } else {
        field.into()
    }
}

/// A viewed line, split into its wire fields for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntryView {
    /// 1-based line number in the log file
    pub line_number: usize,
    pub date: String,
    pub time: String,
    pub level: Severity,
    pub club_id: String,
    pub event_id: String,
    pub user: String,
    pub remote_addr: String,
    pub message: String,
}

impl LogEntryView {
    /// Parse a raw line; lines that do not fit the format are shown as ERROR
    /// with the whole text in the message
    pub fn parse(line_number: usize, raw: &str) -> Self {
        Self::parse_fields(line_number, raw).unwrap_or_else(|| Self {
            line_number,
            date: String::new(),
            time: String::new(),
            level: Severity::Error,
            club_id: String::new(),
            event_id: String::new(),
            user: String::new(),
            remote_addr: String::new(),
            message: raw.to_string(),
        })
    }

    fn parse_fields(line_number: usize, raw: &str) -> Option<Self> {
        let mut fields = raw.splitn(5, ';');
        let (date, time) = fields.next()?.split_once(' ')?;
        let level = fields.next()?.parse().ok()?;
        let mut who = fields.next()?.splitn(3, '/');
        let club_id = who.next()?;
        let event_id = who.next()?;
        let user = who.next()?;
        let remote_addr = fields.next()?;
        let message = fields.next()?;

        Some(Self {
            line_number,
            date: date.to_string(),
            time: time.to_string(),
            level,
            club_id: club_id.to_string(),
            event_id: event_id.to_string(),
            user: user.to_string(),
            remote_addr: remote_addr.to_string(),
            message: message.to_string(),
        })
    }
}

/// Severity of a raw line as the viewer's filter sees it
pub fn line_severity(raw: &str) -> Severity {
    raw.split(';')
        .nth(1)
        .and_then(|level| level.parse().ok())
        .unwrap_or(Severity::Error)
}
