//! Record severities

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogStoreError;

/// Severity of an audit record, ordered from least to most significant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// All severities in ascending order
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    /// Wire name, as written in the LEVEL field
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Whether records of this severity reach ancestor scopes by default
    pub fn propagates_by_default(&self) -> bool {
        *self >= Severity::Warning
    }

    /// Map the viewer's numeric level selector to a minimum severity
    ///
    /// `0` means "show everything" and yields `None`; indices past the end
    /// clamp to `Critical`.
    pub fn from_filter_index(index: usize) -> Option<Severity> {
        match index {
            0 => None,
            n => Some(Self::ALL[n.min(Self::ALL.len() - 1)]),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Honors width/alignment so the writer can pad the LEVEL field
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = LogStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" => Ok(Severity::Critical),
            _ => Err(LogStoreError::invalid_severity(s)),
        }
    }
}

/// Viewer level selector: a severity name, `all`, or the numeric index
/// accepted by [`Severity::from_filter_index`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityFilter(Option<Severity>);

impl SeverityFilter {
    /// Minimum severity to show; `None` shows everything
    pub fn min_severity(&self) -> Option<Severity> {
        self.0
    }
}

impl FromStr for SeverityFilter {
    type Err = LogStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self(None));
        }
        match s.parse::<usize>() {
            Ok(index) => Ok(Self(Severity::from_filter_index(index))),
            Err(_) => s.parse().map(|severity| Self(Some(severity))),
        }
    }
}
