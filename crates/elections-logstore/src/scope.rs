//! Scope keys: which tenant a log belongs to

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogStoreError;

/// Identifies one log: the system, a club, or an event within a club
///
/// `(0, 0)` is the system scope, `(club, 0)` a club scope, and
/// `(club, event)` an event scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub club_id: u32,
    pub event_id: u32,
}

impl ScopeKey {
    /// The root scope
    pub const SYSTEM: ScopeKey = ScopeKey {
        club_id: 0,
        event_id: 0,
    };

    pub fn system() -> Self {
        Self::SYSTEM
    }

    pub fn club(club_id: u32) -> Self {
        Self {
            club_id,
            event_id: 0,
        }
    }

    pub fn event(club_id: u32, event_id: u32) -> Self {
        Self { club_id, event_id }
    }

    pub fn is_system(&self) -> bool {
        self.club_id == 0 && self.event_id == 0
    }

    pub fn is_club(&self) -> bool {
        self.club_id != 0 && self.event_id == 0
    }

    pub fn is_event(&self) -> bool {
        self.event_id != 0
    }

    /// Next scope up the hierarchy: event -> club -> system
    pub fn parent(&self) -> Option<ScopeKey> {
        if self.is_system() {
            None
        } else if self.is_event() && self.club_id != 0 {
            Some(ScopeKey::club(self.club_id))
        } else {
            Some(ScopeKey::SYSTEM)
        }
    }

    /// Every ancestor, nearest first
    pub fn ancestors(&self) -> impl Iterator<Item = ScopeKey> {
        std::iter::successors(self.parent(), |scope| scope.parent())
    }

    /// File stem for this scope within a log family
    pub fn file_stem(&self, base_name: &str) -> String {
        if self.is_system() {
            base_name.to_string()
        } else if self.event_id == 0 {
            format!("{}.{}", base_name, self.club_id)
        } else {
            format!("{}.{}.{}", base_name, self.club_id, self.event_id)
        }
    }

    /// Path of the plaintext log file
    pub fn log_path(&self, dir: &Path, base_name: &str) -> PathBuf {
        dir.join(format!("{}.log", self.file_stem(base_name)))
    }

    /// Path of the offset index file paired with the log
    pub fn index_path(&self, dir: &Path, base_name: &str) -> PathBuf {
        dir.join(format!("{}.offsets.log", self.file_stem(base_name)))
    }

    /// Recover a scope from a log file name such as `elections.3.7.log`
    ///
    /// Index files and backups return `None`.
    pub fn from_log_file_name(file_name: &str, base_name: &str) -> Option<ScopeKey> {
        let stem = file_name.strip_suffix(".log")?;
        if stem.ends_with(".offsets") {
            return None;
        }
        if stem == base_name {
            return Some(ScopeKey::SYSTEM);
        }
        let rest = stem.strip_prefix(base_name)?.strip_prefix('.')?;
        let mut parts = rest.split('.');
        let club_id = parts.next()?.parse().ok()?;
        let event_id = match parts.next() {
            Some(event) => event.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(ScopeKey { club_id, event_id })
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.club_id, self.event_id)
    }
}

impl FromStr for ScopeKey {
    type Err = LogStoreError;

    /// Accepts `club/event`, or a bare `club`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| LogStoreError::invalid_scope(s))
        };
        match s.split_once('/') {
            Some((club, event)) => Ok(ScopeKey::event(parse(club)?, parse(event)?)),
            None => Ok(ScopeKey::club(parse(s)?)),
        }
    }
}
