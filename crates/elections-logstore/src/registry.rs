//! Scope-to-store routing
//!
//! A [`LogRegistry`] owns every [`LogStore`] of one log family (the main
//! audit log, or the vote log). Stores are opened on first reference and
//! shared for the life of the registry.

use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;

use dashmap::DashMap;
use elections_logging::context::RequestContextGuard;
use tracing::{debug, info, warn};

use crate::config::LogStoreConfig;
use crate::error::Result;
use crate::level::Severity;
use crate::logger::ScopedLogger;
use crate::record::LogRecord;
use crate::scope::ScopeKey;
use crate::store::{LogStore, SYSTEM_USER};

/// Lazily populated map of scope to store
#[derive(Debug)]
pub struct LogRegistry {
    config: LogStoreConfig,
    stores: DashMap<ScopeKey, Arc<LogStore>>,
}

impl LogRegistry {
    /// Create a registry after validating its configuration
    pub fn new(config: LogStoreConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.log_dir)?;
        info!(
            dir = %config.log_dir.display(),
            base = %config.base_name,
            "Log registry ready"
        );
        Ok(Self {
            config,
            stores: DashMap::new(),
        })
    }

    /// Registry for the vote-log family sharing this registry's settings
    pub fn vote_registry(&self) -> Result<Self> {
        Self::new(self.config.vote_log())
    }

    pub fn config(&self) -> &LogStoreConfig {
        &self.config
    }

    /// The store for `scope`, opening it on first use
    pub fn store(&self, scope: ScopeKey) -> Result<Arc<LogStore>> {
        if let Some(store) = self.stores.get(&scope) {
            return Ok(Arc::clone(store.value()));
        }

        let entry = self
            .stores
            .entry(scope)
            .or_try_insert_with(|| LogStore::open(scope, &self.config).map(Arc::new))?;
        Ok(Arc::clone(entry.value()))
    }

    /// Logger bound to `scope` acting as `user`
    pub fn logger(self: &Arc<Self>, scope: ScopeKey, user: impl Into<String>) -> ScopedLogger {
        ScopedLogger::new(Arc::clone(self), scope, user)
    }

    /// Logger acting as the current request's user, or `System`
    pub fn request_logger(self: &Arc<Self>, scope: ScopeKey) -> ScopedLogger {
        let user = RequestContextGuard::current_user().unwrap_or_else(|| SYSTEM_USER.to_string());
        self.logger(scope, user)
    }

    /// Write `record` to its own scope and, if `propagate`, every ancestor
    ///
    /// Every target is attempted; the first failure is returned.
    pub fn emit(&self, record: &LogRecord, propagate: bool) -> Result<()> {
        let mut targets = vec![record.scope];
        if propagate {
            targets.extend(record.scope.ancestors());
        }

        let mut first_error = None;
        for scope in targets {
            if let Err(e) = self.store(scope).and_then(|store| store.write_record(record)) {
                warn!(scope = %scope, error = %e, "Failed to write log record");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Reset every store opened so far, each followed by its cleared record
    pub fn reset_all(&self, user: &str) -> Result<()> {
        let stores: Vec<Arc<LogStore>> = self
            .stores
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for store in stores {
            store.reset()?;
            // Ancestors are being cleared too, so the notice stays local.
            store.write_record(&cleared_record(store.scope(), user, ""))?;
        }
        info!(base = %self.config.base_name, "Reset all logs");
        Ok(())
    }

    /// Scopes with an open store, sorted
    pub fn scopes(&self) -> Vec<ScopeKey> {
        let mut scopes: Vec<ScopeKey> = self.stores.iter().map(|entry| *entry.key()).collect();
        scopes.sort();
        scopes
    }

    /// Scopes that have a log file in the log directory, sorted
    pub fn discover_scopes(&self) -> Result<Vec<ScopeKey>> {
        let entries = match fs::read_dir(&self.config.log_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut scopes = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            if let Some(scope) = ScopeKey::from_log_file_name(&name.to_string_lossy(), &self.config.base_name) {
                scopes.push(scope);
            }
        }
        scopes.sort();
        debug!(count = scopes.len(), "Discovered log scopes");
        Ok(scopes)
    }
}

/// The record written right after a scope's log is cleared
pub(crate) fn cleared_record(scope: ScopeKey, user: &str, remote_addr: &str) -> LogRecord {
    LogRecord::new(
        Severity::Critical,
        scope,
        user,
        remote_addr,
        format!(
            "### Cleared log for club '{}', event '{}' ###",
            scope.club_id, scope.event_id
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> Arc<LogRegistry> {
        Arc::new(LogRegistry::new(LogStoreConfig::new(dir.path()).with_chunk_size(64)).unwrap())
    }

    #[test]
    fn test_store_is_shared() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        let a = registry.store(ScopeKey::event(1, 2)).unwrap();
        let b = registry.store(ScopeKey::event(1, 2)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.scopes(), vec![ScopeKey::event(1, 2)]);
    }

    #[test]
    fn test_emit_propagates_to_ancestors() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let record = LogRecord::new(Severity::Error, ScopeKey::event(1, 2), "u", "", "boom");

        registry.emit(&record, true).unwrap();

        for scope in [ScopeKey::event(1, 2), ScopeKey::club(1), ScopeKey::SYSTEM] {
            let store = registry.store(scope).unwrap();
            assert_eq!(store.line_count(false).unwrap(), 1, "scope {}", scope);
            let contents = fs::read_to_string(store.log_path()).unwrap();
            assert!(contents.contains(";1/2/u;"));
        }
    }

    #[test]
    fn test_emit_without_propagation_stays_local() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let record = LogRecord::new(Severity::Info, ScopeKey::club(5), "u", "", "quiet");

        registry.emit(&record, false).unwrap();
        assert_eq!(registry.scopes(), vec![ScopeKey::club(5)]);
    }

    #[test]
    fn test_discover_scopes() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        for scope in [ScopeKey::SYSTEM, ScopeKey::club(2), ScopeKey::event(2, 9)] {
            registry
                .emit(&LogRecord::new(Severity::Info, scope, "u", "", "x"), false)
                .unwrap();
        }
        fs::write(dir.path().join("unrelated.txt"), "x").unwrap();

        assert_eq!(
            registry.discover_scopes().unwrap(),
            vec![ScopeKey::SYSTEM, ScopeKey::club(2), ScopeKey::event(2, 9)]
        );
    }

    #[test]
    fn test_reset_all() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        for i in 0..3 {
            registry
                .emit(&LogRecord::new(Severity::Warning, ScopeKey::club(1), "u", "", format!("w{}", i)), true)
                .unwrap();
        }

        registry.reset_all("admin").unwrap();

        for scope in [ScopeKey::club(1), ScopeKey::SYSTEM] {
            let store = registry.store(scope).unwrap();
            assert_eq!(store.line_count(false).unwrap(), 1);
            assert!(store.verify().unwrap());
            let contents = fs::read_to_string(store.log_path()).unwrap();
            assert!(contents.contains("### Cleared log for club"));
        }
    }

    #[test]
    fn test_vote_registry_uses_its_own_files() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let votes = registry.vote_registry().unwrap();

        votes
            .emit(&LogRecord::new(Severity::Info, ScopeKey::event(1, 1), "u", "", "ballot"), false)
            .unwrap();
        assert!(dir.path().join("elections-votes.1.1.log").exists());
        assert!(!dir.path().join("elections.1.1.log").exists());
    }
}
