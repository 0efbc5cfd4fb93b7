//! End-to-end behavior of stores, routing, and paging on real files

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use elections_logging::RequestContextGuard;
use elections_logstore::{
    BrowseRequest, Direction, FlashNotice, FlashOptions, LogRegistry, LogStoreConfig, LogViewer,
    PageRequest, ScopeKey, Severity, ViewSession, WriteOptions,
};
use tempfile::TempDir;

fn registry_with(config: LogStoreConfig) -> Arc<LogRegistry> {
    Arc::new(LogRegistry::new(config).unwrap())
}

fn registry(dir: &TempDir) -> Arc<LogRegistry> {
    registry_with(LogStoreConfig::new(dir.path()).with_chunk_size(16))
}

fn read_log(registry: &LogRegistry, scope: ScopeKey) -> String {
    let store = registry.store(scope).unwrap();
    fs::read_to_string(store.log_path()).unwrap_or_default()
}

fn read_backup(path: &Path) -> String {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_index(0).unwrap();
    let mut contents = String::new();
    entry.read_to_string(&mut contents).unwrap();
    contents
}

/// Record numbers from lines ending in `record N`
fn record_numbers(contents: &str) -> Vec<usize> {
    contents
        .lines()
        .filter_map(|line| line.rsplit_once("record ").and_then(|(_, n)| n.parse().ok()))
        .collect()
}

// ============================================================================
// Write Invariants
// ============================================================================

#[test]
fn test_three_record_scenario() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);
    let logger = registry.logger(ScopeKey::SYSTEM, "System");

    logger.info("A").unwrap();
    logger.info("B").unwrap();
    logger.critical("C").unwrap();

    let store = registry.store(ScopeKey::SYSTEM).unwrap();
    assert_eq!(store.line_count(false).unwrap(), 3);
    assert_eq!(store.line_count(true).unwrap(), 3);

    let contents = read_log(&registry, ScopeKey::SYSTEM);
    let lengths: Vec<u64> = contents.split_inclusive('\n').map(|l| l.len() as u64).collect();
    assert_eq!(store.offsets(), vec![0, lengths[0], lengths[0] + lengths[1]]);

    let first = store.fetch_page(&PageRequest::new(Direction::First, 2)).unwrap();
    assert_eq!(first.cursor, 1);
    let texts = first.texts();
    assert!(texts[0].ends_with(";A"));
    assert!(texts[1].ends_with(";B"));

    let next = store
        .fetch_page(&PageRequest::new(Direction::Next, 2).with_cursor(first.cursor))
        .unwrap();
    assert_eq!(next.cursor, 2);
    assert_eq!(next.lines.len(), 1);
    assert!(next.lines[0].text.ends_with(";C"));
}

#[test]
fn test_many_writes_keep_counts_equal() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);
    let logger = registry.logger(ScopeKey::club(9), "u");

    for i in 0..50 {
        let message = if i % 7 == 0 {
            format!("multi {}\n  second\n\n  fourth", i)
        } else {
            format!("single {}", i)
        };
        logger.info(message).unwrap();
    }

    let store = registry.store(ScopeKey::club(9)).unwrap();
    let offsets = store.offsets();
    assert_eq!(store.line_count(false).unwrap(), offsets.len());
    assert_eq!(store.line_count(true).unwrap(), offsets.len());
    assert_eq!(offsets[0], 0);
    assert!(offsets.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_line_breaks_in_user_or_address_cannot_forge_lines() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);
    let logger = registry.logger(ScopeKey::club(1), "mallory\nadmin");

    {
        let _guard = RequestContextGuard::new("mallory", "1.2.3.4\nforged");
        logger.info("hello").unwrap();
    }
    logger
        .info_with("again", WriteOptions::new().with_source_addr("5.6.7.8\r\nforged"))
        .unwrap();

    let store = registry.store(ScopeKey::club(1)).unwrap();
    assert_eq!(store.line_count(false).unwrap(), 2);
    assert_eq!(store.offsets().len(), 2);
    assert!(store.verify().unwrap());

    let text = read_log(&registry, ScopeKey::club(1));
    assert!(text.contains(";1/0/mallory admin;1.2.3.4 forged;hello\n"));
    assert!(text.contains(";1/0/mallory admin;5.6.7.8  forged;again\n"));
}

// ============================================================================
// Propagation
// ============================================================================

#[test]
fn test_default_propagation_by_severity() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);
    let logger = registry.logger(ScopeKey::event(2, 5), "u");

    logger.debug("debug-msg").unwrap();
    logger.info("info-msg").unwrap();
    logger.warning("warning-msg").unwrap();
    logger.error("error-msg").unwrap();
    logger.critical("critical-msg").unwrap();

    let event = read_log(&registry, ScopeKey::event(2, 5));
    assert_eq!(event.lines().count(), 5);

    for ancestor in [ScopeKey::club(2), ScopeKey::SYSTEM] {
        let text = read_log(&registry, ancestor);
        assert!(!text.contains("debug-msg"));
        assert!(!text.contains("info-msg"));
        assert!(text.contains(";2/5/u;;warning-msg"));
        assert!(text.contains("error-msg"));
        assert!(text.contains("critical-msg"));
    }
}

#[test]
fn test_request_context_supplies_address() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);
    let logger = registry.logger(ScopeKey::club(1), "frank");

    {
        let _guard = RequestContextGuard::new("frank", "198.51.100.2");
        logger.info("with context").unwrap();
        logger
            .info_with("explicit", WriteOptions::new().with_source_addr("10.1.1.1"))
            .unwrap();
    }
    logger.info("without context").unwrap();

    let text = read_log(&registry, ScopeKey::club(1));
    assert!(text.contains(";1/0/frank;198.51.100.2;with context"));
    assert!(text.contains(";1/0/frank;10.1.1.1;explicit"));
    assert!(text.contains(";1/0/frank;;without context"));
}

// ============================================================================
// Flash Notices
// ============================================================================

#[test]
fn test_display_only_flash_never_touches_disk() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);
    let logger = registry.logger(ScopeKey::event(3, 3), "voter");
    let mut notices: Vec<FlashNotice> = Vec::new();

    logger
        .flashlog(
            Some("Your ballot"),
            "Candidate X",
            Severity::Info,
            FlashOptions::display_only(),
            &mut notices,
        )
        .unwrap();

    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].text, "Candidate X");
    assert!(!dir.path().join("elections.3.3.log").exists());
    assert!(!dir.path().join("elections.3.log").exists());
    assert!(!dir.path().join("elections.log").exists());
}

#[test]
fn test_flash_propagates_only_when_asked() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);
    let logger = registry.logger(ScopeKey::event(3, 4), "admin");
    let mut notices: Vec<FlashNotice> = Vec::new();

    logger
        .flashlog(None, "quiet error", Severity::Error, FlashOptions::default(), &mut notices)
        .unwrap();
    logger
        .flashlog(
            None,
            "loud error",
            Severity::Error,
            FlashOptions::default().with_propagate(true),
            &mut notices,
        )
        .unwrap();

    let event = read_log(&registry, ScopeKey::event(3, 4));
    assert!(event.contains(";ERROR   ;3/4/admin;;-> quiet error"));
    let club = read_log(&registry, ScopeKey::club(3));
    assert!(!club.contains("quiet error"));
    assert!(club.contains("-> loud error"));
}

// ============================================================================
// Rotation and Reset
// ============================================================================

#[test]
fn test_rotation_keeps_most_recent_generations() {
    let dir = TempDir::new().unwrap();
    let config = LogStoreConfig::new(dir.path())
        .with_chunk_size(16)
        .with_max_file_size(300)
        .with_max_backups(2);
    let registry = registry_with(config);
    let logger = registry.logger(ScopeKey::club(4), "u");

    for i in 10..60 {
        logger.info(format!("record {}", i)).unwrap();
    }

    let store = registry.store(ScopeKey::club(4)).unwrap();
    let backups = store.backups();
    assert_eq!(backups.len(), 2);
    assert!(!dir.path().join("elections.4.log.3.zip").exists());

    let newest = record_numbers(&read_backup(&backups[0]));
    let older = record_numbers(&read_backup(&backups[1]));
    let active = record_numbers(&read_log(&registry, ScopeKey::club(4)));

    assert!(!newest.is_empty());
    assert!(!older.is_empty());
    assert!(older.iter().max() < newest.iter().min());
    if let Some(first_active) = active.first() {
        assert_eq!(*first_active, newest.iter().max().unwrap() + 1);
    }
    let highest = active.last().or(newest.iter().max()).copied();
    assert_eq!(highest, Some(59));

    assert!(store.verify().unwrap());
    assert_eq!(store.offsets().len(), active.len());
}

#[test]
fn test_reset_leaves_one_line_store() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);
    let logger = registry.logger(ScopeKey::club(8), "admin");
    for i in 0..5 {
        logger.info(format!("record {}", i)).unwrap();
    }

    logger.reset().unwrap();

    let store = registry.store(ScopeKey::club(8)).unwrap();
    assert_eq!(store.line_count(false).unwrap(), 1);
    assert_eq!(store.offsets(), vec![0]);
    assert!(store.verify().unwrap());
    assert_eq!(record_numbers(&read_backup(&store.backups()[0])), vec![0, 1, 2, 3, 4]);

    let page = store.fetch_page(&PageRequest::new(Direction::First, 10)).unwrap();
    assert!(page.lines[0].text.contains(";CRITICAL;8/0/admin;;### Cleared log for club '8', event '0' ###"));
}

// ============================================================================
// Restart and Viewing
// ============================================================================

#[test]
fn test_restart_rebuilds_truncated_index() {
    let dir = TempDir::new().unwrap();
    {
        let registry = registry(&dir);
        let logger = registry.logger(ScopeKey::SYSTEM, "System");
        for i in 0..10 {
            logger.info(format!("record {}", i)).unwrap();
        }
    }

    fs::write(dir.path().join("elections.offsets.log"), "0\n60\n").unwrap();

    let registry = registry(&dir);
    let store = registry.store(ScopeKey::SYSTEM).unwrap();
    assert!(store.verify().unwrap());
    assert!(!store.is_degraded());
    assert_eq!(store.offsets().len(), 11);

    let viewer = LogViewer::new(&store, 3);
    let mut session = ViewSession::default();
    let page = viewer
        .browse(&mut session, &BrowseRequest::new(Direction::Last))
        .unwrap();
    assert_eq!(page.entries.last().unwrap().message, "Rebuilt file offsets list");
    assert_eq!(page.entries.last().unwrap().level, Severity::Critical);
    assert_eq!(session.cursor, Some(10));
}

#[test]
fn test_unwritable_index_degrades_then_recovers_on_browse() {
    let dir = TempDir::new().unwrap();
    {
        let registry = registry(&dir);
        let logger = registry.logger(ScopeKey::SYSTEM, "System");
        for i in 0..4 {
            logger.info(format!("record {}", i)).unwrap();
        }
    }

    // A directory where the index belongs can be neither read nor replaced
    let index_path = dir.path().join("elections.offsets.log");
    fs::remove_file(&index_path).unwrap();
    fs::create_dir(&index_path).unwrap();

    let registry = registry(&dir);
    let store = registry.store(ScopeKey::SYSTEM).unwrap();
    assert!(store.is_degraded());

    fs::remove_dir(&index_path).unwrap();

    let viewer = LogViewer::new(&store, 10);
    let mut session = ViewSession::default();
    let page = viewer
        .browse(&mut session, &BrowseRequest::new(Direction::First))
        .unwrap();
    assert!(!store.is_degraded());
    assert!(store.verify().unwrap());
    let messages: Vec<&str> = page.entries.iter().map(|entry| entry.message.as_str()).collect();
    assert_eq!(messages, vec!["record 0", "record 1", "record 2", "record 3"]);
}

#[test]
fn test_continuation_lines_render_as_error() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);
    let logger = registry.logger(ScopeKey::club(2), "u");
    logger.info("Import report:\n  row 4 skipped").unwrap();

    let store = registry.store(ScopeKey::club(2)).unwrap();
    let viewer = LogViewer::new(&store, 10);
    let mut session = ViewSession::default();
    let page = viewer
        .browse(&mut session, &BrowseRequest::new(Direction::First))
        .unwrap();

    assert_eq!(page.entries.len(), 2);
    assert_eq!(page.entries[0].level, Severity::Info);
    assert_eq!(page.entries[0].message, "Import report:");
    assert_eq!(page.entries[1].level, Severity::Error);
    assert_eq!(page.entries[1].message, "  row 4 skipped");
    assert_eq!(page.entries[1].line_number, 2);
}

#[test]
fn test_error_filter_returns_only_errors() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);
    let logger = registry.logger(ScopeKey::club(6), "u");
    for (i, severity) in Severity::ALL.iter().cycle().take(20).enumerate() {
        logger
            .log(*severity, &format!("record {}", i), WriteOptions::new().with_propagate(false))
            .unwrap();
    }

    let store = registry.store(ScopeKey::club(6)).unwrap();
    let viewer = LogViewer::new(&store, 50);
    let mut session = ViewSession::default();
    let request = BrowseRequest::new(Direction::First).with_min_severity(Some(Severity::Error));
    let page = viewer.browse(&mut session, &request).unwrap();

    assert_eq!(page.entries.len(), 8);
    assert!(page.entries.iter().all(|entry| entry.level >= Severity::Error));
}
