//! # Elections Log Store
//!
//! Per-scope rotating audit logs with random-access paging.
//!
//! Every scope (the system, a club, or an event within a club) gets its own
//! plaintext log plus an offset index holding the byte position of each
//! line. The index lets a viewer jump straight to any page of a very large
//! log while writers keep appending and rotating it.
//!
//! ## Features
//!
//! - **OffsetIndex**: persisted line offsets with verify and chunked rebuild
//! - **RotationManager**: size-triggered rotation into a `.N.zip` chain
//! - **LogStore**: one locked (log, index, rotation) triple per scope
//! - **LogRegistry / ScopedLogger**: lazy store lookup and ancestor propagation
//! - **PageReader**: stateless FIRST/LAST/NEXT/PREV/GOTO paging with filters
//! - **LogViewer**: the operator browse flow on top of the pager
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use elections_logstore::{LogRegistry, LogStoreConfig, ScopeKey};
//!
//! let registry = Arc::new(LogRegistry::new(LogStoreConfig::new("./log"))?);
//! let logger = registry.logger(ScopeKey::event(3, 7), "alice");
//!
//! logger.info("Ballot opened")?;
//! // Warnings and above also reach the club and system logs
//! logger.warning("Late ballot rejected")?;
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod flash;
pub mod index;
pub mod level;
pub mod logger;
pub mod pager;
pub mod record;
pub mod registry;
pub mod rotation;
pub mod scope;
pub mod store;
pub mod viewer;

// Re-exports
pub use config::LogStoreConfig;
pub use error::{LogStoreError, Result};
pub use flash::{FlashNotice, FlashOptions, FlashSink};
pub use index::{OffsetIndex, count_lines};
pub use level::{Severity, SeverityFilter};
pub use logger::{ScopedLogger, WriteOptions};
pub use pager::{Direction, Page, PageLine, PageRequest, fetch_page, fetch_page_from_file};
pub use record::{LogEntryView, LogRecord};
pub use registry::LogRegistry;
pub use rotation::RotationManager;
pub use scope::ScopeKey;
pub use store::LogStore;
pub use viewer::{BrowseRequest, LogViewer, ViewPage, ViewSession};
