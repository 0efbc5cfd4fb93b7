//! Severity-leveled logging bound to one scope and acting user

use std::sync::Arc;

use elections_logging::context::RequestContextGuard;
use tracing::trace;

use crate::error::Result;
use crate::flash::{self, FlashOptions, FlashSink};
use crate::level::Severity;
use crate::record::LogRecord;
use crate::registry::{LogRegistry, cleared_record};
use crate::scope::ScopeKey;

/// Spaces of padding per indent level
const INDENT_WIDTH: usize = 3;

/// Per-call write options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Source address; falls back to the request context, then empty
    pub source_addr: Option<String>,
    /// Cosmetic indent level
    pub indent: usize,
    /// Override the severity's default propagation
    pub propagate: Option<bool>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_addr(mut self, addr: impl Into<String>) -> Self {
        self.source_addr = Some(addr.into());
        self
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_propagate(mut self, propagate: bool) -> Self {
        self.propagate = Some(propagate);
        self
    }
}

/// Writes records for one scope as one user
#[derive(Debug, Clone)]
pub struct ScopedLogger {
    registry: Arc<LogRegistry>,
    scope: ScopeKey,
    user: String,
}

impl ScopedLogger {
    pub fn new(registry: Arc<LogRegistry>, scope: ScopeKey, user: impl Into<String>) -> Self {
        Self {
            registry,
            scope,
            user: user.into(),
        }
    }

    pub fn scope(&self) -> ScopeKey {
        self.scope
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn registry(&self) -> &Arc<LogRegistry> {
        &self.registry
    }

    /// Write one record
    pub fn log(&self, severity: Severity, message: &str, options: WriteOptions) -> Result<()> {
        let remote_addr = options
            .source_addr
            .or_else(RequestContextGuard::current_remote_addr)
            .unwrap_or_default();
        let propagate = options
            .propagate
            .unwrap_or_else(|| severity.propagates_by_default());

        let text = format!("{:width$}{}", "", message, width = options.indent * INDENT_WIDTH);
        let record = LogRecord::new(severity, self.scope, self.user.as_str(), remote_addr, text);

        trace!(scope = %self.scope, severity = %severity, propagate, "Emitting record");
        self.registry.emit(&record, propagate)
    }

    pub fn debug(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(Severity::Debug, message.as_ref(), WriteOptions::default())
    }

    pub fn info(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(Severity::Info, message.as_ref(), WriteOptions::default())
    }

    pub fn warning(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(Severity::Warning, message.as_ref(), WriteOptions::default())
    }

    pub fn error(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(Severity::Error, message.as_ref(), WriteOptions::default())
    }

    pub fn critical(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(Severity::Critical, message.as_ref(), WriteOptions::default())
    }

    pub fn debug_with(&self, message: impl AsRef<str>, options: WriteOptions) -> Result<()> {
        self.log(Severity::Debug, message.as_ref(), options)
    }

    pub fn info_with(&self, message: impl AsRef<str>, options: WriteOptions) -> Result<()> {
        self.log(Severity::Info, message.as_ref(), options)
    }

    pub fn warning_with(&self, message: impl AsRef<str>, options: WriteOptions) -> Result<()> {
        self.log(Severity::Warning, message.as_ref(), options)
    }

    pub fn error_with(&self, message: impl AsRef<str>, options: WriteOptions) -> Result<()> {
        self.log(Severity::Error, message.as_ref(), options)
    }

    pub fn critical_with(&self, message: impl AsRef<str>, options: WriteOptions) -> Result<()> {
        self.log(Severity::Critical, message.as_ref(), options)
    }

    /// Clear this scope's log, then record who cleared it
    pub fn reset(&self) -> Result<()> {
        let store = self.registry.store(self.scope)?;
        store.reset()?;

        let remote_addr = RequestContextGuard::current_remote_addr().unwrap_or_default();
        let record = cleared_record(self.scope, &self.user, &remote_addr);
        self.registry.emit(&record, Severity::Critical.propagates_by_default())
    }

    /// Log a message and queue a notice for the user
    ///
    /// With `options.persist` off nothing is written anywhere; the notice is
    /// still queued.
    pub fn flashlog(
        &self,
        prefix: Option<&str>,
        message: &str,
        severity: Severity,
        options: FlashOptions,
        sink: &mut dyn FlashSink,
    ) -> Result<()> {
        let logged = flash::logged_text(prefix, message, &options);

        let written = if options.persist {
            self.log(
                flash::record_severity(severity),
                &logged,
                WriteOptions::default().with_propagate(options.propagate),
            )
        } else {
            Ok(())
        };

        sink.push(flash::notice(message, &logged, severity, &options));
        written
    }
}
