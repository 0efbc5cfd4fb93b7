//! User-facing flash notices
//!
//! A notice is what the person at the browser sees; the matching audit
//! record (if any) is written separately by [`ScopedLogger::flashlog`].
//!
//! [`ScopedLogger::flashlog`]: crate::logger::ScopedLogger::flashlog

use serde::{Deserialize, Serialize};

use crate::level::Severity;

/// A queued notice: display category plus text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashNotice {
    pub category: String,
    pub text: String,
}

/// Destination for notices, usually the caller's session message queue
pub trait FlashSink {
    fn push(&mut self, notice: FlashNotice);
}

impl FlashSink for Vec<FlashNotice> {
    fn push(&mut self, notice: FlashNotice) {
        Vec::push(self, notice);
    }
}

/// Presentation and persistence switches for a flashed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashOptions {
    /// Bold display
    pub highlight: bool,
    /// Indented display, and a `-> ` marker in the logged text
    pub indent: bool,
    pub large: bool,
    /// Also write the record to ancestor scopes
    pub propagate: bool,
    /// Write the audit record at all; off for anything that must stay
    /// anonymous, such as ballot selections
    pub persist: bool,
}

impl Default for FlashOptions {
    fn default() -> Self {
        Self {
            highlight: true,
            indent: false,
            large: false,
            propagate: false,
            persist: true,
        }
    }
}

impl FlashOptions {
    /// Show the notice but keep it out of every log
    pub fn display_only() -> Self {
        Self {
            persist: false,
            ..Self::default()
        }
    }

    pub fn with_highlight(mut self, highlight: bool) -> Self {
        self.highlight = highlight;
        self
    }

    pub fn with_indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_large(mut self, large: bool) -> Self {
        self.large = large;
        self
    }

    pub fn with_propagate(mut self, propagate: bool) -> Self {
        self.propagate = propagate;
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }
}

/// Text written to the audit log for a flashed message
pub(crate) fn logged_text(prefix: Option<&str>, message: &str, options: &FlashOptions) -> String {
    let marker = if options.indent { "-> " } else { "" };
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}-> {}: {}", marker, prefix, message),
        _ => format!("{}-> {}", marker, message),
    }
}

/// Severity the audit record is written at
pub(crate) fn record_severity(severity: Severity) -> Severity {
    match severity {
        Severity::Error | Severity::Warning => severity,
        _ => Severity::Info,
    }
}

/// Build the notice shown to the user
pub(crate) fn notice(message: &str, logged: &str, severity: Severity, options: &FlashOptions) -> FlashNotice {
    let mut category = severity.as_str().to_ascii_lowercase();
    if options.highlight {
        category.push_str("-bold");
    }
    if options.large {
        category.push_str("-large");
    }
    if options.indent {
        category.push_str("-indent");
    }
    if message.is_empty() {
        category.push_str("-blank");
    }

    // Any suffix on the category, blank included, shows the bare message.
    let plain_problem = matches!(severity, Severity::Error | Severity::Warning) && !category.contains('-');
    let text = if plain_problem { logged } else { message };

    FlashNotice {
        category,
        text: text.to_string(),
    }
}
