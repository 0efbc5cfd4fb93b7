use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::level::{Severity, SeverityFilter};
use crate::pager::Direction;
use crate::scope::ScopeKey;

#[derive(Parser)]
#[command(name = "logview", about = "Browse and maintain per-scope election audit logs")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Log directory (overrides the configuration file)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
    /// Work on the vote log family instead of the main audit log
    #[arg(long, global = true)]
    pub votes: bool,
    /// Write diagnostics as daily JSON files here instead of to stderr
    #[arg(long, global = true)]
    pub diag_dir: Option<PathBuf>,
    /// Diagnostic level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show one page of a scope's log
    Show {
        /// Scope as club/event, or a bare club id
        #[arg(long, default_value = "0/0")]
        scope: ScopeKey,
        /// first, last, next, prev
        #[arg(long, default_value = "first")]
        browse: Direction,
        /// Jump to a 1-based line number
        #[arg(long)]
        goto: Option<usize>,
        /// Minimum severity to show: a name, all, or 0-4
        #[arg(long)]
        level: Option<SeverityFilter>,
        /// Only lines containing this text
        #[arg(long)]
        filter: Option<String>,
        /// Lines per page (defaults to the configured page size)
        #[arg(long)]
        page_size: Option<usize>,
        /// JSON file holding the cursor between invocations
        #[arg(long)]
        session: Option<PathBuf>,
    },
    /// Append a record to a scope's log
    Write {
        #[arg(long, default_value = "0/0")]
        scope: ScopeKey,
        #[arg(long, default_value = "info")]
        level: Severity,
        /// Acting user
        #[arg(long, default_value = "System")]
        user: String,
        /// Source address
        #[arg(long)]
        addr: Option<String>,
        /// Force propagation to ancestor scopes on or off
        #[arg(long)]
        propagate: Option<bool>,
        /// Message text
        message: String,
    },
    /// Clear a scope's log, archiving the current generation
    Reset {
        #[arg(long, default_value = "0/0", conflicts_with = "all")]
        scope: ScopeKey,
        /// Clear every scope found in the log directory
        #[arg(long)]
        all: bool,
        #[arg(long, default_value = "System")]
        user: String,
    },
    /// Check a scope's offset index against its log
    Verify {
        #[arg(long, default_value = "0/0")]
        scope: ScopeKey,
        /// Rebuild the index even if it looks consistent
        #[arg(long)]
        rebuild: bool,
    },
}
