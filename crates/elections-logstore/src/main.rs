use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use elections_logging::{LogConfig, SubscriberBuilder};
use elections_logstore::cli::{Cli, Command};
use elections_logstore::{
    BrowseRequest, LogEntryView, LogRegistry, LogStoreConfig, LogViewer, ViewPage, ViewSession,
    WriteOptions,
};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let diagnostics = match &cli.diag_dir {
        Some(dir) => LogConfig::production(dir.clone()),
        None => LogConfig::default(),
    };
    let _guard = SubscriberBuilder::new()
        .with_config(diagnostics)
        .with_level(&cli.log_level)
        .init();

    let mut config = match &cli.config {
        Some(path) => LogStoreConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => LogStoreConfig::default(),
    };
    if let Some(dir) = cli.log_dir {
        config.log_dir = dir;
    }
    if cli.votes {
        config = config.vote_log();
    }
    let registry = Arc::new(LogRegistry::new(config)?);

    match cli.command {
        Command::Show {
            scope,
            browse,
            goto,
            level,
            filter,
            page_size,
            session,
        } => {
            let store = registry.store(scope)?;
            let mut state = match &session {
                Some(path) => ViewSession::load(path)?,
                None => ViewSession::default(),
            };

            let page_size = page_size.unwrap_or(registry.config().page_size);
            let request = BrowseRequest::new(browse)
                .with_goto(goto)
                .with_min_severity(level.and_then(|filter| filter.min_severity()))
                .with_text_filter(filter);
            let page = LogViewer::new(&store, page_size).browse(&mut state, &request)?;
            print_page(&page);

            if let Some(path) = &session {
                state
                    .save(path)
                    .with_context(|| format!("Failed to save session to {}", path.display()))?;
            }
        }

        Command::Write {
            scope,
            level,
            user,
            addr,
            propagate,
            message,
        } => {
            let mut options = WriteOptions::new();
            if let Some(addr) = addr {
                options = options.with_source_addr(addr);
            }
            if let Some(propagate) = propagate {
                options = options.with_propagate(propagate);
            }
            registry.logger(scope, user).log(level, &message, options)?;
        }

        Command::Reset { scope, all, user } => {
            if all {
                for scope in registry.discover_scopes()? {
                    registry.store(scope)?;
                }
                registry.reset_all(&user)?;
                println!("Cleared {} logs", registry.scopes().len());
            } else {
                registry.logger(scope, user).reset()?;
                println!("Cleared log for scope {}", scope);
            }
        }

        Command::Verify { scope, rebuild } => {
            // Opening already repairs an index whose line count is off
            let store = registry.store(scope)?;
            if rebuild {
                store.rebuild()?;
            }

            let consistent = store.verify()?;
            println!("Log:      {}", store.log_path().display());
            println!("Lines:    {}", store.line_count(false)?);
            println!("Offsets:  {}", store.offsets().len());
            println!("Backups:  {}", store.backups().len());
            println!(
                "Status:   {}",
                match (consistent, store.is_degraded()) {
                    (_, true) => "DEGRADED (rebuild pending)",
                    (true, false) => "CONSISTENT",
                    (false, false) => "INCONSISTENT",
                }
            );

            if !consistent {
                anyhow::bail!("Offset index for scope {} does not match its log", scope);
            }
        }
    }

    Ok(())
}

fn print_page(page: &ViewPage) {
    println!(
        "Scope {} | {} lines | cursor {}",
        page.scope,
        page.line_count,
        page.cursor + 1
    );
    for entry in &page.entries {
        println!("{}", format_entry(entry));
    }
}

fn format_entry(entry: &LogEntryView) -> String {
    if entry.date.is_empty() {
        return format!("{:>7}  {}", entry.line_number, entry.message);
    }
    format!(
        "{:>7}  {} {}  {:<8}  {}/{}/{}  {}  {}",
        entry.line_number,
        entry.date,
        entry.time,
        entry.level,
        entry.club_id,
        entry.event_id,
        entry.user,
        entry.remote_addr,
        entry.message
    )
}
