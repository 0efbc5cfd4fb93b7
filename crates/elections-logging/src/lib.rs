//! Process diagnostics for the Elections log store
//!
//! This crate wires up the process's own `tracing` output (what the server
//! itself is doing) and carries the per-thread request context that the
//! audit log store reads when a caller does not pass a source address.
//!
//! # Quick Start
//!
//! ```ignore
//! use elections_logging::{SubscriberBuilder, LogConfig};
//!
//! // Human-readable console output with debug level
//! let _guard = SubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! # Request Context
//!
//! Use [`RequestContextGuard`] to set the acting user and remote address for
//! the duration of a request:
//!
//! ```ignore
//! use elections_logging::RequestContextGuard;
//!
//! let _guard = RequestContextGuard::new("alice", "10.0.0.7");
//! // Audit records written on this thread default to ipAddr = 10.0.0.7
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, LogConfig, RotationStrategy};
pub use context::{RequestContextData, RequestContextGuard};
pub use layers::RequestContextLayer;

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the diagnostics subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The diagnostics file could not be created
    #[error("Failed to open diagnostics file: {0}")]
    File(String),

    /// A global subscriber is already installed
    #[error("Subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Builder for configuring and initializing the diagnostics subscriber
pub struct SubscriberBuilder {
    config: LogConfig,
}

impl SubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Try to initialize the subscriber globally
    ///
    /// Returns the worker guard for file output, which must be kept alive
    /// for the life of the program.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let console = &self.config.console;
        let include_location = self.config.include_location;

        let pretty_console = (console.enabled && console.pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(console.ansi)
                .with_target(true)
        });

        let json_console = (console.enabled && !console.pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .flatten_event(true)
                .with_file(include_location)
                .with_line_number(include_location)
        });

        let (file_layer, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = create_file_writer(file_config)?;
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_file(include_location)
                    .with_line_number(include_location)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        Registry::default()
            .with(env_filter)
            .with(RequestContextLayer::new())
            .with(pretty_console)
            .with(json_console)
            .with(file_layer)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }

    /// Initialize the subscriber globally
    ///
    /// Failures are reported on stderr rather than aborting: diagnostics
    /// are never a reason to refuse to start.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: {}", e);
                None
            }
        }
    }
}

impl Default for SubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the file writer for diagnostics; truncates for `Never`, rolls otherwise
fn create_file_writer(file_config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&file_config.directory).map_err(|e| LoggingError::File(e.to_string()))?;

    let rotation = match file_config.rotation {
        RotationStrategy::Never => {
            let file_path = file_config
                .directory
                .join(format!("{}.log", file_config.prefix));
            let file = File::create(&file_path).map_err(|e| LoggingError::File(e.to_string()))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&file_config.prefix)
        .build(&file_config.directory)
        .map_err(|e| LoggingError::File(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize diagnostics for testing (minimal output)
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_testing() {
    let _ = SubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
