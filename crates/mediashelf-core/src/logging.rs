//! `tracing` subscriber setup for hosts that embed the library.
//!
//! The crate only emits events. A host that wants them on a terminal and in a
//! log folder calls [`init`] once at startup and holds the returned
//! [`LoggingGuard`] until exit. Terminal output is plain text and honours
//! `RUST_LOG`; the log folder gets one JSON object per line.

use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    Layer, Registry,
    filter::{EnvFilter, LevelFilter},
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const CRATE_TARGET: &str = "mediashelf_core";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Verbosity preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogProfile {
    /// Debug on the terminal, everything on disk, short rotation.
    Development,
    /// Info on the terminal, debug on disk, a week of daily files.
    Production,
}

impl LogProfile {
    /// `Development` in debug builds.
    #[must_use]
    pub const fn for_build() -> Self {
        if cfg!(debug_assertions) {
            Self::Development
        } else {
            Self::Production
        }
    }
}

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    /// Every minute.
    Minutely,
    /// Every hour.
    Hourly,
    /// Every day.
    Daily,
    /// One file forever.
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Minutely => Self::MINUTELY,
            LogRotation::Hourly => Self::HOURLY,
            LogRotation::Daily => Self::DAILY,
            LogRotation::Never => Self::NEVER,
        }
    }
}

/// Terminal output.
#[derive(Debug, Clone)]
pub struct ConsoleOutput {
    /// Most verbose level shown for this crate.
    pub level: Level,
    /// Colour escapes.
    pub ansi: bool,
    /// Show the emitting module.
    pub show_target: bool,
    /// Show source file and line.
    pub show_source: bool,
}

/// Log folder output.
#[derive(Debug, Clone)]
pub struct FileOutput {
    /// Level applied to dependencies; this crate always logs at trace.
    pub level: Level,
    /// File name prefix, e.g. `mediashelf` gives `mediashelf.2026-01-15.log`.
    pub prefix: String,
    /// Roll-over period.
    pub rotation: LogRotation,
    /// Rolled files kept around. Zero keeps every file.
    pub keep: usize,
}

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Folder holding the JSON log files.
    pub directory: PathBuf,
    /// Terminal settings.
    pub console: ConsoleOutput,
    /// Log folder settings.
    pub file: FileOutput,
    /// Also record span open and close.
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(LogProfile::Production)
    }
}

impl LoggingConfig {
    /// Settings for a preset, logging under [`default_log_directory`].
    #[must_use]
    pub fn new(profile: LogProfile) -> Self {
        let development = profile == LogProfile::Development;
        let (rotation, keep) = if development {
            (LogRotation::Hourly, 24)
        } else {
            (LogRotation::Daily, 7)
        };
        Self {
            directory: default_log_directory(),
            console: ConsoleOutput {
                level: if development { Level::DEBUG } else { Level::INFO },
                ansi: true,
                show_target: development,
                show_source: development,
            },
            file: FileOutput {
                level: if development { Level::TRACE } else { Level::DEBUG },
                prefix: "mediashelf".to_string(),
                rotation,
                keep,
            },
            span_events: development,
        }
    }

    /// Settings for [`LogProfile::for_build`].
    #[must_use]
    pub fn for_build() -> Self {
        Self::new(LogProfile::for_build())
    }

    /// Log into `directory` instead of the default folder.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Rename the log files.
    #[must_use]
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file.prefix = prefix.into();
        self
    }

    /// Terminal level for this crate.
    #[must_use]
    pub const fn with_console_level(mut self, level: Level) -> Self {
        self.console.level = level;
        self
    }

    /// Log folder level for dependencies.
    #[must_use]
    pub const fn with_file_level(mut self, level: Level) -> Self {
        self.file.level = level;
        self
    }

    /// Roll over every `rotation`, keeping `keep` files (zero keeps all).
    #[must_use]
    pub const fn with_rotation(mut self, rotation: LogRotation, keep: usize) -> Self {
        self.file.rotation = rotation;
        self.file.keep = keep;
        self
    }
}

/// Flushes the log folder writer when dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _flush: WorkerGuard,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard").finish_non_exhaustive()
    }
}

/// Install the process-wide subscriber.
///
/// # Errors
///
/// Fails when the log folder or its writer cannot be set up, or when another
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let (writer, flush) = open_log_folder(&config.directory, &config.file)?;
    let layers = vec![console_layer(config)?, file_layer(config, writer)?];

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard { _flush: flush })
}

/// [`init`] with [`LoggingConfig::for_build`].
///
/// # Errors
///
/// See [`init`].
pub fn init_auto() -> Result<LoggingGuard, LoggingError> {
    init(&LoggingConfig::for_build())
}

/// `<local data dir>/mediashelf/logs`.
#[must_use]
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mediashelf")
        .join("logs")
}

fn open_log_folder(
    directory: &Path,
    output: &FileOutput,
) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    std::fs::create_dir_all(directory).map_err(|e| LoggingError::DirectoryCreationFailed {
        path: directory.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut builder = RollingFileAppender::builder()
        .rotation(output.rotation.into())
        .filename_prefix(&output.prefix)
        .filename_suffix("log");
    if output.keep > 0 {
        builder = builder.max_log_files(output.keep);
    }
    let appender = builder
        .build(directory)
        .map_err(|e| LoggingError::AppenderFailed(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}

fn console_layer(config: &LoggingConfig) -> Result<BoxedLayer, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => crate_filter(LevelFilter::WARN, config.console.level)?,
    };
    Ok(fmt::layer()
        .with_ansi(config.console.ansi)
        .with_target(config.console.show_target)
        .with_file(config.console.show_source)
        .with_line_number(config.console.show_source)
        .with_span_events(span_events(config.span_events))
        .with_filter(filter)
        .boxed())
}

fn file_layer(config: &LoggingConfig, writer: NonBlocking) -> Result<BoxedLayer, LoggingError> {
    let filter = crate_filter(LevelFilter::from_level(config.file.level), Level::TRACE)?;
    Ok(fmt::layer()
        .json()
        .with_writer(writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events(config.span_events))
        .with_filter(filter)
        .boxed())
}

fn span_events(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// `others` for every target except this crate, which gets `ours`.
fn crate_filter(others: LevelFilter, ours: Level) -> Result<EnvFilter, LoggingError> {
    let directive = format!("{CRATE_TARGET}={}", LevelFilter::from_level(ours));
    EnvFilter::builder()
        .with_default_directive(others.into())
        .parse(&directive)
        .map_err(|e| LoggingError::InvalidDirective {
            reason: e.to_string(),
            directive,
        })
}

/// Logging setup failures.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log folder could not be created.
    #[error("Failed to create log directory {path}: {reason}")]
    DirectoryCreationFailed {
        /// Folder that was requested.
        path: PathBuf,
        /// OS message.
        reason: String,
    },

    /// The rolling writer could not be opened.
    #[error("Failed to create log file appender: {0}")]
    AppenderFailed(String),

    /// A filter directive did not parse.
    #[error("Invalid log directive {directive}: {reason}")]
    InvalidDirective {
        /// Directive text.
        directive: String,
        /// Parser message.
        reason: String,
    },

    /// Some subscriber is already installed for this process.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_is_production_profile() {
        let config = LoggingConfig::default();
        assert_eq!(config.console.level, Level::INFO);
        assert_eq!(config.file.level, Level::DEBUG);
        assert_eq!(config.file.rotation, LogRotation::Daily);
        assert_eq!(config.file.keep, 7);
        assert!(!config.span_events);
    }

    #[test]
    fn test_development_profile() {
        let config = LoggingConfig::new(LogProfile::Development);
        assert_eq!(config.console.level, Level::DEBUG);
        assert_eq!(config.file.level, Level::TRACE);
        assert_eq!(config.file.rotation, LogRotation::Hourly);
        assert!(config.console.show_source);
        assert!(config.span_events);
    }

    #[test]
    fn test_setters() {
        let config = LoggingConfig::new(LogProfile::Production)
            .with_directory("/var/log/shelf")
            .with_console_level(Level::WARN)
            .with_rotation(LogRotation::Never, 0)
            .with_file_prefix("drops");

        assert_eq!(config.directory, PathBuf::from("/var/log/shelf"));
        assert_eq!(config.console.level, Level::WARN);
        assert_eq!(config.file.rotation, LogRotation::Never);
        assert_eq!(config.file.keep, 0);
        assert_eq!(config.file.prefix, "drops");
    }

    #[test]
    fn test_rotation_maps_to_appender() {
        assert!(matches!(Rotation::from(LogRotation::Minutely), Rotation::MINUTELY));
        assert!(matches!(Rotation::from(LogRotation::Never), Rotation::NEVER));
    }

    #[test]
    fn test_crate_filter_raises_only_this_crate() {
        let filter = crate_filter(LevelFilter::WARN, Level::DEBUG).unwrap().to_string();
        assert!(filter.contains("mediashelf_core=debug"));
        assert!(filter.contains("warn"));
    }

    #[test]
    fn test_default_log_directory() {
        let dir = default_log_directory();
        assert!(dir.ends_with(Path::new("mediashelf").join("logs")));
    }

    #[test]
    fn test_unwritable_directory_is_reported() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let config = LoggingConfig::default().with_directory(blocker.join("logs"));

        assert!(matches!(
            init(&config),
            Err(LoggingError::DirectoryCreationFailed { .. })
        ));
    }

    // The only test that installs the global subscriber.
    #[test]
    fn test_init_writes_json_lines() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let config = LoggingConfig::default()
            .with_directory(temp.path())
            .with_rotation(LogRotation::Never, 0)
            .with_file_prefix("shelf");

        let guard = init(&config).unwrap();
        tracing::info!(target: "mediashelf_core::logging", marker = 42, "written to disk");
        drop(guard);

        let written = std::fs::read_dir(temp.path())
            .unwrap()
            .flatten()
            .map(|entry| std::fs::read_to_string(entry.path()).unwrap())
            .collect::<String>();
        let line = written
            .lines()
            .find(|line| line.contains("written to disk"))
            .expect("event in log file");
        let json: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(json["level"], "INFO");
        assert_eq!(json["fields"]["marker"], 42);

        assert!(matches!(
            init(&config),
            Err(LoggingError::AlreadyInitialized(_))
        ));
    }
}
