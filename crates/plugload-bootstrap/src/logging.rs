//! Log sink selection with failover.
//!
//! Sinks are tried in order: the primary log file (`logging.file`, or
//! `<plugin root>/Logs/plugload.log`), a per-user fallback under the local
//! data directory, then stderr when `logging.console_fallback` is set.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use plugload_config::LoggingConfig;
use plugload_core::{PlugloadError, Result};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_FILE_NAME: &str = "plugload.log";

/// Where log output ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    File(PathBuf),
    Console,
    /// No file could be opened and console fallback is off.
    Disabled,
    /// The process already had a global subscriber; it keeps receiving events.
    Existing,
}

/// Log files to try, in order.
pub fn candidate_files(config: &LoggingConfig, plugin_root: &Path) -> Vec<PathBuf> {
    let primary = match &config.file {
        Some(file) if file.is_absolute() => file.clone(),
        Some(file) => plugin_root.join(file),
        None => plugin_root.join("Logs").join(LOG_FILE_NAME),
    };

    let mut files = vec![primary];
    if let Some(data) = dirs::data_local_dir() {
        files.push(
            data.join("plugload")
                .join(host_name())
                .join("Logs")
                .join(LOG_FILE_NAME),
        );
    }
    files
}

/// File stem of the host executable; keeps fallback logs of different hosts apart.
fn host_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "host".to_string())
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Outcome of sink selection, before any subscriber is installed.
#[derive(Debug)]
pub struct SelectedSink {
    pub sink: LogSink,
    pub file: Option<File>,
    /// `path: error` for every candidate that could not be opened.
    pub failures: Vec<String>,
}

/// Open the first usable candidate.
pub fn select_sink(candidates: &[PathBuf], console_fallback: bool) -> SelectedSink {
    let mut failures = Vec::new();
    for path in candidates {
        match open_log_file(path) {
            Ok(file) => {
                return SelectedSink {
                    sink: LogSink::File(path.clone()),
                    file: Some(file),
                    failures,
                };
            }
            Err(e) => failures.push(format!("{}: {}", path.display(), e)),
        }
    }

    let sink = if console_fallback {
        LogSink::Console
    } else {
        LogSink::Disabled
    };
    SelectedSink {
        sink,
        file: None,
        failures,
    }
}

/// Pick a sink and install the global `tracing` subscriber. An already
/// installed subscriber is left in place.
pub fn install(config: &LoggingConfig, plugin_root: &Path) -> Result<LogSink> {
    let selected = select_sink(&candidate_files(config, plugin_root), config.console_fallback);

    let (writer, ansi) = match selected.file {
        Some(file) => (BoxMakeWriter::new(Mutex::new(file)), false),
        None if selected.sink == LogSink::Console => (BoxMakeWriter::new(std::io::stderr), true),
        None => {
            for failure in &selected.failures {
                eprintln!("[plugload] cannot open log file {failure}");
            }
            return Ok(LogSink::Disabled);
        }
    };

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level));
    let filter = filter.map_err(|e| PlugloadError::Logging(format!("invalid log level '{}': {}", config.level, e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi);

    let installed = match config.format.as_str() {
        "json" => builder.json().with_target(true).try_init(),
        "compact" => builder.compact().try_init(),
        _ => builder.with_target(false).try_init(),
    };

    if installed.is_err() {
        return Ok(LogSink::Existing);
    }

    for failure in &selected.failures {
        warn!("log sink unavailable, fell back: {failure}");
    }
    Ok(selected.sink)
}
