//! Session logger: mirrors all `tracing` output to a single file in the OS
//! data directory.
//!
//! The file is **truncated (overwritten) at each launch**, so it only ever
//! contains output from the most-recent session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\MaskRaster\maskraster.log`
//!   Linux:    `~/.local/share/MaskRaster/maskraster.log`
//!   macOS:    `~/Library/Application Support/MaskRaster/maskraster.log`
//!
//! The file layer honours `RUST_LOG` and defaults to
//! `info,maskraster=debug`. The terminal only sees warnings unless the CLI
//! runs with `--verbose`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "maskraster.log";

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Initialise logging. Must be called once, before any work.
///
/// * Creates (or truncates) the session log file and writes a header.
/// * Installs the file + stderr subscriber.
/// * Installs a panic hook that records the panic before the default
///   handler runs.
///
/// Keep the returned guard alive until exit so buffered lines get flushed.
pub fn init(verbose: bool) -> Option<WorkerGuard> {
    let path = log_file_path();
    let (file_layer, guard) = match open_session_file(&path) {
        Ok(()) => {
            let dir = path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,maskraster=debug"));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter);
            let _ = LOG_PATH.set(path);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            // Can't open log file: not fatal, terminal logging only
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            (None, None)
        }
    };

    let stderr_level = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_level);

    // An absent file layer is a no-op layer.
    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC: {}", info);
        prev(info);
    }));

    guard
}

/// Truncate the previous session's log and write the session header.
fn open_session_file(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    writeln!(file, "=== MaskRaster session started (unix {}) ===", unix_seconds())?;
    writeln!(file, "Log file: {}", path.display())?;
    writeln!(file)?;
    Ok(())
}

fn log_file_path() -> PathBuf {
    data_dir().join("MaskRaster").join(LOG_FILE_NAME)
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    // Linux / fallback
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort: current working directory
    PathBuf::from(".")
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
