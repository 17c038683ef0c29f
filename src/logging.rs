//! Logging configuration for cfdi-lab.
//!
//! The interactive shell logs to a file so log lines never interleave with
//! results on the terminal. One-shot mode logs to stderr.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const APP_DIR: &str = "cfdi-lab";
const LOG_FILE: &str = "cfdi-lab.log";
const DEFAULT_FILTER: &str = "info";

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Truncated file under the state directory.
    File,
    Stderr,
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Returns the log file path when logging to a file. If the file cannot be
/// created a warning is printed and logging stays disabled.
pub fn init(target: LogTarget) -> Option<PathBuf> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter());

    match target {
        LogTarget::Stderr => {
            builder.with_writer(std::io::stderr).init();
            None
        }
        LogTarget::File => {
            let path = get_log_path();
            let file = match open_log_file(&path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {}: {e}", path.display());
                    return None;
                }
            };
            builder.with_writer(file).with_ansi(false).init();
            Some(path)
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

/// Returns the path for the log file.
///
/// `~/.local/state/cfdi-lab/cfdi-lab.log` on Linux; falls back to the config
/// directory, then the temp directory.
pub fn get_log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join(APP_DIR).join(LOG_FILE))
        .unwrap_or_else(|| std::env::temp_dir().join(LOG_FILE))
}
