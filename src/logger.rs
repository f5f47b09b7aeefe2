//! StyleGen session log.
//!
//! Each run starts a fresh `stylegen.log` under the per-user data folder
//! (`%APPDATA%`, `~/Library/Application Support`, or `$XDG_DATA_HOME` /
//! `~/.local/share`, each followed by `StyleGen/`). Only the latest run is kept.
//!
//! Call sites use `log_info!`, `log_warn!` and `log_err!`. Until [`init`] has
//! run (and always in unit tests) nothing reaches disk; `set_echo(true)` also
//! copies every record to stderr, which `--verbose` turns on.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

const APP_DIR: &str = "StyleGen";
const LOG_NAME: &str = "stylegen.log";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        })
    }
}

struct Session {
    path: PathBuf,
    sink: Mutex<LineWriter<std::fs::File>>,
}

static SESSION: OnceLock<Session> = OnceLock::new();
static ECHO: AtomicBool = AtomicBool::new(false);

pub fn log_path() -> Option<&'static Path> {
    SESSION.get().map(|s| s.path.as_path())
}

pub fn set_echo(enabled: bool) {
    ECHO.store(enabled, Ordering::Relaxed);
}

/// Append one raw line. I/O failures are swallowed.
fn emit(line: &str) {
    if ECHO.load(Ordering::Relaxed) {
        eprintln!("{line}");
    }
    let Some(session) = SESSION.get() else { return };
    if let Ok(mut sink) = session.sink.lock() {
        let _ = writeln!(sink, "{line}");
    }
}

/// Record `msg` at `level` with a UTC wall-clock stamp.
pub fn record(level: Level, msg: &str) {
    emit(&render(&timestamp(), level, msg));
}

fn render(stamp: &str, level: Level, msg: &str) -> String {
    format!("[{stamp}] [{level}] {msg}")
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Error, &format!($($arg)*))
    };
}

/// Open (truncating) the session log and route panics into it. Safe to call
/// more than once; only the first call has an effect.
pub fn init() {
    if SESSION.get().is_some() {
        return;
    }
    let path = default_log_path();
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    let opened = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path);
    let file = match opened {
        Ok(file) => file,
        Err(e) => {
            // Logging stays disabled for this run
            eprintln!("[stylegen] cannot open log {}: {e}", path.display());
            return;
        }
    };
    let _ = SESSION.set(Session {
        path: path.clone(),
        sink: Mutex::new(LineWriter::new(file)),
    });

    emit(&format!(
        "=== StyleGen {} session (unix {}) ===",
        env!("CARGO_PKG_VERSION"),
        unix_seconds().unwrap_or(0)
    ));
    emit(&format!("Writing to {}", path.display()));

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        emit(&render(&timestamp(), Level::Panic, &info.to_string()));
        default_hook(info);
    }));
}

fn default_log_path() -> PathBuf {
    user_data_root().join(APP_DIR).join(LOG_NAME)
}

fn user_data_root() -> PathBuf {
    let env_dir = |var: &str| std::env::var_os(var).map(PathBuf::from);
    #[cfg(target_os = "windows")]
    {
        if let Some(dir) = env_dir("APPDATA") {
            return dir;
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = env_dir("HOME") {
            return home.join("Library/Application Support");
        }
    }
    env_dir("XDG_DATA_HOME")
        .or_else(|| env_dir("HOME").map(|h| h.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn unix_seconds() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

fn timestamp() -> String {
    unix_seconds()
        .map(clock)
        .unwrap_or_else(|| "--:--:--".to_string())
}

/// HH:MM:SS of the UTC day.
fn clock(secs: u64) -> String {
    let day = secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3600, (day % 3600) / 60, day % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_wraps_at_midnight() {
        assert_eq!(clock(0), "00:00:00");
        assert_eq!(clock(3661), "01:01:01");
        assert_eq!(clock(86_400 + 59), "00:00:59");
    }

    #[test]
    fn records_are_level_tagged() {
        assert_eq!(render("12:00:00", Level::Warn, "x"), "[12:00:00] [WARN] x");
        assert_eq!(Level::Error.to_string(), "ERROR");
    }

    #[test]
    fn logging_without_session_is_silent() {
        crate::log_info!("nothing to see {}", 1);
        crate::log_err!("still fine");
        assert!(log_path().is_none());
    }
}
