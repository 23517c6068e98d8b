//! Session log: one file per launch in the OS data directory.
//!
//!   Windows:  `%APPDATA%\SketchPair\sketchpair.log`
//!   Linux:    `$XDG_DATA_HOME/SketchPair/sketchpair.log` (or `~/.local/share/...`)
//!   macOS:    `~/Library/Application Support/SketchPair/sketchpair.log`
//!
//! Log through `log_info!` / `log_warn!` / `log_err!`. Until [`init`] has run
//! (and in unit tests) they write nothing.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        }
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, format_args!($($arg)*))
    };
}

/// Append one `[HH:MM:SS] [LEVEL] msg` line. I/O errors are dropped.
pub fn write(level: Level, msg: fmt::Arguments<'_>) {
    let Some(file) = LOG_FILE.get() else { return };
    if let Ok(mut file) = file.lock() {
        let _ = write_entry(&mut *file, &clock(unix_secs()), level, msg);
    }
}

fn write_entry(
    out: &mut impl Write,
    clock: &str,
    level: Level,
    msg: fmt::Arguments<'_>,
) -> io::Result<()> {
    writeln!(out, "[{}] [{}] {}", clock, level.as_str(), msg)
}

/// Open the log (truncating the previous session's), write the header and
/// install a panic hook that copies panics into it.
///
/// Returns the log path, or `None` when the file could not be opened; the
/// program then runs without a log.
pub fn init() -> Option<PathBuf> {
    let path = data_dir().join("SketchPair").join("sketchpair.log");
    let file = match open_truncated(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("[logger] cannot open {}: {}", path.display(), e);
            return None;
        }
    };
    if LOG_FILE.set(Mutex::new(file)).is_err() {
        return Some(path);
    }

    log_info!(
        "SketchPair {} started, log at {}",
        env!("CARGO_PKG_VERSION"),
        path.display()
    );

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write(Level::Panic, format_args!("{}", info));
        prev(info);
    }));
    Some(path)
}

fn open_truncated(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

/// Platform data directory, without the app folder.
fn data_dir() -> PathBuf {
    let var = |key: &str| std::env::var_os(key).map(PathBuf::from);
    let dir = if cfg!(target_os = "windows") {
        var("APPDATA")
    } else if cfg!(target_os = "macos") {
        var("HOME").map(|home| home.join("Library").join("Application Support"))
    } else {
        var("XDG_DATA_HOME").or_else(|| var("HOME").map(|home| home.join(".local").join("share")))
    };
    dir.unwrap_or_else(|| PathBuf::from("."))
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// UTC wall clock within the day.
fn clock(secs: u64) -> String {
    let day = secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3600, day % 3600 / 60, day % 60)
}
