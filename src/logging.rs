//! Sender logging utilities.
//!
//! Every line is shaped like:
//!     <timestamp> [TAG][thread] message
//!
//! stderr is always written; an append-only file sink can be added with `init` or the
//! `SPOUT_SENDER_LOG_FILE` env var.
//!
//! Per-frame paths must not log. Use the diagnostics stream for anything that can happen every
//! frame.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use time::macros::format_description;

/// Env var naming an optional log file.
pub const LOG_FILE_ENV: &str = "SPOUT_SENDER_LOG_FILE";

static LOG_FILE: OnceLock<Mutex<Option<std::fs::File>>> = OnceLock::new();
static RUN_ID: OnceLock<String> = OnceLock::new();

/// Initialize logging. Safe to call more than once; the first file sink wins.
///
/// `log_file` falls back to `SPOUT_SENDER_LOG_FILE`. Returns the run id.
pub fn init(log_file: Option<PathBuf>) -> String {
    let rid = RUN_ID
        .get_or_init(|| {
            // time xor pid: enough to group the lines of one host session
            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
            format!("{:08x}", (now.as_nanos() as u64) ^ (std::process::id() as u64))
        })
        .clone();

    let sink = LOG_FILE.get_or_init(|| Mutex::new(None));

    let log_file = log_file.or_else(|| {
        std::env::var(LOG_FILE_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    });

    if let Some(path) = log_file {
        if let Ok(mut guard) = sink.lock() {
            if guard.is_none() {
                match OpenOptions::new().create(true).append(true).open(&path) {
                    Ok(f) => *guard = Some(f),
                    Err(e) => {
                        // The macros would re-enter this lock; write directly.
                        eprintln!(
                            "{} [LOG][{}] failed to open log file {}: {e}",
                            log_timestamp(),
                            log_thread_name(),
                            path.display()
                        );
                    }
                }
            }
        }
    }

    rid
}

/// Current run id (empty if `init` wasn't called).
pub fn run_id() -> &'static str {
    RUN_ID.get().map(|s| s.as_str()).unwrap_or("")
}

/// Local time when the offset is known, UTC otherwise.
pub fn log_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ))
    .unwrap_or_else(|_| "<time-format-error>".to_string())
}

pub fn log_thread_name() -> String {
    std::thread::current().name().unwrap_or("host").to_string()
}

/// Write one formatted line to stderr and the optional file sink.
#[doc(hidden)]
pub fn log_line(level: &str, tag: &str, msg: &str) {
    let line = if level == "INFO" {
        format!("{} [{}][{}] {}", log_timestamp(), tag, log_thread_name(), msg)
    } else {
        format!("{} [{}][{}] {}: {}", log_timestamp(), tag, log_thread_name(), level, msg)
    };

    eprintln!("{line}");

    if let Some(m) = LOG_FILE.get() {
        if let Ok(mut guard) = m.lock() {
            if let Some(f) = guard.as_mut() {
                let _ = writeln!(f, "{line}");
                let _ = f.flush();
            }
        }
    }
}

#[macro_export]
macro_rules! logi {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("INFO", $tag, &msg);
    }};
}

#[macro_export]
macro_rules! logw {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("WARN", $tag, &msg);
    }};
}

#[macro_export]
macro_rules! loge {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("ERROR", $tag, &msg);
    }};
}
