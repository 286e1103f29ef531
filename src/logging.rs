//! Diagnostic logging
//!
//! Warnings always go to stderr. With debug on, everything from this crate is
//! also appended to a fixed log file in the temp directory.

use std::path::PathBuf;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

pub const LOG_FILE: &str = "iptv_archive_plugin.log";

const DEBUG_FILTER: &str = "iptv_archive=debug,warn";
const DEFAULT_FILTER: &str = "warn";

/// Local-time timestamps, so the log lines up with the box clock
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

pub fn log_path() -> PathBuf {
    std::env::temp_dir().join(LOG_FILE)
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process so buffered file lines get flushed.
///
/// A subscriber that is already installed is left in place.
pub fn init(debug: bool) -> Option<WorkerGuard> {
    let directive = if debug { DEBUG_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(LocalTimer);

    let (file, guard) = if debug {
        let appender = tracing_appender::rolling::never(std::env::temp_dir(), LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_timer(LocalTimer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init();

    guard
}
