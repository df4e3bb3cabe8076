// relaunch/src/logging.rs
//! Subscriber setup for both binaries. Library crates only emit `tracing` events.

use std::fs;

use relaunch_common::config::LauncherConfig;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "RELAUNCH_LOG";

fn env_filter(default: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy()
}

pub fn launcher_log_file_name(app_name: &str) -> String {
    format!("{app_name}_launcher.log")
}

/// Level echoed to stderr by the launcher; `None` keeps stderr free of launcher output.
pub fn launcher_stderr_level(is_gui: bool, verbose: bool) -> Option<Level> {
    if verbose {
        Some(Level::DEBUG)
    } else if is_gui {
        None
    } else {
        Some(Level::ERROR)
    }
}

/// Logs to `<log_dir>/<app>_launcher.log` at DEBUG, plus stderr per [`launcher_stderr_level`].
///
/// The returned guard flushes the file writer when dropped and must outlive the run.
pub fn init_launcher_logging(config: &LauncherConfig, verbose: bool) -> Option<WorkerGuard> {
    let stderr_level = launcher_stderr_level(config.is_gui, verbose);
    let log_dir = config.log_dir();

    if let Err(e) = fs::create_dir_all(&log_dir) {
        init_stderr_logging();
        tracing::error!(
            "Failed to create log directory {}: {}",
            log_dir.display(),
            e
        );
        return None;
    }

    let file_appender =
        tracing_appender::rolling::never(&log_dir, launcher_log_file_name(&config.app_name));
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);
    let file_writer = non_blocking_appender.with_max_level(Level::DEBUG);

    match stderr_level {
        Some(level) => {
            let stderr_writer = std::io::stderr.with_max_level(level);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter(LevelFilter::DEBUG))
                .with_writer(stderr_writer.and(file_writer))
                .with_ansi(false)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter(LevelFilter::DEBUG))
                .with_writer(file_writer)
                .with_ansi(false)
                .try_init();
        }
    }
    tracing::debug!(
        "Launcher log: {}",
        log_dir.join(launcher_log_file_name(&config.app_name)).display()
    );
    Some(guard)
}

/// stderr-only logging for the maintenance tool, `-v` raises the level.
pub fn init_tool_logging(verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level_filter))
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .without_time()
        .try_init();
}

/// Fallback used before the launcher knows where its log file goes.
pub fn init_stderr_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(LevelFilter::ERROR))
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_level_depends_on_mode() {
        assert_eq!(launcher_stderr_level(false, false), Some(Level::ERROR));
        assert_eq!(launcher_stderr_level(true, false), None);
        assert_eq!(launcher_stderr_level(true, true), Some(Level::DEBUG));
        assert_eq!(launcher_log_file_name("app"), "app_launcher.log");
    }
}
