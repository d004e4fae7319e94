//! Tracing setup for hosts embedding the extractor.
//!
//! The library only emits `tracing` events; callers that have no subscriber of
//! their own can install one here. Output goes to stdout and, optionally, to a
//! per-launch timestamped file in a directory that is kept to a bounded count.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::OnceLock,
    time::SystemTime,
};

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

/// Maximum number of log files kept in a log directory.
pub const MAX_LOG_FILES: usize = 10;
const LOG_FILE_PREFIX: &str = "vocoder_mel";
const DEFAULT_FILTER: &str = "info";

static INSTALLED: OnceLock<Installed> = OnceLock::new();

struct Installed {
    log_path: Option<PathBuf>,
    _guard: Option<WorkerGuard>,
}

/// Errors that may occur while installing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to prepare log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to remove old log file {path}: {source}")]
    RemoveFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to format log filename time: {0}")]
    FormatTime(time::error::Format),
    /// Another subscriber was installed first, possibly by the host.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(tracing::subscriber::SetGlobalDefaultError),
    #[error("Failed to create log file at {path}: {source}")]
    CreateLogFile {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Stdout-only logging was installed earlier, so no file can be added.
    #[error("Logging is already installed without a log file")]
    NoLogFile,
}

/// Install a stdout subscriber filtered by `RUST_LOG` (default `info`).
///
/// Calls after the first successful install are no-ops.
pub fn init() -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }
    let subscriber = Registry::default()
        .with(build_env_filter())
        .with(fmt::layer().with_timer(build_timer()).with_writer(std::io::stdout));
    tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::SetGlobal)?;
    let _ = INSTALLED.set(Installed {
        log_path: None,
        _guard: None,
    });
    Ok(())
}

/// Install stdout logging plus a per-launch file under `log_dir`.
///
/// Returns the path of the new log file. Older `.log` files beyond
/// [`MAX_LOG_FILES`] are removed, oldest first. Once a file is installed,
/// later calls return that file's path regardless of `log_dir`.
pub fn init_with_log_dir(log_dir: &Path) -> Result<PathBuf, LoggingError> {
    if let Some(installed) = INSTALLED.get() {
        return installed.log_path.clone().ok_or(LoggingError::NoLogFile);
    }
    fs::create_dir_all(log_dir).map_err(|source| LoggingError::CreateDir {
        path: log_dir.to_path_buf(),
        source,
    })?;
    let file_name = format_log_file_name(now_local_or_utc())?;
    let log_path = log_dir.join(&file_name);
    ensure_file_exists(&log_path)?;
    prune_old_logs(log_dir, MAX_LOG_FILES)?;

    let (file_writer, guard) = tracing_appender::non_blocking(rolling::never(log_dir, file_name));
    let timer = build_timer();
    let subscriber = Registry::default()
        .with(build_env_filter())
        .with(fmt::layer().with_timer(timer.clone()).with_writer(std::io::stdout))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(file_writer),
        );
    tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::SetGlobal)?;
    let _ = INSTALLED.set(Installed {
        log_path: Some(log_path.clone()),
        _guard: Some(guard),
    });

    tracing::info!("Logging initialized; log file at {}", log_path.display());
    Ok(log_path)
}

fn ensure_file_exists(path: &Path) -> Result<(), LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|source| LoggingError::CreateLogFile {
            path: path.to_path_buf(),
            source,
        })
}

fn prune_old_logs(dir: &Path, max_files: usize) -> Result<(), LoggingError> {
    let read_dir = fs::read_dir(dir).map_err(|source| LoggingError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut logs: Vec<(SystemTime, PathBuf)> = read_dir
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "log"))
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect();

    if logs.len() <= max_files {
        return Ok(());
    }
    logs.sort_by_key(|(modified, _)| *modified);
    let excess = logs.len() - max_files;
    for (_, path) in logs.into_iter().take(excess) {
        fs::remove_file(&path).map_err(|source| LoggingError::RemoveFile { path, source })?;
    }
    Ok(())
}

fn format_log_file_name(now: OffsetDateTime) -> Result<String, LoggingError> {
    const NAME_FORMAT: &[FormatItem<'_>] =
        format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    let name = now.format(NAME_FORMAT).map_err(LoggingError::FormatTime)?;
    Ok(format!("{LOG_FILE_PREFIX}_{name}.log"))
}

fn build_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const DISPLAY_FORMAT: &[FormatItem<'static>] =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};
    use tempfile::tempdir;

    #[test]
    fn log_filename_has_timestamp_and_prefix() {
        let fixed = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let name = format_log_file_name(fixed).unwrap();
        assert_eq!(name, "vocoder_mel_2023-11-14_22-13-20.log");
    }

    #[test]
    fn prune_keeps_newest_logs_and_ignores_other_files() {
        let dir = tempdir().unwrap();
        for idx in 0..5 {
            ensure_file_exists(&dir.path().join(format!("vocoder_mel_{idx}.log"))).unwrap();
            thread::sleep(Duration::from_millis(10));
        }
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        prune_old_logs(dir.path(), 3).unwrap();
        let mut remaining: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                "notes.txt",
                "vocoder_mel_2.log",
                "vocoder_mel_3.log",
                "vocoder_mel_4.log"
            ]
        );
    }

    #[test]
    fn prune_under_limit_is_a_no_op() {
        let dir = tempdir().unwrap();
        ensure_file_exists(&dir.path().join("a.log")).unwrap();
        prune_old_logs(dir.path(), MAX_LOG_FILES).unwrap();
        assert!(dir.path().join("a.log").exists());
    }

    // The only test in this binary that installs a global subscriber.
    #[test]
    fn install_is_idempotent_and_reports_the_active_file() {
        let dir = tempdir().unwrap();
        let first = init_with_log_dir(dir.path()).unwrap();
        assert!(first.exists());
        assert_eq!(first.parent(), Some(dir.path()));

        let elsewhere = tempdir().unwrap();
        let second = init_with_log_dir(elsewhere.path()).unwrap();
        assert_eq!(second, first);
        assert_eq!(fs::read_dir(elsewhere.path()).unwrap().count(), 0);

        init().unwrap();
        tracing::info!("after install");
    }
}
