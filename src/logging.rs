//! logging.rs: explicit startup step: console + daily rolling file, plus
//! removal of stale log files from earlier runs.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_PREFIX: &str = "monitor";

/// Install the global subscriber. Keep the returned guard alive for the whole
/// process or buffered file lines are lost on exit.
pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir).with_context(|| format!("creating log dir {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, format!("{LOG_PREFIX}.log"));
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_target(false).with_ansi(false).with_writer(file_writer))
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}

/// Delete `monitor*.log*` files in `log_dir` last modified before `retention` ago.
/// Returns how many were removed. A missing directory counts as nothing to clean.
pub fn clean_old_logs(log_dir: &Path, retention: Duration) -> Result<usize> {
    let entries = match fs::read_dir(log_dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).with_context(|| format!("listing {}", log_dir.display())),
    };
    let cutoff = SystemTime::now()
        .checked_sub(retention)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut deleted = 0usize;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(LOG_PREFIX) || !name.contains(".log") {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or_else(|_| SystemTime::now());
        if modified < cutoff {
            match fs::remove_file(entry.path()) {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!(file = %name, error = %e, "could not remove old log file"),
            }
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn age(path: &Path, by: Duration) {
        let f = File::options().write(true).open(path).unwrap();
        f.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn removes_only_stale_monitor_logs() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("monitor.log.2025-01-01");
        let fresh = dir.path().join("monitor.log.2025-01-02");
        let other = dir.path().join("notes.txt");
        for p in [&old, &fresh, &other] {
            fs::write(p, "x").unwrap();
        }
        age(&old, Duration::from_secs(3 * 24 * 3600));
        age(&other, Duration::from_secs(3 * 24 * 3600));

        let n = clean_old_logs(dir.path(), Duration::from_secs(24 * 3600)).unwrap();
        assert_eq!(n, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(other.exists());
    }

    #[test]
    fn missing_dir_is_nothing_to_clean() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            clean_old_logs(&dir.path().join("nope"), Duration::from_secs(1)).unwrap(),
            0
        );
    }
}
