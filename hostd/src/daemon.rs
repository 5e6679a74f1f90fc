//! Process lifecycle: detaching, pidfile, termination signals, logging sink.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::shutdown::Shutdown;

/// Detach from the controlling terminal.
///
/// Must run before the tokio runtime is built: the process forks.
/// Stdio is redirected to `/dev/null` and the working directory becomes `/`.
pub fn daemonize() -> Result<()> {
    nix::unistd::daemon(false, false).context("daemonize failed")
}

/// Install the global tracing subscriber.
///
/// Foreground processes log to stderr; daemons append to `config.log_file`.
/// `RUST_LOG` takes precedence over the `-v` verbosity.
pub fn init_logging(config: &Config) -> Result<()> {
    let level = match config.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hostd={level}")));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.foreground {
        builder
            .with_writer(io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!("logging init failed: {e}"))
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("open log file {}", config.log_file.display()))?;
        builder
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!("logging init failed: {e}"))
    }
}

/// Pidfile that is removed when dropped.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn create(path: &Path) -> io::Result<Self> {
        fs::write(path, format!("{}\n", std::process::id()))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Flip `shutdown` on SIGINT or SIGTERM.
pub fn spawn_signal_watcher(shutdown: Shutdown) -> io::Result<JoinHandle<()>> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
        }
        shutdown.trigger();
    }))
}

/// Write the pidfile if one was configured; failures are logged only.
pub fn write_pid_file(config: &Config) -> Option<PidFile> {
    let path = config.pid_file.as_deref()?;
    match PidFile::create(path) {
        Ok(pid_file) => Some(pid_file),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to write pidfile");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_file_holds_pid_and_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostd.pid");

        let pid_file = PidFile::create(&path).unwrap();
        assert_eq!(pid_file.path(), path);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("{}\n", std::process::id())
        );

        drop(pid_file);
        assert!(!path.exists());
    }

    #[test]
    fn pid_file_in_missing_directory_fails() {
        assert!(PidFile::create(Path::new("/nonexistent-dir/hostd.pid")).is_err());
    }
}
