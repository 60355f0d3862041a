use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Checked before `RUST_LOG`.
pub const LOG_ENV: &str = "GITBAR_LOG";

/// Size at which the log file rolls over.
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Rolled-over files kept next to the live one.
pub const LOG_BACKUPS: usize = 5;

/// Log file that rolls over by size: `gitbar.log` moves to `gitbar.log.1`,
/// older backups shift up by one and the oldest past `backups` is dropped.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: File,
    written: u64,
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl RotatingFile {
    pub fn open(path: &Path, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let file = open_append(path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            backups,
            file,
            written,
        })
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backups == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
        } else {
            for n in (1..self.backups).rev() {
                let from = self.backup_path(n);
                if from.exists() {
                    fs::rename(&from, self.backup_path(n + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
            self.file = open_append(&self.path)?;
        }
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A single record larger than the limit still lands in a fresh file
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Filter directive: `GITBAR_LOG`, else `RUST_LOG`, else the configured level.
pub fn filter_directive(gitbar_log: Option<&str>, rust_log: Option<&str>, level: &str) -> String {
    [gitbar_log, rust_log]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or(level)
        .to_string()
}

/// Install the global subscriber. Logs never go to stdout, which carries
/// the status lines; they go to stderr or, when given, to `file`, which
/// rolls over at [`MAX_LOG_BYTES`] keeping [`LOG_BACKUPS`] old files.
pub fn init(level: &str, file: Option<&Path>) -> Result<()> {
    let directive = filter_directive(
        std::env::var(LOG_ENV).ok().as_deref(),
        std::env::var("RUST_LOG").ok().as_deref(),
        level,
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("Failed to create log directory")?;
            }
            let log_file = RotatingFile::open(path, MAX_LOG_BYTES, LOG_BACKUPS)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    // A subscriber already installed (tests, repeated init) is not an error
    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already set");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filter_precedence() {
        assert_eq!(filter_directive(Some("debug"), Some("warn"), "info"), "debug");
        assert_eq!(filter_directive(None, Some("warn"), "info"), "warn");
        assert_eq!(filter_directive(Some("  "), None, "error"), "error");
        assert_eq!(filter_directive(None, None, "info"), "info");
    }

    #[test]
    fn test_directives_parse() {
        for level in ["trace", "debug", "info", "warn", "error", "gitbar=debug,info"] {
            assert!(EnvFilter::try_new(level).is_ok(), "{level} should parse");
        }
    }

    #[test]
    fn test_init_with_file_creates_parent_dirs() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let log_path = temp_dir.path().join("logs").join("gitbar.log");

        init("debug", Some(log_path.as_path()))?;
        assert!(log_path.exists());
        Ok(())
    }

    #[test]
    fn test_log_file_rolls_over_and_caps_backups() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let log_path = temp_dir.path().join("gitbar.log");
        let line = format!("{}\n", "x".repeat(39));

        let mut writer = RotatingFile::open(&log_path, 100, 2)?;
        for _ in 0..10 {
            writer.write_all(line.as_bytes())?;
        }
        writer.flush()?;

        let backup = |n: usize| temp_dir.path().join(format!("gitbar.log.{}", n));
        assert!(fs::metadata(&log_path)?.len() <= 100);
        assert_eq!(fs::metadata(backup(1))?.len(), 80);
        assert_eq!(fs::metadata(backup(2))?.len(), 80);
        assert!(!backup(3).exists());
        Ok(())
    }

    #[test]
    fn test_existing_log_size_counts_toward_limit() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let log_path = temp_dir.path().join("gitbar.log");
        fs::write(&log_path, "y".repeat(90))?;

        let mut writer = RotatingFile::open(&log_path, 100, 1)?;
        writer.write_all(b"next record\n")?;
        writer.flush()?;

        assert_eq!(fs::read_to_string(&log_path)?, "next record\n");
        assert_eq!(fs::metadata(temp_dir.path().join("gitbar.log.1"))?.len(), 90);
        Ok(())
    }
}
