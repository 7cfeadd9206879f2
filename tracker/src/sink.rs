use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use sleep_tracker_common::record::run_log_name;
use tracing::{debug, info, warn};

/// Line-oriented destination for flushed record batches.
pub trait LogSink {
    /// Append `line` plus a trailing newline, durably enough to survive a
    /// normal process exit.
    fn append_line(&mut self, line: &str) -> Result<(), SinkError>;

    /// Release the sink. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to create log directory {0}: {1}")]
    CreateDir(String, std::io::Error),
    #[error("failed to open run log {0}: {1}")]
    Open(String, std::io::Error),
    #[error("failed to write run log {0}: {1}")]
    Write(String, std::io::Error),
    #[error("failed to encode record batch: {0}")]
    Encode(#[from] sleep_tracker_common::record::RecordError),
    #[error("run log {0} is already closed")]
    Closed(String),
}

/// One run's log file, `<log_dir>/<YYYY>_<MM>_<DD>_<HH>:<MM>:<SS>.txt`,
/// held open in append mode until `close` (or drop).
pub struct RunLogFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    lines: u64,
}

impl RunLogFile {
    /// Open the log for a run starting now.
    pub fn create(log_dir: &Path) -> Result<Self, SinkError> {
        Self::create_at(log_dir, &Local::now())
    }

    /// Open the log for a run that started at `started_at`. Creates `log_dir`
    /// if it does not exist.
    pub fn create_at(log_dir: &Path, started_at: &DateTime<Local>) -> Result<Self, SinkError> {
        std::fs::create_dir_all(log_dir)
            .map_err(|e| SinkError::CreateDir(log_dir.display().to_string(), e))?;

        let path = log_dir.join(run_log_name(started_at));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SinkError::Open(path.display().to_string(), e))?;

        info!(path = path.display().to_string(), "run log opened");

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            lines: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, e: std::io::Error) -> SinkError {
        SinkError::Write(self.path.display().to_string(), e)
    }
}

impl LogSink for RunLogFile {
    fn append_line(&mut self, line: &str) -> Result<(), SinkError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(SinkError::Closed(self.path.display().to_string()));
        };

        if let Err(e) = write_line(writer, line) {
            return Err(self.write_err(e));
        }

        self.lines += 1;
        debug!(lines = self.lines, bytes = line.len() + 1, "appended run log line");
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };

        let file = writer
            .into_inner()
            .map_err(|e| SinkError::Write(self.path.display().to_string(), e.into_error()))?;
        file.sync_all().map_err(|e| self.write_err(e))?;

        info!(
            path = self.path.display().to_string(),
            lines = self.lines,
            "run log closed"
        );
        Ok(())
    }
}

fn write_line<W: Write>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

impl Drop for RunLogFile {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.close() {
                warn!(error = %e, "failed to close run log on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 19, 22, 5, 9).unwrap()
    }

    #[test]
    fn file_name_is_keyed_by_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLogFile::create_at(dir.path(), &started()).unwrap();
        assert_eq!(log.path(), dir.path().join("2026_10_19_22:05:09.txt"));
        assert!(log.path().exists());
    }

    #[test]
    fn creates_missing_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs");
        let log = RunLogFile::create_at(&nested, &started()).unwrap();
        assert!(log.path().starts_with(&nested));
    }

    #[test]
    fn each_append_is_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLogFile::create_at(dir.path(), &started()).unwrap();
        log.append_line("[]").unwrap();
        log.append_line("[{\"time\": \"1\"}]").unwrap();

        // Flushed per line, readable before close.
        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "[]\n[{\"time\": \"1\"}]\n");
        log.close().unwrap();
    }

    #[test]
    fn reopening_appends_instead_of_truncating() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = RunLogFile::create_at(dir.path(), &started()).unwrap();
            log.append_line("first").unwrap();
            log.close().unwrap();
        }
        let mut log = RunLogFile::create_at(dir.path(), &started()).unwrap();
        log.append_line("second").unwrap();
        log.close().unwrap();
        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn close_is_idempotent_and_blocks_further_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLogFile::create_at(dir.path(), &started()).unwrap();
        log.close().unwrap();
        log.close().unwrap();
        assert!(matches!(log.append_line("late"), Err(SinkError::Closed(_))));
    }

    #[test]
    fn drop_releases_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut log = RunLogFile::create_at(dir.path(), &started()).unwrap();
            log.append_line("kept").unwrap();
            log.path().to_path_buf()
        };
        assert_eq!(std::fs::read_to_string(path).unwrap(), "kept\n");
    }
}
