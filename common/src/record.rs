use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io;

/// One compared sample, as written to the run log.
///
/// All three fields are kept as text so that a log line read back yields
/// exactly what was written, with no re-derivation of the numbers.
///
/// Line format (one line per closed reference window):
///
/// ```text
/// [{"time": "1700000001", "last_frame_diff": "0", "keyframe_diff": "512"}, ...]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifferenceRecord {
    pub time: String,
    pub last_frame_diff: String,
    pub keyframe_diff: String,
}

impl DifferenceRecord {
    pub fn new(captured_at: f64, last_frame_diff: u64, keyframe_diff: u64) -> Self {
        Self {
            time: truncate_timestamp(captured_at).to_string(),
            last_frame_diff: last_frame_diff.to_string(),
            keyframe_diff: keyframe_diff.to_string(),
        }
    }
}

/// Whole seconds of a capture timestamp, truncated toward zero (never rounded).
pub fn truncate_timestamp(secs: f64) -> i64 {
    secs.trunc() as i64
}

/// File name of a run log, derived from the run's start time.
/// e.g. "2026_10_19_23:04:05.txt"
pub fn run_log_name<Tz>(started_at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    started_at.format("%Y_%m_%d_%H:%M:%S.txt").to_string()
}

/// Serialize one window's records as a single log line (no trailing newline).
pub fn encode_batch(records: &[DifferenceRecord]) -> Result<String, RecordError> {
    let mut buf = Vec::with_capacity(64 * records.len() + 2);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    records.serialize(&mut ser).map_err(RecordError::Encode)?;
    // serde_json only ever emits UTF-8.
    String::from_utf8(buf).map_err(|e| RecordError::Encode(serde::ser::Error::custom(e)))
}

/// Parse a single log line back into the records of one window.
pub fn parse_batch_line(line: &str) -> Result<Vec<DifferenceRecord>, RecordError> {
    serde_json::from_str(line.trim_end()).map_err(|e| RecordError::Parse { line: 1, source: e })
}

/// Parse a whole run log: one batch per non-empty line, in file order.
pub fn parse_log(content: &str) -> Result<Vec<Vec<DifferenceRecord>>, RecordError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| RecordError::Parse {
                line: idx + 1,
                source: e,
            })
        })
        .collect()
}

/// JSON layout with `", "` between items and `": "` after keys, matching the
/// log files produced by earlier versions of the tracker.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("failed to encode record batch: {0}")]
    Encode(serde_json::Error),
    #[error("malformed record batch on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}
