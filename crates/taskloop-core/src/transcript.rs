//! Append-only JSONL transcript of every decoded agent event.
//!
//! One line per event: `{"ts":"<rfc3339>","cycle":<n>,"event":{...}}`. The
//! file and its parent directories are created on the first write.

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use taskloop_proto::ParsedEvent;
use tracing::{debug, warn};

/// A transcript line as read back from disk.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranscriptRecord {
    /// RFC 3339 timestamp.
    pub ts: String,
    pub cycle: u32,
    /// The decoded event in its wire shape.
    pub event: serde_json::Value,
}

#[derive(Serialize)]
struct TranscriptLine<'a> {
    ts: String,
    cycle: u32,
    event: &'a ParsedEvent,
}

/// Appends decoded events to a JSONL file.
pub struct TranscriptWriter {
    path: PathBuf,
    file: Option<File>,
    failed_writes: u64,
}

impl TranscriptWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            failed_writes: 0,
        }
    }

    fn ensure_open(&mut self) -> std::io::Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent)?;
                }
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?
            }
        };
        Ok(self.file.insert(file))
    }

    /// Appends one event.
    ///
    /// Uses a single `write_all` per line so concurrent appenders never
    /// interleave partial records.
    pub fn append(&mut self, cycle: u32, event: &ParsedEvent) -> std::io::Result<()> {
        let line = TranscriptLine {
            ts: chrono::Utc::now().to_rfc3339(),
            cycle,
            event,
        };
        let mut json = serde_json::to_string(&line)?;
        json.push('\n');

        let file = self.ensure_open()?;
        file.write_all(json.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Appends one event, logging and swallowing any I/O failure.
    pub fn record(&mut self, cycle: u32, event: &ParsedEvent) {
        if let Err(e) = self.append(cycle, event) {
            self.failed_writes += 1;
            // Drop the handle so the next write retries the open.
            self.file = None;
            warn!(
                path = %self.path.display(),
                error = %e,
                failed_writes = self.failed_writes,
                "Failed to write transcript line"
            );
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of events that could not be written.
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes
    }
}

/// Reads every record of a transcript file. Malformed lines are skipped.
pub fn read_transcript(path: &Path) -> std::io::Result<Vec<TranscriptRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                debug!(line = line_num + 1, error = %e, "Skipping malformed transcript line");
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("nested").join("transcript.jsonl");
        let mut writer = TranscriptWriter::new(&path);

        writer
            .append(1, &ParsedEvent::decode(r#"{"event":"run_started","run_id":"r-1"}"#))
            .unwrap();
        writer.append(2, &ParsedEvent::decode("garbage")).unwrap();

        let records = read_transcript(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cycle, 1);
        assert_eq!(records[0].event, json!({"event": "run_started", "run_id": "r-1"}));
        assert_eq!(records[1].cycle, 2);
        assert_eq!(records[1].event, json!({"event": "parse_error", "raw": "garbage"}));
        assert!(chrono::DateTime::parse_from_rfc3339(&records[0].ts).is_ok());
    }

    #[test]
    fn test_appends_to_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("transcript.jsonl");

        TranscriptWriter::new(&path).append(1, &ParsedEvent::Ready).unwrap();
        TranscriptWriter::new(&path).append(1, &ParsedEvent::Shutdown).unwrap();

        let records = read_transcript(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].event, json!({"event": "shutdown"}));
    }

    #[test]
    fn test_record_swallows_write_errors() {
        let tmp = TempDir::new().unwrap();
        // A directory where the file should be makes every open fail.
        let path = tmp.path().join("transcript.jsonl");
        fs::create_dir(&path).unwrap();

        let mut writer = TranscriptWriter::new(&path);
        writer.record(1, &ParsedEvent::Ready);
        writer.record(1, &ParsedEvent::Ready);
        assert_eq!(writer.failed_writes(), 2);
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(read_transcript(&tmp.path().join("none.jsonl")).unwrap().is_empty());
    }
}
