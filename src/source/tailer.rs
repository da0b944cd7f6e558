use crate::source::record::{session_id_from_path, Record};
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TailError {
    #[error("failed to open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to stat {}: {source}", .path.display())]
    Stat { path: PathBuf, source: io::Error },

    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("short read on {}: expected {expected} bytes, got {actual}", .path.display())]
    ShortRead {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

impl TailError {
    pub fn path(&self) -> &Path {
        match self {
            TailError::Open { path, .. }
            | TailError::Stat { path, .. }
            | TailError::Read { path, .. }
            | TailError::ShortRead { path, .. } => path,
        }
    }
}

/// Result of reading one file's unread region.
#[derive(Debug, Clone)]
pub struct TailOutcome {
    pub path: PathBuf,
    pub records: Vec<Record>,
    /// Offset the read started from (0 after a truncation).
    pub start_offset: u64,
    /// File size observed before reading; the offset to commit on delivery.
    pub new_offset: u64,
    pub truncated: bool,
    /// Non-empty lines that were not a JSON object. Their bytes count as consumed.
    pub dropped_lines: usize,
}

impl TailOutcome {
    pub fn bytes_read(&self) -> u64 {
        self.new_offset - self.start_offset
    }
}

/// Reads the region of a session log appended since a known offset and turns
/// each line into a [`Record`].
#[derive(Debug, Clone)]
pub struct Tailer {
    tenant_id: Arc<str>,
}

impl Tailer {
    pub fn new(tenant_id: impl Into<Arc<str>>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Read `[known_offset, size)` of `path`.
    ///
    /// If the file is now shorter than `known_offset` it was truncated or
    /// replaced, and reading restarts at 0. Bytes appended after the size is
    /// sampled are left for the next call.
    pub async fn tail(&self, path: &Path, known_offset: u64) -> Result<TailOutcome, TailError> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|source| TailError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let size = file
            .metadata()
            .await
            .map_err(|source| TailError::Stat {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        let truncated = size < known_offset;
        let start_offset = if truncated {
            info!(
                path = %path.display(),
                size,
                known_offset,
                "file shrank below committed offset; rereading from start"
            );
            0
        } else {
            known_offset
        };

        let mut outcome = TailOutcome {
            path: path.to_path_buf(),
            records: Vec::new(),
            start_offset,
            new_offset: start_offset,
            truncated,
            dropped_lines: 0,
        };

        if size == start_offset {
            return Ok(outcome);
        }

        let expected = size - start_offset;
        let read_error = |source: io::Error| TailError::Read {
            path: path.to_path_buf(),
            source,
        };
        file.seek(SeekFrom::Start(start_offset))
            .await
            .map_err(read_error)?;
        let mut buf = Vec::with_capacity(expected as usize);
        (&mut file)
            .take(expected)
            .read_to_end(&mut buf)
            .await
            .map_err(read_error)?;

        if (buf.len() as u64) < expected {
            return Err(TailError::ShortRead {
                path: path.to_path_buf(),
                expected,
                actual: buf.len() as u64,
            });
        }

        let session_id = session_id_from_path(path);
        let (records, dropped_lines) = self.parse_chunk(path, &buf, &session_id);

        outcome.records = records;
        outcome.dropped_lines = dropped_lines;
        outcome.new_offset = size;

        debug!(
            path = %path.display(),
            start_offset,
            new_offset = size,
            records = outcome.records.len(),
            dropped_lines,
            "tailed file"
        );

        Ok(outcome)
    }

    /// Split a chunk on newlines and parse each non-blank line. Lines that do
    /// not parse are dropped and counted; they are never retried.
    fn parse_chunk(&self, path: &Path, chunk: &[u8], session_id: &str) -> (Vec<Record>, usize) {
        let text = String::from_utf8_lossy(chunk);
        let mut records = Vec::new();
        let mut dropped = 0;

        for line in text.split('\n') {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match Record::from_line(line, session_id, &self.tenant_id) {
                Ok(record) => records.push(record),
                Err(e) => {
                    dropped += 1;
                    debug!(path = %path.display(), error = %e, "dropping malformed line");
                }
            }
        }

        (records, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    fn file_len(path: &Path) -> u64 {
        std::fs::metadata(path).unwrap().len()
    }

    #[tokio::test]
    async fn test_reads_all_lines_from_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc.jsonl");
        append(&path, "{\"level\":\"info\"}\n{\"level\":\"error\"}\n");

        let outcome = Tailer::new("tenant").tail(&path, 0).await.unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].get("level"), Some(&json!("info")));
        assert_eq!(outcome.records[1].get("level"), Some(&json!("error")));
        assert_eq!(outcome.records[0].session_id(), Some("abc"));
        assert_eq!(outcome.records[0].tenant_id(), Some("tenant"));
        assert_eq!(outcome.new_offset, file_len(&path));
        assert_eq!(outcome.bytes_read(), file_len(&path));
        assert!(!outcome.truncated);
    }

    #[tokio::test]
    async fn test_reads_only_bytes_after_offset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"n\":1}\n");
        let first_end = file_len(&path);
        append(&path, "{\"n\":2}\n{\"n\":3}\n");

        let outcome = Tailer::new("t").tail(&path, first_end).await.unwrap();

        let ns: Vec<_> = outcome.records.iter().map(|r| r.get("n").cloned()).collect();
        assert_eq!(ns, vec![Some(json!(2)), Some(json!(3))]);
        assert_eq!(outcome.start_offset, first_end);
        assert_eq!(outcome.new_offset, file_len(&path));
    }

    #[tokio::test]
    async fn test_no_new_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"n\":1}\n");
        let len = file_len(&path);

        let outcome = Tailer::new("t").tail(&path, len).await.unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.new_offset, len);
        assert_eq!(outcome.bytes_read(), 0);
    }

    #[tokio::test]
    async fn test_empty_file_from_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.jsonl");
        append(&path, "");

        let outcome = Tailer::new("t").tail(&path, 0).await.unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.new_offset, 0);
    }

    #[tokio::test]
    async fn test_malformed_line_dropped_and_offset_reaches_eof() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"a\":1}\nthis is not json\n{\"b\":2}\n");

        let outcome = Tailer::new("t").tail(&path, 0).await.unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].get("a"), Some(&json!(1)));
        assert_eq!(outcome.records[1].get("b"), Some(&json!(2)));
        assert_eq!(outcome.dropped_lines, 1);
        assert_eq!(outcome.new_offset, file_len(&path));
    }

    #[tokio::test]
    async fn test_blank_lines_and_crlf_are_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "\n  \r\n{\"a\":1}\r\n\n{\"b\":2}");

        let outcome = Tailer::new("t").tail(&path, 0).await.unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.dropped_lines, 0);
    }

    #[tokio::test]
    async fn test_truncation_restarts_from_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"old\":1}\n{\"old\":2}\n{\"old\":3}\n");
        let old_len = file_len(&path);

        std::fs::write(&path, "{\"new\":1}\n").unwrap();
        let outcome = Tailer::new("t").tail(&path, old_len).await.unwrap();

        assert!(outcome.truncated);
        assert_eq!(outcome.start_offset, 0);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].get("new"), Some(&json!(1)));
        assert_eq!(outcome.new_offset, file_len(&path));
    }

    #[tokio::test]
    async fn test_truncated_to_empty_proposes_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"a\":1}\n");

        std::fs::write(&path, "").unwrap();
        let outcome = Tailer::new("t").tail(&path, 8).await.unwrap();

        assert!(outcome.truncated);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.new_offset, 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_open_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.jsonl");

        let err = Tailer::new("t").tail(&path, 0).await.unwrap_err();
        assert!(matches!(err, TailError::Open { .. }));
        assert_eq!(err.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_partial_trailing_line_is_consumed() {
        // A writer caught mid-line leaves a fragment that fails to parse; the
        // fragment's bytes still count as read.
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"a\":1}\n{\"b\":");

        let outcome = Tailer::new("t").tail(&path, 0).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.dropped_lines, 1);
        assert_eq!(outcome.new_offset, file_len(&path));
    }
}
