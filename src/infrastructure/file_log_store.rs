// File log store - Newline-delimited reading log on local disk
use crate::application::error::PersistenceError;
use crate::application::log_store::LogStore;
use crate::domain::reading::LogRecord;
use async_trait::async_trait;
use chrono::FixedOffset;
use std::io::{ErrorKind, SeekFrom};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

/// First backward read size when tailing the log; doubles on each step.
const TAIL_BLOCK: u64 = 8 * 1024;

pub struct FileLogStore {
    path: PathBuf,
    offset: FixedOffset,
    write_guard: Mutex<()>,
}

impl FileLogStore {
    pub fn new(path: impl Into<PathBuf>, offset: FixedOffset) -> Self {
        Self {
            path: path.into(),
            offset,
            write_guard: Mutex::new(()),
        }
    }

    /// Whole lines only; a trailing unterminated line may still be in flight.
    async fn read_complete(&self) -> Result<Option<String>, PersistenceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let text = String::from_utf8_lossy(&bytes);
        let complete = match text.rfind('\n') {
            Some(end) => &text[..=end],
            None => "",
        };
        Ok(Some(complete.to_string()))
    }

    /// Parse the newline-terminated lines of `bytes`. When `cut_head` is set the
    /// first line may start mid-record and is dropped.
    fn parse_tail(&self, bytes: &[u8], cut_head: bool) -> (Vec<LogRecord>, usize) {
        let Some(end) = bytes.iter().rposition(|&b| b == b'\n') else {
            return (Vec::new(), 0);
        };
        let mut complete = &bytes[..=end];
        if cut_head {
            match complete.iter().position(|&b| b == b'\n') {
                Some(first) => complete = &complete[first + 1..],
                None => return (Vec::new(), 0),
            }
        }

        let mut skipped = 0usize;
        let records = String::from_utf8_lossy(complete)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let parsed = LogRecord::parse_line(line, &self.offset);
                if parsed.is_none() {
                    skipped += 1;
                }
                parsed
            })
            .collect();
        (records, skipped)
    }
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn append(&self, record: &LogRecord) -> Result<(), PersistenceError> {
        let _guard = self.write_guard.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(record.to_line().as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }

    /// Reads backwards from the end of the file until `limit` records are found.
    async fn read_recent(&self, limit: usize) -> Result<Vec<LogRecord>, PersistenceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut start = file.metadata().await?.len();
        let mut block = TAIL_BLOCK;
        let mut tail: Vec<u8> = Vec::new();
        loop {
            let from = start.saturating_sub(block);
            let mut chunk = vec![0u8; (start - from) as usize];
            file.seek(SeekFrom::Start(from)).await?;
            file.read_exact(&mut chunk).await?;
            chunk.extend_from_slice(&tail);
            tail = chunk;
            start = from;
            block = block.saturating_mul(2);

            let (records, skipped) = self.parse_tail(&tail, start > 0);
            if records.len() >= limit || start == 0 {
                if skipped > 0 {
                    tracing::debug!(skipped, path = %self.path.display(), "Skipped malformed log lines");
                }
                let keep_from = records.len().saturating_sub(limit);
                return Ok(records.into_iter().skip(keep_from).collect());
            }
        }
    }

    async fn export(&self) -> Result<Option<String>, PersistenceError> {
        Ok(self.read_complete().await?.filter(|text| !text.is_empty()))
    }
}
