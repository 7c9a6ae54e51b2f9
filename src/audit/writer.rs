use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::io::AsyncWriteExt;

use crate::audit::entry::AuditEvent;

/// Errors that can occur during audit log I/O.
#[derive(Debug, thiserror::Error)]
pub enum AuditWriteError {
    #[error("failed to create audit log directory: {0}")]
    CreateDir(std::io::Error),

    #[error("failed to open audit log file: {0}")]
    OpenFile(std::io::Error),

    #[error("failed to serialize audit event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write to audit log: {0}")]
    Write(std::io::Error),

    #[error("failed to flush audit log: {0}")]
    Flush(std::io::Error),
}

/// Name of the log file receiving events written on `date`.
pub fn file_name_for(date: NaiveDate) -> String {
    format!("{}_log.jsonl", date.format("%Y%m%d"))
}

/// Append-only JSON-lines writer rolling over to a new file every day.
pub struct AuditWriter {
    dir: PathBuf,
    current: Option<(NaiveDate, tokio::fs::File)>,
}

impl AuditWriter {
    /// Prepare a writer for `dir`, creating the directory if needed.
    ///
    /// Files are opened lazily on the first write of each day.
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self, AuditWriteError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(AuditWriteError::CreateDir)?;

        Ok(Self { dir, current: None })
    }

    /// Serialize `event` as a single JSON line and append it to today's file.
    pub async fn write(&mut self, event: &AuditEvent) -> Result<(), AuditWriteError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let today = chrono::Local::now().date_naive();
        let file = self.file_for(today).await?;
        file.write_all(&line).await.map_err(AuditWriteError::Write)
    }

    /// Flush the currently open file, if any.
    pub async fn flush(&mut self) -> Result<(), AuditWriteError> {
        match self.current.as_mut() {
            Some((_, file)) => file.flush().await.map_err(AuditWriteError::Flush),
            None => Ok(()),
        }
    }

    async fn file_for(&mut self, date: NaiveDate) -> Result<&mut tokio::fs::File, AuditWriteError> {
        if let Some((open, old)) = self.current.as_mut() {
            if *open != date {
                old.flush().await.map_err(AuditWriteError::Flush)?;
                self.current = None;
            }
        }

        let file = match self.current.take() {
            Some((_, file)) => file,
            None => tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.dir.join(file_name_for(date)))
                .await
                .map_err(AuditWriteError::OpenFile)?,
        };
        Ok(&mut self.current.insert((date, file)).1)
    }
}
