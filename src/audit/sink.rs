use std::path::Path;

use axum::http::{HeaderMap, Uri};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::audit::entry::{AuditEvent, AuditValue, Level, RequestSnapshot};
use crate::audit::writer::{AuditWriteError, AuditWriter};

/// Channel buffer size between producers and the background writer task.
const CHANNEL_BUFFER: usize = 1024;

/// Flush the writer after this many seconds of channel inactivity.
const FLUSH_INTERVAL_SECS: u64 = 1;

/// Cloneable, non-blocking handle submitting events to the audit writer.
///
/// Submitting never waits: when the channel is full or the writer task has
/// exited the event is dropped and a warning is logged.
#[derive(Clone, Debug)]
pub struct AuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditSink {
    /// Spawn the background writer for `dir` and return a `(sink, join_handle)` pair.
    ///
    /// The task exits after a final flush once every `AuditSink` clone is dropped.
    pub async fn start(
        dir: impl AsRef<Path>,
    ) -> Result<(Self, JoinHandle<()>), AuditWriteError> {
        let (tx, rx) = mpsc::channel::<AuditEvent>(CHANNEL_BUFFER);
        let mut writer = AuditWriter::new(dir).await?;

        let handle = tokio::spawn(async move {
            run_writer_loop(&mut writer, rx).await;
        });

        Ok((Self { tx }, handle))
    }

    /// Submit an event.
    pub fn log(&self, event: AuditEvent) {
        if let Err(err) = self.tx.try_send(event) {
            let level = match &err {
                mpsc::error::TrySendError::Full(e) | mpsc::error::TrySendError::Closed(e) => e.level(),
            };
            tracing::warn!(?level, error = %err, "audit event dropped");
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(AuditEvent::message(Level::Debug, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(AuditEvent::message(Level::Error, message));
    }

    pub fn key_value(&self, level: Level, key: &str, value: impl Into<String>) {
        self.log(AuditEvent::key_value(level, key, AuditValue::Text(value.into())));
    }

    pub fn headers(&self, level: Level, key: &str, headers: &HeaderMap) {
        self.log(AuditEvent::key_value(level, key, AuditValue::from(headers)));
    }

    pub fn url(&self, level: Level, key: &str, uri: &Uri) {
        self.log(AuditEvent::key_value(level, key, AuditValue::from(uri)));
    }

    pub fn request(&self, snapshot: RequestSnapshot) {
        self.log(AuditEvent::Request(Box::new(snapshot)));
    }
}

async fn run_writer_loop(writer: &mut AuditWriter, mut rx: mpsc::Receiver<AuditEvent>) {
    let flush_interval = tokio::time::Duration::from_secs(FLUSH_INTERVAL_SECS);
    let mut dirty = false;

    loop {
        match tokio::time::timeout(flush_interval, rx.recv()).await {
            Ok(Some(event)) => {
                if let Err(err) = writer.write(&event).await {
                    tracing::error!(%err, "failed to write audit event");
                } else {
                    dirty = true;
                }
            }
            // All senders dropped.
            Ok(None) => {
                if dirty {
                    if let Err(err) = writer.flush().await {
                        tracing::error!(%err, "failed to flush audit log on shutdown");
                    }
                }
                tracing::debug!("audit writer task shutting down");
                return;
            }
            Err(_) => {
                if dirty {
                    if let Err(err) = writer.flush().await {
                        tracing::error!(%err, "periodic audit log flush failed");
                    } else {
                        dirty = false;
                    }
                }
            }
        }
    }
}
