#![allow(dead_code)] // embedded by autosaving frontends, exercised here by tests

//! Debounced document autosave: edits within a short window collapse into
//! one write and the last content wins. The timer is an owned task handle,
//! aborted on every new save and on drop — never an ambient timeout left to
//! the runtime to collect.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::AppError;

/// Default debounce window, matching the editor's autosave cadence.
pub const SAVE_DEBOUNCE: Duration = Duration::from_secs(2);

#[async_trait]
pub trait DocumentSink: Send + Sync + 'static {
    async fn write(&self, document_id: Uuid, content: Value) -> Result<(), AppError>;
}

struct Inner {
    sink: Arc<dyn DocumentSink>,
    latest: Mutex<Option<(Uuid, Value)>>,
}

impl Inner {
    async fn write_latest(&self) {
        let taken = self.latest.lock().unwrap().take();
        if let Some((document_id, content)) = taken {
            if let Err(e) = self.sink.write(document_id, content).await {
                tracing::warn!("autosave of document {document_id} failed: {e}");
            }
        }
    }
}

pub struct DebouncedSaver {
    inner: Arc<Inner>,
    window: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DebouncedSaver {
    pub fn new(sink: Arc<dyn DocumentSink>, window: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                latest: Mutex::new(None),
            }),
            window,
            pending: Mutex::new(None),
        }
    }

    /// Records the content as the latest pending state and (re)arms the
    /// write timer. Consecutive calls within the window supersede each
    /// other; only the last content reaches the sink.
    pub fn save(&self, document_id: Uuid, content: Value) {
        *self.inner.latest.lock().unwrap() = Some((document_id, content));

        let mut pending = self.pending.lock().unwrap();
        if let Some(armed) = pending.take() {
            armed.abort();
        }

        let inner = Arc::clone(&self.inner);
        let window = self.window;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            inner.write_latest().await;
        }));
    }

    /// Cancels the timer and writes any pending content immediately.
    pub async fn flush(&self) {
        let armed = self.pending.lock().unwrap().take();
        if let Some(armed) = armed {
            armed.abort();
        }
        self.inner.write_latest().await;
    }
}

impl Drop for DebouncedSaver {
    fn drop(&mut self) {
        if let Some(armed) = self.pending.lock().unwrap().take() {
            armed.abort();
        }
    }
}

/// Production sink: replaces the document's content column.
pub struct PgDocumentSink {
    db: PgPool,
}

impl PgDocumentSink {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentSink for PgDocumentSink {
    async fn write(&self, document_id: Uuid, content: Value) -> Result<(), AppError> {
        sqlx::query("UPDATE documents SET content = $1, updated_at = NOW() WHERE id = $2")
            .bind(content)
            .bind(document_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
