//! Where the Extractor reads its document from.

use crate::renderer::RenderContext;
use crate::script;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A source document that can be snapshotted repeatedly while it renders.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Current serialized HTML of the document.
    async fn snapshot(&self) -> Result<String>;
    /// Show a transient toast on the page. Purely cosmetic.
    async fn toast(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// A live browser tab.
pub struct LiveDocument<'a> {
    ctx: &'a dyn RenderContext,
}

impl<'a> LiveDocument<'a> {
    pub fn new(ctx: &'a dyn RenderContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DocumentSource for LiveDocument<'_> {
    async fn snapshot(&self) -> Result<String> {
        self.ctx.get_html().await
    }

    async fn toast(&self, message: &str) -> Result<()> {
        self.ctx.execute_js(&script::toast_script(message)).await?;
        Ok(())
    }
}

/// Fixed HTML, or a scripted sequence of snapshots that simulates a page
/// still rendering. Each `snapshot` call advances one step and the last
/// snapshot repeats forever.
pub struct StaticDocument {
    snapshots: Vec<String>,
    cursor: AtomicUsize,
    toasts: Mutex<Vec<String>>,
}

impl StaticDocument {
    pub fn new(html: impl Into<String>) -> Self {
        Self::sequence(vec![html.into()])
    }

    pub fn sequence(snapshots: Vec<String>) -> Self {
        Self {
            snapshots,
            cursor: AtomicUsize::new(0),
            toasts: Mutex::new(Vec::new()),
        }
    }

    /// Number of snapshots taken so far.
    pub fn snapshots_taken(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Toasts shown so far.
    pub fn toasts(&self) -> Vec<String> {
        self.toasts.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DocumentSource for StaticDocument {
    async fn snapshot(&self) -> Result<String> {
        let n = self.cursor.fetch_add(1, Ordering::SeqCst);
        let idx = n.min(self.snapshots.len().saturating_sub(1));
        Ok(self.snapshots.get(idx).cloned().unwrap_or_default())
    }

    async fn toast(&self, message: &str) -> Result<()> {
        if let Ok(mut toasts) = self.toasts.lock() {
            toasts.push(message.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_sticks_on_last_snapshot() {
        let doc = StaticDocument::sequence(vec!["a".into(), "b".into()]);
        assert_eq!(doc.snapshot().await.unwrap(), "a");
        assert_eq!(doc.snapshot().await.unwrap(), "b");
        assert_eq!(doc.snapshot().await.unwrap(), "b");
        assert_eq!(doc.snapshots_taken(), 3);
    }

    #[tokio::test]
    async fn test_toasts_are_recorded() {
        let doc = StaticDocument::new("<html></html>");
        doc.toast("hello").await.unwrap();
        assert_eq!(doc.toasts(), vec!["hello".to_string()]);
    }
}
