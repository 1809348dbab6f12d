//! Renderer abstraction for browser-based page access.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The Extractor
//! reads snapshots through a context; the Injector drives one with scripts.

pub mod chromium;

use anyhow::Result;
use model_relay::RelayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can create or adopt rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Adopt an already open tab whose URL contains `url_fragment`.
    ///
    /// Adopted contexts are not owned: closing them leaves the tab open.
    async fn attach(&self, url_fragment: &str) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A renderer used when Chromium is unavailable.
///
/// Every context request fails, so commands report a clear error instead of
/// hanging on a missing browser.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Err(RelayError::Browser("browser not available, run `relay doctor`".into()).into())
    }
    async fn attach(&self, url_fragment: &str) -> Result<Box<dyn RenderContext>> {
        Err(RelayError::Browser(format!(
            "browser not available, cannot attach to a tab matching '{url_fragment}'"
        ))
        .into())
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
}

/// Open a context on `url`: adopt a matching tab when `attach` is set,
/// otherwise create a fresh tab and navigate.
pub async fn open_page(
    renderer: &dyn Renderer,
    url: &str,
    attach: bool,
    timeout_ms: u64,
) -> Result<Box<dyn RenderContext>> {
    if attach {
        match renderer.attach(url).await {
            Ok(ctx) => return Ok(ctx),
            Err(e) => tracing::warn!("no open tab matches {url}: {e:#}; opening a new one"),
        }
    }
    let mut ctx = renderer.new_context().await?;
    ctx.navigate(url, timeout_ms).await?;
    Ok(ctx)
}
