//! Chromium-based renderer using chromiumoxide.

use super::{NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use model_relay::RelayError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. RELAY_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("RELAY_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.model-relay/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".model-relay/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".model-relay/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".model-relay/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".model-relay/chromium/chrome-linux64/chrome"),
                home.join(".model-relay/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a local Chromium instance. `headful` shows the window so the
    /// user can finish the form by hand.
    pub async fn launch(headful: bool) -> Result<Self> {
        let chrome_path = find_chromium().ok_or_else(|| {
            RelayError::Browser("Chromium not found. Set RELAY_CHROMIUM_PATH or install Chrome.".into())
        })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        if headful {
            builder = builder.with_head();
        } else {
            builder = builder.arg("--headless=new");
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RelayError::Browser(format!("failed to launch Chromium: {e}")))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Connect to a running browser through its DevTools websocket URL
    /// (e.g. Chrome started with `--remote-debugging-port`).
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (mut browser, mut handler) = Browser::connect(ws_url).await.map_err(|e| {
            RelayError::Browser(format!("failed to connect to browser at {ws_url}: {e}"))
        })?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        if let Err(e) = browser.fetch_targets().await {
            tracing::warn!("could not list existing tabs: {e}");
        }

        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            owned: true,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn attach(&self, url_fragment: &str) -> Result<Box<dyn RenderContext>> {
        let wanted = comparable_url(url_fragment);
        let pages = self.browser.pages().await.context("failed to list tabs")?;
        for page in pages {
            let url = page.url().await.ok().flatten().unwrap_or_default();
            if !wanted.is_empty() && comparable_url(&url).contains(&wanted) {
                tracing::info!("attached to open tab {url}");
                self.active_count.fetch_add(1, Ordering::Relaxed);
                return Ok(Box::new(ChromiumContext {
                    page,
                    owned: false,
                    active_count: Arc::clone(&self.active_count),
                }));
            }
        }
        bail!("no open tab matches '{url_fragment}'")
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser is dropped when ChromiumRenderer is dropped
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// Host plus path of a URL, without scheme, query, or trailing slash, so a
/// user-typed URL matches the tab's canonical one.
fn comparable_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(u) => format!(
            "{}{}",
            u.host_str().unwrap_or_default().trim_start_matches("www."),
            u.path().trim_end_matches('/')
        ),
        Err(_) => raw.trim().trim_end_matches('/').to_string(),
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    /// Whether we opened this tab (and may close it).
    owned: bool,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_response)) => {
                let _ = self.page.wait_for_navigation().await;

                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        let html: String = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))?;

        Ok(html)
    }

    async fn get_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .unwrap_or_default();
        Ok(url)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        if self.owned {
            let _ = self.page.close().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparable_url() {
        assert_eq!(
            comparable_url("https://www.civitai.com/models/123/"),
            "civitai.com/models/123"
        );
        assert_eq!(
            comparable_url("https://civitai.com/models/123?modelVersionId=9"),
            "civitai.com/models/123"
        );
        assert_eq!(comparable_url("yodayo.com/models/new/"), "yodayo.com/models/new");
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_navigate_and_snapshot() {
        let renderer = ChromiumRenderer::launch(false)
            .await
            .expect("failed to create renderer");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");

        let nav = ctx
            .navigate("data:text/html,<h1>Cat Ears</h1><p>LoRA</p>", 10000)
            .await
            .expect("navigation failed");
        assert!(nav.load_time_ms < 10000);

        let result = ctx
            .execute_js("document.querySelector('h1').textContent")
            .await
            .expect("JS execution failed");
        assert_eq!(result.as_str().unwrap(), "Cat Ears");

        let html = ctx.get_html().await.expect("get_html failed");
        assert!(html.contains("<h1>Cat Ears</h1>"));

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);

        renderer.shutdown().await.expect("shutdown failed");
    }
}
