//! Text translation collaborator.
//!
//! Translation is fallible and slow. Callers go through
//! [`translate_or_original`], which never fails except on cancellation.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use model_relay::{is_english, RelayError, Settings};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Public endpoint of the free web translation API.
pub const DEFAULT_TRANSLATE_URL: &str = "https://translate.googleapis.com";

/// Request timeout for one translation call.
const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Translate text into a target language.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String>;
}

/// Client for the `translate_a/single` endpoint.
#[derive(Clone)]
pub struct GoogleTranslator {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleTranslator {
    /// Client against the public endpoint.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_TRANSLATE_URL)
    }

    /// Client against another host serving the same API.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(TRANSLATE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for GoogleTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        let url = format!("{}/translate_a/single", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target_lang),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .context("translation request failed")?;

        let status = resp.status();
        if !status.is_success() {
            bail!(RelayError::Translation(format!("HTTP {}", status.as_u16())));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .context("translation response is not JSON")?;

        let translated = flatten_segments(&body)
            .ok_or_else(|| RelayError::Translation("unexpected response shape".into()))?;
        if translated.trim().is_empty() {
            debug!("translation came back empty, keeping input");
            return Ok(text.to_string());
        }
        Ok(translated)
    }
}

/// Join the translated segments of a response: `body[0][*][0]`.
fn flatten_segments(body: &serde_json::Value) -> Option<String> {
    let segments = body.get(0)?.as_array()?;
    Some(
        segments
            .iter()
            .filter_map(|seg| seg.get(0).and_then(|s| s.as_str()))
            .collect(),
    )
}

/// Returns its input unchanged. Used when translation is disabled.
pub struct NoopTranslator;

#[async_trait]
impl Translator for NoopTranslator {
    async fn translate(&self, text: &str, _target_lang: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Whether `text` should go to the translator under `settings`.
pub fn needs_translation(text: &str, settings: &Settings) -> bool {
    settings.translate_enabled && !text.trim().is_empty() && !is_english(text)
}

/// Translate when [`needs_translation`] says so, falling back to the
/// original on any translator error. Only cancellation is an error.
pub async fn translate_or_original(
    text: &str,
    translator: &dyn Translator,
    settings: &Settings,
    cancel: &CancellationToken,
) -> Result<String> {
    if !needs_translation(text, settings) {
        return Ok(text.to_string());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RelayError::Cancelled.into()),
        result = translator.translate(text, &settings.target_lang) => match result {
            Ok(translated) => Ok(translated),
            Err(e) => {
                warn!("translation failed, keeping original text: {e:#}");
                Ok(text.to_string())
            }
        },
    }
}
