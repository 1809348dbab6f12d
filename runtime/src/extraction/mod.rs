//! Extractor: one pass over a source page produces one [`ModelRecord`].
//!
//! The pass resolves the title first (it may have to wait for the page to
//! render), then harvests every other field from a fresh snapshot, then
//! post-processes the title and description. Missing fields fall back to
//! their sentinels; only cancellation and document errors fail the pass.

pub mod description;
pub mod fields;
pub mod locate;
pub mod source;
pub mod title;

use crate::translate::Translator;
use anyhow::Result;
use model_relay::{ModelRecord, Settings};
use source::DocumentSource;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Timeouts of an extraction pass.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// How long to watch for a title heading to render.
    pub title_timeout: Duration,
    /// Snapshot interval while watching.
    pub poll_interval: Duration,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            title_timeout: Duration::from_millis(6000),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Runs extraction passes.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    options: ExtractOptions,
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract a finalized record from `doc`.
    ///
    /// An empty title is returned as-is; callers report it as "title not
    /// found" and must not persist the record.
    pub async fn extract(
        &self,
        doc: &dyn DocumentSource,
        translator: &dyn Translator,
        settings: &Settings,
        cancel: &CancellationToken,
    ) -> Result<ModelRecord> {
        let resolved = title::resolve_title(doc, &self.options, cancel).await?;
        crate::wait::ensure_live(cancel)?;

        let html = doc.snapshot().await?;
        let harvest = fields::harvest(&html);

        let description = description::finish_description(
            &harvest.raw_description,
            &resolved.title,
            translator,
            settings,
            cancel,
        )
        .await?;

        let title = if resolved.title.is_empty() {
            String::new()
        } else {
            description::finish_title(&resolved.title, translator, settings, cancel).await?
        };

        let record = ModelRecord {
            title,
            model_type: harvest.model_type,
            category: harvest.category,
            version_name: harvest.version_name,
            base_model: harvest.base_model,
            description,
            trigger_groups: harvest.trigger_groups,
        }
        .finalize();

        info!(
            title = %record.title,
            groups = record.trigger_groups.len(),
            "extraction finished ({:?})",
            resolved.source
        );

        let groups = record.trigger_groups.len();
        if let Err(e) = doc
            .toast(&format!("\u{2705} Copied {groups} trigger group(s)"))
            .await
        {
            warn!("could not show toast: {e:#}");
        }
        Ok(record)
    }
}
