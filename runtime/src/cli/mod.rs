//! CLI subcommand implementations for the `relay` binary.

pub mod copy_cmd;
pub mod doctor;
pub mod output;
pub mod paste_cmd;
pub mod serve;
pub mod settings_cmd;
pub mod show_cmd;

use crate::config::RelayConfig;
use crate::protocol::Dispatcher;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use crate::store::SqliteStore;
use crate::translate::GoogleTranslator;
use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Open the configured store.
pub fn open_store(config: &RelayConfig) -> Result<Arc<SqliteStore>> {
    Ok(Arc::new(SqliteStore::open(&config.store_path)?))
}

/// Connect to the configured browser, or launch one.
pub async fn open_renderer(config: &RelayConfig) -> Result<Arc<dyn Renderer>> {
    let renderer = match &config.devtools_url {
        Some(ws) => {
            info!("connecting to browser at {ws}");
            ChromiumRenderer::connect(ws).await?
        }
        None => ChromiumRenderer::launch(config.headful).await?,
    };
    Ok(Arc::new(renderer))
}

/// Wire a dispatcher for one CLI session.
pub async fn build_dispatcher(config: &RelayConfig) -> Result<Dispatcher> {
    let store = open_store(config)?;
    let renderer = open_renderer(config).await?;
    let translator = Arc::new(GoogleTranslator::with_base_url(&config.translate_url));
    Ok(Dispatcher::new(renderer, store.clone(), store, translator)
        .attach_tabs(config.devtools_url.is_some())
        .keep_fill_tab(config.keeps_fill_tab()))
}

/// Cancel `token` on the first Ctrl-C.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, abandoning the current pass");
            token.cancel();
        }
    });
}
