//! `relay copy <url>`: extract a source page and save the record.

use crate::cli::output::{self, Styled};
use crate::config::RelayConfig;
use anyhow::Result;
use model_relay::RelayError;

pub async fn run(config: &RelayConfig, url: &str) -> Result<()> {
    let s = Styled::new();
    let dispatcher = super::build_dispatcher(config).await?;
    super::cancel_on_ctrl_c(dispatcher.shutdown_token());

    let outcome = dispatcher.extract(url).await;
    dispatcher.renderer().shutdown().await.ok();
    let outcome = outcome?;

    if !outcome.ok {
        return Err(RelayError::TitleNotFound.into());
    }

    if output::is_json() {
        output::print_json(&serde_json::to_value(&outcome)?);
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    let record = &outcome.record;
    eprintln!("  {} Copied {}", s.ok_sym(), s.bold(&record.title));
    eprintln!("{}", output::indent(&s.dim(&record.summary()), 4));
    eprintln!(
        "    {} trigger group(s), {} chars of description",
        record.trigger_groups.len(),
        record.description.chars().count()
    );
    Ok(())
}
