//! `relay paste <url>`: fill the target wizard with the saved record.

use crate::cli::output::{self, Styled};
use crate::config::RelayConfig;
use crate::injection::GroupStatus;
use crate::store::RecordStore;
use anyhow::{Context, Result};
use model_relay::ModelRecord;
use std::path::Path;

pub async fn run(config: &RelayConfig, url: &str, record_file: Option<&Path>) -> Result<()> {
    let s = Styled::new();
    let config = &config.for_paste();
    let record = match record_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<ModelRecord>(&raw)
                .context("record file is not a valid record")?
                .finalize()
        }
        None => super::open_store(config)?
            .load()?
            .context("nothing copied yet, run `relay copy` first")?,
    };
    let groups = record.trigger_groups.clone();

    let dispatcher = super::build_dispatcher(config).await?;
    super::cancel_on_ctrl_c(dispatcher.shutdown_token());

    let result = dispatcher.fill(url, Some(record)).await;
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            dispatcher.renderer().shutdown().await.ok();
            return Err(e);
        }
    };

    if output::is_json() {
        output::print_json(&serde_json::to_value(&report)?);
    } else if !output::is_quiet() {
        eprintln!(
            "  {} Filled step 1 and step 2 ({}/{} trigger group(s))",
            s.ok_sym(),
            report.groups_succeeded(),
            report.groups.len()
        );
        if let Some(base) = &report.base_model {
            eprintln!("    base model: {base}");
        } else {
            eprintln!("    {} base model left at its default", s.warn_sym());
        }
        for (i, status) in report.groups.iter().enumerate() {
            let words = groups.get(i).map(|g| g.join(", ")).unwrap_or_default();
            match status {
                GroupStatus::Succeeded => eprintln!("    {} {words}", s.ok_sym()),
                GroupStatus::Failed(reason) => {
                    eprintln!("    {} {words} {}", s.fail_sym(), s.red(&format!("({reason})")))
                }
                GroupStatus::Pending => eprintln!("    {} {words}", s.warn_sym()),
            }
        }
    }

    // A launched window stays up so the user can review and submit.
    if config.headful && config.devtools_url.is_none() {
        if !output::is_quiet() {
            eprintln!("  Finish the form in the browser window. Press Ctrl-C to quit.");
        }
        dispatcher.shutdown_token().cancelled().await;
    }
    dispatcher.renderer().shutdown().await.ok();
    Ok(())
}
