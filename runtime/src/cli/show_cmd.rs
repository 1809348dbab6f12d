//! `relay show`: print the saved clip.

use crate::cli::output::{self, Styled};
use crate::config::RelayConfig;
use crate::store::{RecordStore, CLIP_KEY};
use anyhow::Result;

pub async fn run(config: &RelayConfig) -> Result<()> {
    let s = Styled::new();
    let store = super::open_store(config)?;
    let record = store.load()?;

    if output::is_json() {
        output::print_json(&serde_json::json!({ "record": record }));
        return Ok(());
    }

    let Some(record) = record else {
        eprintln!("  {} Nothing copied yet.", s.warn_sym());
        return Ok(());
    };

    println!("{}", record.summary());
    if !output::is_quiet() {
        if let Some(at) = store.saved_at(CLIP_KEY)? {
            eprintln!("{}", s.dim(&format!("saved {}", at.format("%Y-%m-%d %H:%M UTC"))));
        }
    }
    for (i, group) in record.trigger_groups.iter().enumerate() {
        println!("  #{} {}", i + 1, group.join(", "));
    }
    if !record.description.is_empty() {
        println!();
        println!("{}", record.description);
    }
    Ok(())
}
