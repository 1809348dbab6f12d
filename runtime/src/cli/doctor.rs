//! Environment readiness check.

use crate::cli::output::{self, Styled};
use crate::config::RelayConfig;
use crate::renderer::chromium::find_chromium;
use crate::store::{RecordStore, SettingsStore, SqliteStore};
use anyhow::Result;
use serde_json::json;

/// Check the browser, the store, and the configured endpoints.
pub async fn run(config: &RelayConfig) -> Result<()> {
    let s = Styled::new();
    let chromium = find_chromium();
    let store = SqliteStore::open(&config.store_path);

    let (store_ok, clip, settings) = match &store {
        Ok(store) => (
            true,
            store.load().ok().flatten().map(|r| r.title),
            store.load_settings().ok(),
        ),
        Err(_) => (false, None, None),
    };
    let browser_ready = chromium.is_some() || config.devtools_url.is_some();

    if output::is_json() {
        output::print_json(&json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "devtools_url": config.devtools_url,
            "store": config.store_path.display().to_string(),
            "store_ok": store_ok,
            "clip": clip,
            "translate_url": config.translate_url,
            "translate_enabled": settings.as_ref().map(|st| st.translate_enabled),
            "ready": browser_ready && store_ok,
        }));
        return Ok(());
    }

    output::print_header(&s);
    output::print_check(
        s.ok_sym(),
        "System",
        &format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
    );

    match (&chromium, &config.devtools_url) {
        (_, Some(ws)) => output::print_check(s.ok_sym(), "Browser", &format!("connect {ws}")),
        (Some(path), None) => {
            output::print_check(s.ok_sym(), "Chromium", &path.display().to_string())
        }
        (None, None) => {
            output::print_check(s.fail_sym(), "Chromium", "not found");
            output::print_detail("Install Chrome, set RELAY_CHROMIUM_PATH, or pass --connect.");
        }
    }

    match &store {
        Ok(_) => output::print_check(s.ok_sym(), "Store", &config.store_path.display().to_string()),
        Err(e) => {
            output::print_check(s.fail_sym(), "Store", &config.store_path.display().to_string());
            output::print_detail(&format!("{e:#}"));
        }
    }
    match &clip {
        Some(title) => output::print_check(s.ok_sym(), "Clip", title),
        None => output::print_check(s.warn_sym(), "Clip", "nothing copied yet"),
    }

    let translate = match &settings {
        Some(st) if st.translate_enabled => format!("on, to '{}' via {}", st.target_lang, config.translate_url),
        Some(_) => "off".to_string(),
        None => "unknown".to_string(),
    };
    output::print_check(s.ok_sym(), "Translation", &translate);

    eprintln!();
    if browser_ready && store_ok {
        eprintln!("  {}: {}", s.bold("Status"), s.green("READY"));
    } else {
        eprintln!("  {}: {}", s.bold("Status"), s.red("NOT READY"));
    }
    Ok(())
}
