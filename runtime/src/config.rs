//! Runtime configuration resolution.
//!
//! Each setting resolves from an explicit flag, then an environment
//! variable, then a default.

use crate::store::default_store_path;
use crate::translate::DEFAULT_TRANSLATE_URL;
use std::path::PathBuf;

/// Store file override.
pub const ENV_STORE: &str = "RELAY_STORE";

/// DevTools websocket of an already running browser.
pub const ENV_DEVTOOLS_URL: &str = "RELAY_DEVTOOLS_URL";

/// Alternative host for the translation API.
pub const ENV_TRANSLATE_URL: &str = "RELAY_TRANSLATE_URL";

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub store_path: PathBuf,
    /// Connect to this browser instead of launching one.
    pub devtools_url: Option<String>,
    pub translate_url: String,
    pub headful: bool,
}

impl RelayConfig {
    /// Resolve from flags and the process environment.
    pub fn resolve(store: Option<&str>, connect: Option<&str>, headful: bool) -> Self {
        Self::resolve_with(store, connect, headful, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with(
        store: Option<&str>,
        connect: Option<&str>,
        headful: bool,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let nonempty = |v: String| if v.trim().is_empty() { None } else { Some(v) };

        let store_path = store
            .map(PathBuf::from)
            .or_else(|| env(ENV_STORE).and_then(nonempty).map(PathBuf::from))
            .unwrap_or_else(default_store_path);

        let devtools_url = connect
            .map(str::to_string)
            .or_else(|| env(ENV_DEVTOOLS_URL).and_then(nonempty));

        let translate_url = env(ENV_TRANSLATE_URL)
            .and_then(nonempty)
            .unwrap_or_else(|| DEFAULT_TRANSLATE_URL.to_string());

        Self {
            store_path,
            devtools_url,
            translate_url,
            headful,
        }
    }

    /// Configuration for filling the wizard. The user submits the form
    /// by hand, so a launched browser is always shown.
    pub fn for_paste(&self) -> Self {
        Self {
            headful: self.headful || self.devtools_url.is_none(),
            ..self.clone()
        }
    }

    /// Whether the filled tab outlives the pass.
    pub fn keeps_fill_tab(&self) -> bool {
        self.headful || self.devtools_url.is_some()
    }
}
