//! Core data types shared by the Extractor and the Injector.

use serde::{Deserialize, Serialize};

/// Sentinel for a model type that was not found on the source page.
pub const UNKNOWN_MODEL_TYPE: &str = "?";

/// Sentinel for a base model that was not found on the source page.
pub const UNKNOWN_BASE_MODEL: &str = "Unknown";

/// Placeholder version name used when the source page shows none.
pub const DEFAULT_VERSION_NAME: &str = "v1.0";

/// An ordered list of trigger-word groups.
pub type TriggerGroups = Vec<Vec<String>>;

/// The transfer record produced by one extraction pass and consumed by one
/// injection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_model_type")]
    pub model_type: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_version_name")]
    pub version_name: String,
    #[serde(default = "default_base_model")]
    pub base_model: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub trigger_groups: TriggerGroups,
}

fn default_model_type() -> String {
    UNKNOWN_MODEL_TYPE.to_string()
}

fn default_version_name() -> String {
    DEFAULT_VERSION_NAME.to_string()
}

fn default_base_model() -> String {
    UNKNOWN_BASE_MODEL.to_string()
}

impl Default for ModelRecord {
    fn default() -> Self {
        Self {
            title: String::new(),
            model_type: default_model_type(),
            category: String::new(),
            version_name: default_version_name(),
            base_model: default_base_model(),
            description: String::new(),
            trigger_groups: Vec::new(),
        }
    }
}

impl ModelRecord {
    /// Apply end-of-pass normalization.
    ///
    /// Underscores in `title` and `description` become spaces; trigger words
    /// are trimmed and deduplicated in first-seen order; empty words and
    /// empty groups are dropped. Group and word order are otherwise kept.
    pub fn finalize(mut self) -> Self {
        self.title = self.title.replace('_', " ").trim().to_string();
        self.description = self.description.replace('_', " ").trim().to_string();

        if self.model_type.trim().is_empty() {
            self.model_type = default_model_type();
        }
        if self.base_model.trim().is_empty() {
            self.base_model = default_base_model();
        }
        if self.version_name.trim().is_empty() {
            self.version_name = default_version_name();
        }

        self.trigger_groups = self
            .trigger_groups
            .into_iter()
            .map(dedup_words)
            .filter(|g| !g.is_empty())
            .collect();
        self
    }

    /// Reject records that must never be persisted.
    pub fn validate(&self) -> RelayResult<()> {
        if self.title.trim().is_empty() {
            return Err(RelayError::TitleNotFound);
        }
        if self.trigger_groups.iter().any(|g| g.is_empty()) {
            return Err(RelayError::InvalidRecord(
                "trigger groups must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the model type was found on the source page.
    pub fn has_model_type(&self) -> bool {
        !self.model_type.is_empty() && self.model_type != UNKNOWN_MODEL_TYPE
    }

    /// Whether the base model was found on the source page.
    pub fn has_base_model(&self) -> bool {
        !self.base_model.is_empty() && self.base_model != UNKNOWN_BASE_MODEL
    }

    /// Three-line clip preview: title, `[type] category`, version and base.
    pub fn summary(&self) -> String {
        let category = if self.category.is_empty() {
            UNKNOWN_MODEL_TYPE
        } else {
            self.category.as_str()
        };
        format!(
            "{}\n[{}] {}\nver: {} | base: {}",
            self.title, self.model_type, category, self.version_name, self.base_model
        )
    }
}

/// Trim and deduplicate a group's words, keeping first occurrences.
fn dedup_words(group: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(group.len());
    for word in group {
        let word = word.trim();
        if word.is_empty() || out.iter().any(|w| w == word) {
            continue;
        }
        out.push(word.to_string());
    }
    out
}

/// User settings read at extraction and injection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub translate_enabled: bool,
    pub target_lang: String,
    pub ignore_words: Vec<String>,
    pub wallpaper_data_url: Option<String>,
    pub wallpaper_opacity: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            translate_enabled: true,
            target_lang: "en".to_string(),
            ignore_words: vec!["LoRA".to_string(), "Checkpoint".to_string()],
            wallpaper_data_url: None,
            wallpaper_opacity: 0.9,
        }
    }
}

/// Reply to a FILL request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FillResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Hard failures of an extraction or injection pass.
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("Could not find model title on this page")]
    TitleNotFound,

    #[error("Step 2 of the form did not render within {timeout_ms}ms")]
    Step2Timeout { timeout_ms: u64 },

    #[error("Pass cancelled")]
    Cancelled,

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Translation error: {0}")]
    Translation(String),
}

/// Convenience result type.
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_default_uses_sentinels() {
        let rec = ModelRecord::default();
        assert_eq!(rec.model_type, "?");
        assert_eq!(rec.base_model, "Unknown");
        assert_eq!(rec.version_name, "v1.0");
        assert!(rec.trigger_groups.is_empty());
    }

    #[test]
    fn test_finalize_filters_and_dedups_groups() {
        let rec = ModelRecord {
            title: "my_cool_lora".to_string(),
            trigger_groups: vec![
                words(&["red hair", "blue eyes", "red hair"]),
                words(&[" ", ""]),
                words(&["masterpiece"]),
            ],
            ..Default::default()
        }
        .finalize();

        assert_eq!(rec.title, "my cool lora");
        assert_eq!(
            rec.trigger_groups,
            vec![words(&["red hair", "blue eyes"]), words(&["masterpiece"])]
        );
    }

    #[test]
    fn test_finalize_only_touches_title_and_description_underscores() {
        let rec = ModelRecord {
            title: "a_b".to_string(),
            description: "c_d".to_string(),
            category: "e_f".to_string(),
            ..Default::default()
        }
        .finalize();
        assert_eq!(rec.title, "a b");
        assert_eq!(rec.description, "c d");
        assert_eq!(rec.category, "e_f");
    }

    #[test]
    fn test_validate_rejects_empty_title() {
        let rec = ModelRecord::default();
        assert!(matches!(rec.validate(), Err(RelayError::TitleNotFound)));
    }

    #[test]
    fn test_deserialize_missing_fields_gets_sentinels() {
        let rec: ModelRecord = serde_json::from_str(r#"{"title":"X"}"#).unwrap();
        assert_eq!(rec.title, "X");
        assert_eq!(rec.model_type, "?");
        assert_eq!(rec.base_model, "Unknown");
        assert_eq!(rec.version_name, "v1.0");
    }

    #[test]
    fn test_serialized_field_names_are_camel_case() {
        let json = serde_json::to_value(ModelRecord::default()).unwrap();
        assert!(json.get("modelType").is_some());
        assert!(json.get("triggerGroups").is_some());
        assert!(json.get("versionName").is_some());
    }

    #[test]
    fn test_summary() {
        let rec = ModelRecord {
            title: "Cat Ears".to_string(),
            model_type: "LORA".to_string(),
            category: "concept".to_string(),
            base_model: "SD 1.5".to_string(),
            ..Default::default()
        };
        assert_eq!(
            rec.summary(),
            "Cat Ears\n[LORA] concept\nver: v1.0 | base: SD 1.5"
        );
    }

    #[test]
    fn test_settings_defaults_fill_missing_keys() {
        let s: Settings = serde_json::from_str(r#"{"targetLang":"de"}"#).unwrap();
        assert_eq!(s.target_lang, "de");
        assert!(s.translate_enabled);
        assert_eq!(s.ignore_words, vec!["LoRA", "Checkpoint"]);
        assert!((s.wallpaper_opacity - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fill_response_shape() {
        let ok = serde_json::to_value(FillResponse::ok()).unwrap();
        assert_eq!(ok, serde_json::json!({"ok": true}));
        let failed = serde_json::to_value(FillResponse::failed("boom")).unwrap();
        assert_eq!(failed["ok"], false);
        assert_eq!(failed["error"], "boom");
    }
}
