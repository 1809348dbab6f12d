//! `relay settings`: view or edit the stored settings.

use crate::cli::output::{self, Styled};
use crate::config::RelayConfig;
use crate::store::SettingsStore;
use anyhow::{bail, Result};
use model_relay::Settings;

/// Requested edits. `None` leaves a setting unchanged.
#[derive(Debug, Default, Clone)]
pub struct SettingsEdit {
    pub translate: Option<bool>,
    pub target_lang: Option<String>,
    /// Comma-separated ignore list.
    pub ignore_words: Option<String>,
    pub wallpaper_opacity: Option<f64>,
    pub clear_wallpaper: bool,
}

impl SettingsEdit {
    pub fn is_empty(&self) -> bool {
        self.translate.is_none()
            && self.target_lang.is_none()
            && self.ignore_words.is_none()
            && self.wallpaper_opacity.is_none()
            && !self.clear_wallpaper
    }

    /// Apply the edits, validating ranges.
    pub fn apply(&self, mut settings: Settings) -> Result<Settings> {
        if let Some(on) = self.translate {
            settings.translate_enabled = on;
        }
        if let Some(lang) = &self.target_lang {
            let lang = lang.trim();
            if lang.is_empty() {
                bail!("target language must not be empty");
            }
            settings.target_lang = lang.to_string();
        }
        if let Some(words) = &self.ignore_words {
            settings.ignore_words = words
                .split(',')
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(opacity) = self.wallpaper_opacity {
            if !(0.0..=1.0).contains(&opacity) {
                bail!("wallpaper opacity must be between 0 and 1, got {opacity}");
            }
            settings.wallpaper_opacity = opacity;
        }
        if self.clear_wallpaper {
            settings.wallpaper_data_url = None;
        }
        Ok(settings)
    }
}

pub async fn run(config: &RelayConfig, edit: &SettingsEdit) -> Result<()> {
    let s = Styled::new();
    let store = super::open_store(config)?;
    let mut settings = store.load_settings()?;

    if !edit.is_empty() {
        settings = edit.apply(settings)?;
        store.save_settings(&settings)?;
        tracing::debug!("settings saved to {}", config.store_path.display());
    }

    if output::is_json() {
        output::print_json(&serde_json::to_value(&settings)?);
        return Ok(());
    }

    if !edit.is_empty() && !output::is_quiet() {
        eprintln!("  {} Settings saved", s.ok_sym());
    }
    println!("translate      {}", if settings.translate_enabled { "on" } else { "off" });
    println!("target lang    {}", settings.target_lang);
    println!("ignore words   {}", settings.ignore_words.join(", "));
    println!(
        "wallpaper      {} (opacity {:.2})",
        if settings.wallpaper_data_url.is_some() { "set" } else { "none" },
        settings.wallpaper_opacity
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_edits() {
        let edit = SettingsEdit {
            translate: Some(false),
            target_lang: Some(" ja ".into()),
            ignore_words: Some("LoRA, , LyCORIS".into()),
            wallpaper_opacity: Some(0.5),
            clear_wallpaper: true,
        };
        let start = Settings {
            wallpaper_data_url: Some("data:image/png;base64,AAAA".into()),
            ..Settings::default()
        };
        let out = edit.apply(start).unwrap();
        assert!(!out.translate_enabled);
        assert_eq!(out.target_lang, "ja");
        assert_eq!(out.ignore_words, vec!["LoRA".to_string(), "LyCORIS".to_string()]);
        assert_eq!(out.wallpaper_opacity, 0.5);
        assert_eq!(out.wallpaper_data_url, None);
    }

    #[test]
    fn test_rejects_out_of_range_opacity() {
        let edit = SettingsEdit {
            wallpaper_opacity: Some(1.5),
            ..SettingsEdit::default()
        };
        assert!(edit.apply(Settings::default()).is_err());
        assert!(SettingsEdit::default().is_empty());
    }
}
