//! Description and title post-processing.

use crate::translate::{translate_or_original, Translator};
use anyhow::Result;
use model_relay::{clean_description, looks_like_tags, strip_ignore_words, Settings};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Clean a raw description, replace a tag list with the title, then
/// translate non-English prose.
pub async fn finish_description(
    raw: &str,
    title: &str,
    translator: &dyn Translator,
    settings: &Settings,
    cancel: &CancellationToken,
) -> Result<String> {
    let cleaned = clean_description(raw);
    if looks_like_tags(&cleaned) {
        debug!("description reads like a tag list, using the title instead");
        return Ok(title.to_string());
    }
    translate_or_original(&cleaned, translator, settings, cancel).await
}

/// Strip the configured ignore words from a title, then translate it.
///
/// A title made only of ignore words is kept as it was.
pub async fn finish_title(
    title: &str,
    translator: &dyn Translator,
    settings: &Settings,
    cancel: &CancellationToken,
) -> Result<String> {
    let stripped = strip_ignore_words(title, &settings.ignore_words);
    let base = if stripped.is_empty() {
        title.trim().to_string()
    } else {
        stripped
    };
    translate_or_original(&base, translator, settings, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Upper;

    #[async_trait]
    impl Translator for Upper {
        async fn translate(&self, text: &str, _target_lang: &str) -> Result<String> {
            Ok(format!("EN:{text}"))
        }
    }

    fn live() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn test_tag_list_becomes_title() {
        let raw = "1girl, solo, red hair, blue eyes, smile, outdoors, sky";
        let out = finish_description(raw, "Cat Ears", &Upper, &Settings::default(), &live())
            .await
            .unwrap();
        assert_eq!(out, "Cat Ears");
    }

    #[tokio::test]
    async fn test_english_prose_is_cleaned_not_translated() {
        let raw = "A LoRA for cat ears.\nSupport me on patreon\nweight: 0.8";
        let out = finish_description(raw, "t", &Upper, &Settings::default(), &live())
            .await
            .unwrap();
        assert_eq!(out, "A LoRA for cat ears.\nweight: 0.8");
    }

    #[tokio::test]
    async fn test_non_english_prose_is_translated() {
        let out = finish_description("猫耳のLoRAです", "t", &Upper, &Settings::default(), &live())
            .await
            .unwrap();
        assert_eq!(out, "EN:猫耳のLoRAです");
    }

    #[tokio::test]
    async fn test_title_ignore_words_stripped() {
        let out = finish_title("Cat Ears LoRA", &Upper, &Settings::default(), &live())
            .await
            .unwrap();
        assert_eq!(out, "Cat Ears");
    }

    #[tokio::test]
    async fn test_title_of_only_ignore_words_is_kept() {
        let out = finish_title("LoRA", &Upper, &Settings::default(), &live())
            .await
            .unwrap();
        assert_eq!(out, "LoRA");
    }
}
