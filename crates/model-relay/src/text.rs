//! Text heuristics shared by the Extractor and the Injector.
//!
//! Everything here is pure string processing so both sides of the pipeline
//! agree on what a tag list, an English description, or a clean line is.

use regex::Regex;
use std::sync::OnceLock;

/// Separators that split a document title from its trailing site name.
const SITE_SEPARATORS: &[&str] = &[" | ", " – ", " — ", " - "];

/// Canonical label that "pose"-style categories are folded into.
pub const CANONICAL_POSE_CATEGORY: &str = "concept";

fn blacklist_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(sponsor|commission|support|ko-?fi|patreon|buymeacoffee|buy me a coffee|discord\.gg/|https?://\S*(patreon\.com|ko-fi\.com|discord\.(gg|com)|twitter\.com|x\.com)\S*)",
        )
        .expect("blacklist regex is valid")
    })
}

fn weight_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bweight\s*:").expect("weight regex is valid"))
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*(\n[ \t]*){2,}").expect("blank run regex is valid"))
}

/// Whether a text reads like a comma-separated tag list rather than prose.
///
/// True when there are more than 5 commas and fewer than 3 words per comma.
pub fn looks_like_tags(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let commas = text.matches(',').count();
    if commas <= 5 {
        return false;
    }
    let words = text.split_whitespace().count();
    (words as f64) / (commas as f64) < 3.0
}

/// Whether a text stays inside the ASCII-plus-whitespace set.
pub fn is_english(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii() || c.is_whitespace())
}

/// Line-level cleanup of a harvested description.
///
/// Drops promotional and cross-site lines, keeps every `weight:` line,
/// collapses runs of blank lines, and trims.
pub fn clean_description(raw: &str) -> String {
    let kept: Vec<&str> = raw
        .lines()
        .filter(|line| weight_re().is_match(line) || !blacklist_re().is_match(line))
        .collect();
    let joined = kept.join("\n");
    blank_run_re()
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

/// Fold known category synonyms into their canonical label.
pub fn canonical_category(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.to_lowercase().as_str() {
        "pose" | "poses" => CANONICAL_POSE_CATEGORY.to_string(),
        _ => trimmed.to_string(),
    }
}

/// Remove a trailing " | Site" style suffix from a document title.
pub fn strip_site_suffix(title: &str) -> String {
    let title = title.trim();
    let rightmost = SITE_SEPARATORS
        .iter()
        .filter_map(|sep| title.rfind(sep))
        .filter(|&idx| !title[..idx].trim().is_empty())
        .max();
    match rightmost {
        Some(idx) => title[..idx].trim().to_string(),
        None => title.to_string(),
    }
}

/// Remove every whole-word occurrence of the ignore list, case-insensitively.
pub fn strip_ignore_words(text: &str, ignore_words: &[String]) -> String {
    let words: Vec<String> = ignore_words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if text.is_empty() || words.is_empty() {
        return text.to_string();
    }

    let pattern = format!(r"(?i)\b({})\b", words.join("|"));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!("ignore-word pattern rejected: {e}");
            return text.to_string();
        }
    };
    let stripped = re.replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize option text for exact comparison: NBSP to space, collapse
/// whitespace, trim, lower-case.
pub fn normalize_label(text: &str) -> String {
    text.replace('\u{00A0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_tags() {
        assert!(looks_like_tags("a, b, c, d, e, f, g"));
        assert!(!looks_like_tags("A short sentence."));
        assert!(!looks_like_tags(""));
        // Many commas but long clauses between them.
        assert!(!looks_like_tags(
            "this is a long clause, and another long clause here, then one more long clause, \
             yet again a clause with words, still going on and on, finally the last one ends, done now ok"
        ));
    }

    #[test]
    fn test_is_english() {
        assert!(is_english("Hello, world! (v1.0) - ok: yes;"));
        assert!(!is_english("可爱的猫"));
        assert!(!is_english("café"));
    }

    #[test]
    fn test_clean_description_drops_promotions() {
        let raw = "Great model.\nSupport me on patreon\nUse at 0.7.";
        assert_eq!(clean_description(raw), "Great model.\nUse at 0.7.");
    }

    #[test]
    fn test_clean_description_keeps_weight_lines() {
        let raw = "weight: 0.8\nweight: 0.6 (support the author!)\nko-fi.com/someone";
        assert_eq!(
            clean_description(raw),
            "weight: 0.8\nweight: 0.6 (support the author!)"
        );
    }

    #[test]
    fn test_clean_description_drops_cross_site_links() {
        let raw = "Intro\nhttps://discord.gg/abcdef\nJoin https://twitter.com/someone\nOutro";
        assert_eq!(clean_description(raw), "Intro\nOutro");
    }

    #[test]
    fn test_clean_description_collapses_blank_runs() {
        let raw = "\n\nFirst\n\n\n\n\nSecond\n\nThird\n\n";
        assert_eq!(clean_description(raw), "First\n\nSecond\n\nThird");
    }

    #[test]
    fn test_canonical_category() {
        assert_eq!(canonical_category("Poses"), "concept");
        assert_eq!(canonical_category(" pose "), "concept");
        assert_eq!(canonical_category("character"), "character");
    }

    #[test]
    fn test_strip_site_suffix() {
        assert_eq!(strip_site_suffix("Cat Ears | Civitai"), "Cat Ears");
        assert_eq!(
            strip_site_suffix("Cat Ears - v2 | Stable Diffusion LoRA | Civitai"),
            "Cat Ears - v2 | Stable Diffusion LoRA"
        );
        assert_eq!(strip_site_suffix("Cat Ears - Civitai"), "Cat Ears");
        assert_eq!(strip_site_suffix("Cat Ears | LoRA - Civitai"), "Cat Ears | LoRA");
        assert_eq!(strip_site_suffix("Plain"), "Plain");
        assert_eq!(strip_site_suffix(" | Civitai"), "| Civitai");
    }

    #[test]
    fn test_strip_ignore_words() {
        let ignore = vec!["LoRA".to_string(), "Checkpoint".to_string()];
        assert_eq!(strip_ignore_words("Cat Ears LoRA", &ignore), "Cat Ears");
        assert_eq!(strip_ignore_words("lora  Cat   checkpoint", &ignore), "Cat");
        assert_eq!(strip_ignore_words("Explorable", &ignore), "Explorable");
        assert_eq!(strip_ignore_words("Cat", &[]), "Cat");
    }

    #[test]
    fn test_strip_ignore_words_escapes_metacharacters() {
        let ignore = vec!["v1.0".to_string()];
        assert_eq!(strip_ignore_words("Cat v1.0", &ignore), "Cat");
        assert_eq!(strip_ignore_words("Cat v100", &ignore), "Cat v100");
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Base\u{00A0}Model \n"), "base model");
        assert_eq!(normalize_label("LORA"), "lora");
    }
}
