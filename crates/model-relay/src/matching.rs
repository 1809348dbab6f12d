//! Option matching for dynamically rendered choice menus.
//!
//! Exact matching compares [`normalize_label`] output. Fuzzy matching scores
//! candidates by tiers of token overlap and is used for the base model, whose
//! wording differs between the source gallery and the target form.

use crate::text::normalize_label;
use crate::types::{UNKNOWN_BASE_MODEL, UNKNOWN_MODEL_TYPE};

/// How well a candidate option matches the target text, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    None,
    /// Candidate contains at least half of the target tokens.
    MostTokens,
    /// Candidate contains every target token.
    AllTokens,
    /// Candidate's normalized text starts with the target's.
    Prefix,
    /// Normalized texts are equal.
    Exact,
}

/// Lower-case, strip non-alphanumerics, and split into tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Score one candidate against the target. Returns the tier and the fraction
/// of target tokens the candidate contains.
pub fn score_candidate(target: &str, candidate: &str) -> (MatchTier, f32) {
    let target_tokens = tokenize(target);
    let cand_tokens = tokenize(candidate);
    if target_tokens.is_empty() || cand_tokens.is_empty() {
        return (MatchTier::None, 0.0);
    }

    let found = target_tokens
        .iter()
        .filter(|t| cand_tokens.contains(t))
        .count();
    let coverage = found as f32 / target_tokens.len() as f32;

    let target_norm = target_tokens.join(" ");
    let cand_norm = cand_tokens.join(" ");

    let tier = if cand_norm == target_norm {
        MatchTier::Exact
    } else if cand_norm.starts_with(&target_norm) {
        MatchTier::Prefix
    } else if found == target_tokens.len() {
        MatchTier::AllTokens
    } else if coverage >= 0.5 {
        MatchTier::MostTokens
    } else {
        MatchTier::None
    };
    (tier, coverage)
}

/// Whether a target is a "not found" sentinel that must never be matched.
fn is_sentinel(target: &str) -> bool {
    let t = target.trim();
    t.is_empty() || t == UNKNOWN_BASE_MODEL || t == UNKNOWN_MODEL_TYPE
}

/// Index of the best fuzzy match, if any candidate reaches
/// [`MatchTier::MostTokens`].
///
/// Ties within a tier go to higher coverage, then to the shorter candidate,
/// then to the earlier one.
pub fn best_match<S: AsRef<str>>(target: &str, candidates: &[S]) -> Option<usize> {
    if is_sentinel(target) {
        return None;
    }

    let mut best: Option<(usize, MatchTier, f32, usize)> = None;
    for (idx, cand) in candidates.iter().enumerate() {
        let cand = cand.as_ref();
        let (tier, coverage) = score_candidate(target, cand);
        if tier < MatchTier::MostTokens {
            continue;
        }
        let len = cand.trim().len();
        let better = match best {
            None => true,
            Some((_, b_tier, b_cov, b_len)) => {
                tier > b_tier
                    || (tier == b_tier && coverage > b_cov)
                    || (tier == b_tier && coverage == b_cov && len < b_len)
            }
        };
        if better {
            best = Some((idx, tier, coverage, len));
        }
    }

    if let Some((idx, tier, _, _)) = best {
        tracing::debug!(wanted = target, candidate = candidates[idx].as_ref(), ?tier, "fuzzy match");
    }
    best.map(|(idx, _, _, _)| idx)
}

/// Index of the first candidate whose normalized text equals the target's.
pub fn exact_match<S: AsRef<str>>(target: &str, candidates: &[S]) -> Option<usize> {
    if is_sentinel(target) {
        return None;
    }
    let want = normalize_label(target);
    candidates
        .iter()
        .position(|c| normalize_label(c.as_ref()) == want)
}
