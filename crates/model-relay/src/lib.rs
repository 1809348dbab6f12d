// Copyright 2026 ModelRelay Contributors
// SPDX-License-Identifier: MIT

//! ModelRelay core library: harvest model metadata from a gallery page and
//! replay it into a creation form.
//!
//! This crate is I/O free: the transfer record, the text heuristics shared by
//! the Extractor and the Injector, and the fuzzy option matcher.

pub mod matching;
pub mod text;
pub mod types;

pub use matching::{best_match, exact_match, score_candidate, tokenize, MatchTier};
pub use text::{
    canonical_category, clean_description, is_english, looks_like_tags, normalize_label,
    strip_ignore_words, strip_site_suffix,
};
pub use types::*;
