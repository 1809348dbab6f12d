//! Ranked locator strategies over a parsed snapshot.
//!
//! A strategy chain is a plain ordered slice: the first strategy that
//! yields a non-empty result wins.

use scraper::{ElementRef, Html, Selector};

/// One named CSS locator.
#[derive(Debug, Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub selector: &'static str,
}

impl Strategy {
    pub const fn new(name: &'static str, selector: &'static str) -> Self {
        Self { name, selector }
    }

    /// Parse the selector. Invalid selectors are logged and skipped.
    pub fn parse(&self) -> Option<Selector> {
        match Selector::parse(self.selector) {
            Ok(sel) => Some(sel),
            Err(e) => {
                tracing::warn!("locator '{}' has an invalid selector: {e:?}", self.name);
                None
            }
        }
    }
}

/// Concatenated, trimmed text of an element (like `textContent.trim()`).
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// First element across the chain whose text is non-empty.
pub fn first_match(document: &Html, chain: &[Strategy]) -> Option<(&'static str, String)> {
    for strategy in chain {
        let Some(sel) = strategy.parse() else {
            continue;
        };
        let found = document
            .select(&sel)
            .map(|el| element_text(&el))
            .find(|t| !t.is_empty());
        if let Some(text) = found {
            return Some((strategy.name, text));
        }
    }
    None
}

/// All elements matched by the first strategy in the chain that matches
/// anything, searched under `scope`.
pub fn first_nonempty_selection<'a>(
    scope: ElementRef<'a>,
    chain: &[Strategy],
) -> Option<(&'static str, Vec<ElementRef<'a>>)> {
    for strategy in chain {
        let Some(sel) = strategy.parse() else {
            continue;
        };
        let found: Vec<ElementRef<'a>> = scope.select(&sel).collect();
        if !found.is_empty() {
            return Some((strategy.name, found));
        }
    }
    None
}
