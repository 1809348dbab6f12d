//! Field harvesting from one parsed snapshot: category, version, the
//! attribute table, trigger-word groups, and the raw description.

use super::locate::{element_text, first_match, first_nonempty_selection, Strategy};
use model_relay::{canonical_category, DEFAULT_VERSION_NAME, UNKNOWN_BASE_MODEL, UNKNOWN_MODEL_TYPE};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Tag-style links that carry the category.
const CATEGORY_STRATEGIES: &[Strategy] = &[
    Strategy::new("tag-link", r#"a[href^="/tag/"]"#),
    Strategy::new("tag-link-absolute", r#"a[href*="/tag/"]"#),
];

/// Word clusters inside the trigger-words row, most specific first.
const TRIGGER_CLUSTER_STRATEGIES: &[Strategy] = &[
    Strategy::new("mantine-group", "div.whitespace-normal.mantine-Group-root"),
    Strategy::new("badge", ".mantine-Badge-root"),
    Strategy::new("code", "code"),
];

/// Rich-text rendering containers for the description.
const DESCRIPTION_CONTAINERS: &[Strategy] = &[
    Strategy::new("html-renderer", r#"[class*="RenderHtml_htmlRenderer"]"#),
    Strategy::new("typography-content", ".mantine-TypographyStylesProvider-root .markdown-content"),
];

/// Whole-text description containers, used when no rich-text blocks exist.
const DESCRIPTION_FALLBACKS: &[Strategy] = &[
    Strategy::new("testid-description", r#"[data-testid="model-description"]"#),
    Strategy::new("typography", ".mantine-TypographyStylesProvider-root"),
];

/// Block elements collected from a rendering container.
const DESCRIPTION_BLOCKS: &[&str] = &["p", "pre", "code"];

/// Attribute-table label for the model type.
const LABEL_TYPE: &str = "type";

/// Attribute-table label for the base model.
const LABEL_BASE_MODEL: &str = "base model";

fn trigger_row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)trigger\s*words").expect("trigger row regex is valid"))
}

/// Everything harvested from the source page except the title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harvest {
    pub category: String,
    pub version_name: String,
    pub model_type: String,
    pub base_model: String,
    pub trigger_groups: Vec<Vec<String>>,
    /// Description before cleanup, translation, and tag-list detection.
    pub raw_description: String,
}

/// Harvest all non-title fields from one snapshot.
pub fn harvest(html: &str) -> Harvest {
    let document = Html::parse_document(html);
    let (model_type, base_model) = table_fields(&document);
    Harvest {
        category: category(&document),
        version_name: version_name(&document),
        model_type,
        base_model,
        trigger_groups: trigger_groups(&document),
        raw_description: raw_description(&document),
    }
}

/// First tag link's text, with synonyms folded.
pub fn category(document: &Html) -> String {
    match first_match(document, CATEGORY_STRATEGIES) {
        Some((_, text)) => canonical_category(&text),
        None => {
            debug!("no category tag link");
            String::new()
        }
    }
}

/// Text of the group that holds the version's brush icon.
pub fn version_name(document: &Html) -> String {
    let Ok(icon_sel) = Selector::parse("svg.tabler-icon-brush") else {
        return DEFAULT_VERSION_NAME.to_string();
    };
    let found = document.select(&icon_sel).find_map(|icon| {
        icon.ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| {
                el.value().name() == "div"
                    && el.value().classes().any(|c| c.contains("mantine-Group-root"))
            })
            .map(|group| element_text(&group))
            .filter(|t| !t.is_empty())
    });
    found.unwrap_or_else(|| DEFAULT_VERSION_NAME.to_string())
}

/// Direct `td` children of a row.
fn row_cells<'a>(row: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "td" || el.value().name() == "th")
        .collect()
}

/// Label text of a table cell: its first paragraph if it has one.
fn label_text(cell: &ElementRef<'_>) -> String {
    let para = Selector::parse("p")
        .ok()
        .and_then(|sel| cell.select(&sel).next());
    match para {
        Some(p) => element_text(&p),
        None => element_text(cell),
    }
}

/// Scan attribute tables for the model type and base model. The first
/// non-empty value for each label wins; missing ones get their sentinels.
pub fn table_fields(document: &Html) -> (String, String) {
    let mut model_type: Option<String> = None;
    let mut base_model: Option<String> = None;

    if let Ok(row_sel) = Selector::parse("table tr") {
        for row in document.select(&row_sel) {
            let cells = row_cells(&row);
            let (Some(label_cell), Some(value_cell)) = (cells.first(), cells.get(1)) else {
                continue;
            };
            let label = label_text(label_cell).to_lowercase();
            let value = element_text(value_cell);
            if value.is_empty() {
                continue;
            }
            match label.as_str() {
                LABEL_TYPE if model_type.is_none() => model_type = Some(value),
                LABEL_BASE_MODEL if base_model.is_none() => base_model = Some(value),
                _ => {}
            }
        }
    }

    if model_type.is_none() {
        debug!("model type not found in attribute table");
    }
    if base_model.is_none() {
        debug!("base model not found in attribute table");
    }
    (
        model_type.unwrap_or_else(|| UNKNOWN_MODEL_TYPE.to_string()),
        base_model.unwrap_or_else(|| UNKNOWN_BASE_MODEL.to_string()),
    )
}

/// Leading text of a cluster: its first child node with non-blank text,
/// skipping buttons (the copy control). Falls back to the whole text.
fn cluster_text(cluster: &ElementRef<'_>) -> String {
    let first = cluster.children().find_map(|node| {
        let text = if let Some(text) = node.value().as_text() {
            text.trim().to_string()
        } else if let Some(el) = ElementRef::wrap(node) {
            if el.value().name() == "button" {
                return None;
            }
            element_text(&el)
        } else {
            String::new()
        };
        (!text.is_empty()).then_some(text)
    });
    first.unwrap_or_else(|| element_text(cluster))
}

/// Collect trigger-word groups from the row labelled "trigger words".
///
/// Each visual cluster becomes one group; a cluster holding a
/// comma-separated list becomes a multi-word group. A page without the row
/// yields no groups.
pub fn trigger_groups(document: &Html) -> Vec<Vec<String>> {
    let Ok(row_sel) = Selector::parse("tr") else {
        return Vec::new();
    };
    let Some(row) = document
        .select(&row_sel)
        .find(|tr| trigger_row_re().is_match(&tr.text().collect::<String>()))
    else {
        warn!("no trigger words row on this page");
        return Vec::new();
    };

    let Some((name, clusters)) = first_nonempty_selection(row, TRIGGER_CLUSTER_STRATEGIES) else {
        debug!("trigger words row has no word clusters");
        return Vec::new();
    };

    // Nested clusters would repeat their parent's words.
    let ids: HashSet<_> = clusters.iter().map(|c| c.id()).collect();
    let mut groups = Vec::new();
    for cluster in &clusters {
        if cluster.ancestors().any(|a| ids.contains(&a.id())) {
            continue;
        }
        let mut words: Vec<String> = Vec::new();
        for word in cluster_text(cluster).split(',') {
            let word = word.trim();
            if !word.is_empty() && !words.iter().any(|w| w == word) {
                words.push(word.to_string());
            }
        }
        if !words.is_empty() {
            groups.push(words);
        }
    }
    debug!("{} trigger group(s) via {name}", groups.len());
    groups
}

/// Whether `el` sits inside another description block below `container`.
fn inside_block(el: &ElementRef<'_>, container: &ElementRef<'_>) -> bool {
    for ancestor in el.ancestors() {
        if ancestor.id() == container.id() {
            return false;
        }
        if let Some(a) = ElementRef::wrap(ancestor) {
            if matches!(a.value().name(), "p" | "pre") {
                return true;
            }
        }
    }
    false
}

/// Raw description: rich-text blocks in document order joined by blank
/// lines, else the fallback container's whole text.
pub fn raw_description(document: &Html) -> String {
    let containers: Vec<ElementRef<'_>> = DESCRIPTION_CONTAINERS
        .iter()
        .filter_map(|s| s.parse())
        .map(|sel| document.select(&sel).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default();

    let mut blocks = Vec::new();
    for container in &containers {
        for node in container.descendants() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            if !DESCRIPTION_BLOCKS.contains(&el.value().name()) || inside_block(&el, container) {
                continue;
            }
            let text = element_text(&el);
            if !text.is_empty() {
                blocks.push(text);
            }
        }
    }
    if !blocks.is_empty() {
        return blocks.join("\n\n");
    }

    match first_match(document, DESCRIPTION_FALLBACKS) {
        Some((name, text)) => {
            debug!("description from fallback container {name}");
            text
        }
        None => String::new(),
    }
}
