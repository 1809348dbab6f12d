//! Title resolution: locator chain, then a bounded wait for the page to
//! render one, then document metadata.

use super::locate::{element_text, first_match, Strategy};
use super::source::DocumentSource;
use super::ExtractOptions;
use crate::wait::{await_condition, WaitOutcome};
use anyhow::Result;
use model_relay::{strip_site_suffix, RelayError};
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Heading locators, most site-specific first.
pub const TITLE_STRATEGIES: &[Strategy] = &[
    Strategy::new("mantine-title", "h1.mantine-Title-root"),
    Strategy::new("mantine-text", "h1.mantine-Text-root"),
    Strategy::new("testid-title", "h1[data-testid='model-title']"),
    Strategy::new("model-header", "div[data-testid='model-header'] h1"),
    Strategy::new("any-h1", "h1"),
];

/// Metadata title sources, tried after the heading chain gives up.
const META_TITLE_STRATEGIES: &[(&str, &str)] = &[
    ("og:title", r#"meta[property="og:title"]"#),
    ("twitter:title", r#"meta[name="twitter:title"]"#),
];

/// Which tier produced the title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
    /// A heading locator matched on the first snapshot.
    Located(&'static str),
    /// A heading locator matched while waiting for the page to render.
    Observed(&'static str),
    /// Social-preview metadata or the document title.
    Metadata,
    NotFound,
}

/// A resolved title and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTitle {
    pub title: String,
    pub source: TitleSource,
}

/// Run the heading chain over one snapshot.
pub fn locate_title(html: &str) -> Option<(&'static str, String)> {
    let document = Html::parse_document(html);
    first_match(&document, TITLE_STRATEGIES)
}

/// Social-preview title or `<title>`, with the trailing site name removed.
pub fn metadata_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for (name, selector) in META_TITLE_STRATEGIES {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        let content = document
            .select(&sel)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|c| !c.is_empty());
        if let Some(content) = content {
            debug!("title from {name} metadata");
            return Some(strip_site_suffix(content));
        }
    }

    let sel = Selector::parse("title").ok()?;
    document
        .select(&sel)
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
        .map(|t| strip_site_suffix(&t))
        .filter(|t| !t.is_empty())
}

/// Resolve the title. An empty title is a valid outcome: callers report
/// "title not found" rather than failing.
pub async fn resolve_title(
    doc: &dyn DocumentSource,
    options: &ExtractOptions,
    cancel: &CancellationToken,
) -> Result<ResolvedTitle> {
    let html = doc.snapshot().await?;
    if let Some((name, title)) = locate_title(&html) {
        debug!("title located by {name}");
        return Ok(ResolvedTitle {
            title,
            source: TitleSource::Located(name),
        });
    }

    info!(
        "no title heading yet, watching the page for {}ms",
        options.title_timeout.as_millis()
    );
    let outcome = await_condition(
        move || async move {
            let html = doc.snapshot().await?;
            Ok::<_, anyhow::Error>(locate_title(&html))
        },
        options.title_timeout,
        options.poll_interval,
        cancel,
    )
    .await?;

    match outcome {
        WaitOutcome::Ready((name, title)) => {
            debug!("title appeared, located by {name}");
            return Ok(ResolvedTitle {
                title,
                source: TitleSource::Observed(name),
            });
        }
        WaitOutcome::Cancelled => return Err(RelayError::Cancelled.into()),
        WaitOutcome::TimedOut => {
            warn!("no title heading rendered in time, falling back to metadata");
        }
    }

    let html = doc.snapshot().await?;
    match metadata_title(&html) {
        Some(title) => Ok(ResolvedTitle {
            title,
            source: TitleSource::Metadata,
        }),
        None => {
            warn!("title not found on this page");
            Ok(ResolvedTitle {
                title: String::new(),
                source: TitleSource::NotFound,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::source::StaticDocument;
    use std::time::Duration;

    fn quick() -> ExtractOptions {
        ExtractOptions {
            title_timeout: Duration::from_millis(80),
            poll_interval: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_most_specific_locator_wins() {
        let html = r#"<html><body>
            <h1>Generic</h1>
            <h1 class="mantine-Title-root"> Cat Ears </h1>
        </body></html>"#;
        assert_eq!(
            locate_title(html),
            Some(("mantine-title", "Cat Ears".to_string()))
        );
    }

    #[test]
    fn test_empty_heading_is_skipped() {
        let html = r#"<h1 class="mantine-Title-root">  </h1><h1>Fallback</h1>"#;
        assert_eq!(locate_title(html), Some(("any-h1", "Fallback".to_string())));
    }

    #[test]
    fn test_metadata_title_prefers_og() {
        let html = r#"<html><head>
            <title>Doc Title | Civitai</title>
            <meta property="og:title" content="Cat Ears - v2 | Civitai">
        </head><body></body></html>"#;
        assert_eq!(metadata_title(html), Some("Cat Ears - v2".to_string()));
    }

    #[test]
    fn test_metadata_title_falls_back_to_document_title() {
        let html = "<html><head><title>Cat Ears | Civitai</title></head><body></body></html>";
        assert_eq!(metadata_title(html), Some("Cat Ears".to_string()));
    }

    #[tokio::test]
    async fn test_title_from_first_snapshot() {
        let doc = StaticDocument::new("<h1 data-testid='model-title'>Cat Ears</h1>");
        let resolved = resolve_title(&doc, &quick(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolved.title, "Cat Ears");
        assert_eq!(resolved.source, TitleSource::Located("testid-title"));
    }

    #[tokio::test]
    async fn test_title_observed_after_render() {
        let doc = StaticDocument::sequence(vec![
            "<div>loading</div>".into(),
            "<div>loading</div>".into(),
            "<div data-testid='model-header'><h1>Late Title</h1></div>".into(),
        ]);
        let resolved = resolve_title(&doc, &quick(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolved.title, "Late Title");
        assert_eq!(resolved.source, TitleSource::Observed("model-header"));
    }

    #[tokio::test]
    async fn test_timeout_then_metadata() {
        let doc = StaticDocument::new(
            "<html><head><title>Meta Only | Civitai</title></head><body></body></html>",
        );
        let resolved = resolve_title(&doc, &quick(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolved.title, "Meta Only");
        assert_eq!(resolved.source, TitleSource::Metadata);
    }

    #[tokio::test]
    async fn test_timeout_without_metadata_is_empty_not_error() {
        let doc = StaticDocument::new("<html><body><p>nothing</p></body></html>");
        let resolved = resolve_title(&doc, &quick(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolved.title, "");
        assert_eq!(resolved.source, TitleSource::NotFound);
    }

    #[tokio::test]
    async fn test_cancelled_wait_is_an_error() {
        let doc = StaticDocument::new("<p>never</p>");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = resolve_title(&doc, &quick(), &cancel).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RelayError>(),
            Some(RelayError::Cancelled)
        ));
    }
}
