use std::sync::LazyLock;

use scraper::{Html, Node, Selector};

use crate::fetcher::FetchedPage;

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("static selector"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("static selector"));
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// Elements whose text never counts as visible page content.
const SKIPPED: [&str; 4] = ["script", "style", "img", "input"];

/// Parse an HTML document into a [`FetchedPage`].
pub fn extract_page(url: &str, html: &str) -> FetchedPage {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let text = doc
        .select(&BODY)
        .next()
        .map(|body| visible_text(&body))
        .unwrap_or_default();

    let links: Vec<String> = doc
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !href.is_empty())
        .map(str::to_string)
        .collect();

    tracing::debug!(url, links = links.len(), text_chars = text.len(), "extract.page");

    FetchedPage {
        url: url.to_string(),
        title,
        text,
        links,
    }
}

/// Trimmed, non-empty text nodes under `body`, one per line.
fn visible_text(body: &scraper::ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in body.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    parts.join("\n")
}
