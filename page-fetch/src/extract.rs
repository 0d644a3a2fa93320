use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static OG_TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static HEAD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<head[^>]*>.*?</head>").unwrap());
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Extract the document title, preferring `<title>` and falling back to `og:title`.
///
/// Entities are decoded by the HTML parser, so escaped text is unescaped once.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let from_tag = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|title| !title.is_empty());

    from_tag.or_else(|| {
        document
            .select(&OG_TITLE_SELECTOR)
            .filter_map(|el| el.value().attr("content"))
            .map(collapse_whitespace)
            .find(|title| !title.is_empty())
    })
}

/// Reduce an HTML page to readable Markdown-ish text, capped at `max_chars`.
///
/// The `<head>` is dropped and scripts/styles are removed by the sanitizer
/// before conversion.
pub fn extract_text(html: &str, max_chars: usize) -> String {
    let body = HEAD_PATTERN.replace_all(html, "");
    let sanitized = ammonia::clean(&body);
    let markdown = htmd::convert(&sanitized).unwrap_or_else(|_| strip_html(&sanitized));

    let normalized = markdown.replace("\r\n", "\n");
    let compact = BLANK_LINES.replace_all(normalized.trim(), "\n\n");
    truncate_chars(&compact, max_chars)
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

fn strip_html(html: &str) -> String {
    ammonia::Builder::empty().clean(html).to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
