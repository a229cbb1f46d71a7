//! Best-effort article summaries: meta description first, else the first
//! substantial paragraph. Any fetch/parse failure yields `""` so the scorer
//! never has to handle errors on this path.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

const SUMMARY_CHAR_LIMIT: usize = 500;

static RE_META_DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<meta[^>]+(?:name="description"|property="og:description")[^>]*content="([^"]*)""#,
    )
    .expect("meta description regex")
});
static RE_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<p[^>]*>(.*?)</p>").expect("paragraph regex"));
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

#[async_trait]
pub trait ArticleSummarizer: Send + Sync {
    /// Summarize the page behind `url`; `""` on any failure.
    async fn summarize(&self, url: &str) -> String;
}

pub struct HttpSummarizer {
    http: reqwest::Client,
}

impl HttpSummarizer {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; ArticleSummaryBot/1.0)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(7))
            .build()
            .expect("reqwest client");
        Self { http }
    }
}

impl Default for HttpSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleSummarizer for HttpSummarizer {
    async fn summarize(&self, url: &str) -> String {
        if url.is_empty() {
            return String::new();
        }
        let resp = match self.http.get(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(url, status = %r.status(), "summary fetch non-success");
                return String::new();
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "summary fetch failed");
                return String::new();
            }
        };
        match resp.text().await {
            Ok(html) => extract_summary(&html),
            Err(e) => {
                tracing::warn!(url, error = %e, "summary body unreadable");
                String::new()
            }
        }
    }
}

/// No-op summarizer for tests and degraded runs.
pub struct NullSummarizer;

#[async_trait]
impl ArticleSummarizer for NullSummarizer {
    async fn summarize(&self, _url: &str) -> String {
        String::new()
    }
}

/// Meta description (plain or OpenGraph) wins; fallback is the first
/// tag-stripped paragraph longer than 50 chars. Capped at 500 chars.
pub fn extract_summary(html: &str) -> String {
    if let Some(caps) = RE_META_DESCRIPTION.captures(html) {
        let text = clean_fragment(&caps[1]);
        if !text.is_empty() {
            return truncate_chars(&text, SUMMARY_CHAR_LIMIT);
        }
    }
    for caps in RE_PARAGRAPH.captures_iter(html) {
        let text = clean_fragment(&caps[1]);
        if text.len() > 50 {
            return truncate_chars(&text, SUMMARY_CHAR_LIMIT);
        }
    }
    String::new()
}

fn clean_fragment(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let stripped = RE_TAGS.replace_all(&decoded, "");
    RE_WS.replace_all(&stripped, " ").trim().to_string()
}

fn truncate_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        s.to_string()
    } else {
        s.chars().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_description_wins() {
        let html = r#"<html><head>
            <meta name="description" content="Fed raises rates by 25bps.">
            </head><body><p>Some long paragraph about markets that is clearly over fifty characters.</p></body></html>"#;
        assert_eq!(extract_summary(html), "Fed raises rates by 25bps.");
    }

    #[test]
    fn og_description_is_accepted() {
        let html = r#"<meta property="og:description" content="ECB holds &amp; signals cuts.">"#;
        assert_eq!(extract_summary(html), "ECB holds & signals cuts.");
    }

    #[test]
    fn falls_back_to_first_substantial_paragraph() {
        let html = "<p>short</p><p>This paragraph is comfortably longer than fifty characters and wins.</p>";
        assert_eq!(
            extract_summary(html),
            "This paragraph is comfortably longer than fifty characters and wins."
        );
    }

    #[test]
    fn no_usable_content_yields_empty() {
        assert_eq!(extract_summary("<p>tiny</p>"), "");
        assert_eq!(extract_summary(""), "");
    }
}
