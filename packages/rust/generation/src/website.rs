//! Fetch a reference web page and reduce it to Markdown for prompt context.

use contentcrew_shared::{ContentCrewError, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use crate::upstream_error;

/// Default cap on page Markdown handed to a prompt, in characters.
pub const DEFAULT_MAX_CHARS: usize = 12_000;

const TRUNCATION_MARKER: &str = "\n\n[... content truncated for context window ...]";

/// A fetched page reduced to Markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebPage {
    pub url: String,
    pub title: Option<String>,
    pub markdown: String,
}

impl WebPage {
    /// Markdown block suitable for inlining into a prompt.
    pub fn to_context(&self) -> String {
        match &self.title {
            Some(title) => format!("### {title}\nSource: {}\n\n{}", self.url, self.markdown),
            None => format!("Source: {}\n\n{}", self.url, self.markdown),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebsiteReader {
    client: Client,
    max_chars: usize,
}

impl WebsiteReader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    #[instrument(skip(self))]
    pub async fn read(&self, url: &str) -> Result<WebPage> {
        let parsed = Url::parse(url)
            .map_err(|e| ContentCrewError::validation(format!("invalid URL '{url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ContentCrewError::validation(format!(
                "unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| ContentCrewError::Network(format!("fetching {url} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        let html = response
            .text()
            .await
            .map_err(|e| ContentCrewError::Network(format!("reading {url} failed: {e}")))?;

        let (title, content_html) = extract(&html);
        let markdown = to_markdown(&content_html)?;
        debug!(chars = markdown.chars().count(), "page converted");

        Ok(WebPage {
            url: parsed.to_string(),
            title,
            markdown: truncate_content(&markdown, self.max_chars),
        })
    }
}

/// Page title plus the HTML of the main content container.
fn extract(html: &str) -> (Option<String>, String) {
    let doc = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| doc.select(&sel).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    for sel_str in ["main", "[role=\"main\"]", "article", "body"] {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                return (title, el.inner_html());
            }
        }
    }

    (title, html.to_string())
}

fn to_markdown(html: &str) -> Result<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec![
            "script", "style", "nav", "iframe", "noscript", "svg", "header", "footer", "form",
        ])
        .build();

    let raw = converter
        .convert(html)
        .map_err(|e| ContentCrewError::parse(format!("HTML conversion failed: {e}")))?;

    // Collapse runs of blank lines left behind by skipped tags.
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    Ok(out.trim().to_string())
}

/// Cap `content` at `max_chars` characters, marking the cut.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        None => content.to_string(),
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &content[..cut]),
    }
}
