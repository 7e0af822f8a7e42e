//! Source article extraction over HTTP
//!
//! Tries the Jina reader first (`{jina_base_url}/{url}` returns Markdown), then
//! falls back to fetching the page directly and stripping it to text. A reader
//! result below the minimum word count also triggers the fallback.

use crate::config::ExtractionSettings;
use crate::text::count_words;
use crate::types::{CollaboratorError, CollaboratorResult, ContentExtractor, ExtractedContent};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Browser-like agent; several publishers reject library user agents
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Optional reader API key
const JINA_API_KEY_ENV: &str = "JINA_API_KEY";

static DROP_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|title|nav|header|footer|aside|form|svg)\b[^>]*>.*?</(script|style|noscript|title|nav|header|footer|aside|form|svg)>")
        .expect("block regex is valid")
});
static COMMENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex is valid"));
static BLOCK_BREAKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(p|div|section|article|h[1-6]|li|ul|ol|br|tr|table|blockquote|pre)\b[^>]*>")
        .expect("break regex is valid")
});
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex is valid"));
static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex is valid"));
static META_DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\s+[^>]*name=["']description["'][^>]*content=["']([^"']*)["']"#)
        .expect("meta regex is valid")
});
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\f\v]+").expect("space regex is valid"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n+").expect("blank line regex is valid"));

/// Reader-first extractor with a direct-fetch fallback
pub struct HttpExtractor {
    http_client: reqwest::Client,
    settings: ExtractionSettings,
    jina_api_key: Option<String>,
}

impl HttpExtractor {
    pub fn new(settings: ExtractionSettings) -> CollaboratorResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Unavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            settings,
            jina_api_key: std::env::var(JINA_API_KEY_ENV).ok().filter(|key| !key.is_empty()),
        })
    }

    async fn extract_with_reader(&self, url: &str) -> CollaboratorResult<ExtractedContent> {
        let reader_url = format!("{}/{}", self.settings.jina_base_url.trim_end_matches('/'), url);
        let mut request = self.http_client.get(&reader_url);
        if let Some(key) = &self.jina_api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let content = response.text().await?;
        let title = content
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix("# "))
            .unwrap_or_default()
            .to_string();

        Ok(ExtractedContent {
            word_count: count_words(&content),
            content,
            extraction_method: "jina".to_string(),
            source_url: url.to_string(),
            metadata: json!({ "title": title }),
        })
    }

    async fn extract_direct(&self, url: &str) -> CollaboratorResult<ExtractedContent> {
        let response = self.http_client.get(url).send().await?.error_for_status()?;
        let html = response.text().await?;
        let content = html_to_text(&html);
        if content.is_empty() {
            return Err(CollaboratorError::InvalidResponse(format!("no text content at {}", url)));
        }

        let title = capture(&TITLE, &html);
        let description = capture(&META_DESCRIPTION, &html);

        Ok(ExtractedContent {
            word_count: count_words(&content),
            content,
            extraction_method: "direct".to_string(),
            source_url: url.to_string(),
            metadata: json!({ "title": title, "description": description }),
        })
    }
}

#[async_trait::async_trait]
impl ContentExtractor for HttpExtractor {
    async fn extract(&self, url: &str) -> CollaboratorResult<ExtractedContent> {
        match self.extract_with_reader(url).await {
            Ok(extracted) if extracted.word_count >= self.settings.min_words => {
                info!(url, words = extracted.word_count, "Extracted with reader");
                return Ok(extracted);
            }
            Ok(extracted) => {
                warn!(url, words = extracted.word_count, "Reader result too short, fetching directly");
            }
            Err(e) => {
                warn!(url, error = %e, "Reader extraction failed, fetching directly");
            }
        }

        let extracted = self.extract_direct(url).await?;
        debug!(url, words = extracted.word_count, "Extracted directly");
        Ok(extracted)
    }
}

/// Reduce an HTML page to paragraphs of plain text
pub fn html_to_text(html: &str) -> String {
    let text = COMMENTS.replace_all(html, "");
    let text = DROP_BLOCKS.replace_all(&text, "");
    let text = BLOCK_BREAKS.replace_all(&text, "\n\n");
    let text = TAGS.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = SPACES.replace_all(&text, " ");

    let paragraphs: Vec<&str> = BLANK_LINES
        .split(&text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    paragraphs.join("\n\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn capture(re: &Regex, html: &str) -> String {
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .unwrap_or_default()
}
