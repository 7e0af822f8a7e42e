//! Text metrics and content validation helpers
//!
//! Shared by the safety gate, quality gate and stage runners. Everything here is
//! pure and deterministic.

use crate::config::{LinkTopic, Range};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("static regex"));
static HTML_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<h([1-6])[^>]*>(.*?)</h[1-6]\s*>").expect("static regex"));
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("static regex"));

/// Count words as runs of word characters
pub fn count_words(text: &str) -> usize {
    WORD_RE.find_iter(text).count()
}

/// Split into chunks of at most `chunk_size` whitespace-separated words
pub fn chunk_words(text: &str, chunk_size: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(chunk_size.max(1))
        .map(|chunk| chunk.join(" "))
        .filter(|chunk| !chunk.trim().is_empty())
        .collect()
}

/// Group paragraphs into chunks of at most `max_words`.
///
/// A single paragraph longer than `max_words` becomes its own chunk.
pub fn chunk_paragraphs(text: &str, max_words: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_words = 0;

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let words = paragraph.split_whitespace().count();
        if current_words + words > max_words && !current.is_empty() {
            chunks.push(current.join("\n\n"));
            current.clear();
            current_words = 0;
        }
        current.push(paragraph);
        current_words += words;
    }

    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
    }
    chunks
}

/// Remove Markdown emphasis and heading markers for metric computation
pub fn strip_markdown(content: &str) -> String {
    content.replace(['#', '*', '_'], "")
}

/// Remove a surrounding ``` fence (with optional language tag) from generated text
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let without_open = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => "",
    };
    without_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
        .to_string()
}

/// First non-empty, non-heading paragraph
pub fn first_paragraph(content: &str) -> &str {
    content
        .split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty() && !p.starts_with('#'))
        .unwrap_or("")
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// URL-friendly slug
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

// ============================================================================
// Readability
// ============================================================================

/// Flesch reading ease.
///
/// `206.835 - 1.015 * (words / sentences) - 84.6 * (syllables / words)`.
/// Texts under 100 characters score 0.
pub fn flesch_reading_ease(text: &str) -> f64 {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.len() < 100 {
        return 0.0;
    }

    let words: Vec<&str> = WORD_RE.find_iter(&normalized).map(|m| m.as_str()).collect();
    if words.is_empty() {
        return 0.0;
    }

    let sentences = normalized
        .split(['.', '!', '?'])
        .filter(|s| WORD_RE.is_match(s))
        .count()
        .max(1);
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

    let words_per_sentence = words.len() as f64 / sentences as f64;
    let syllables_per_word = syllables as f64 / words.len() as f64;

    206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word
}

/// Vowel-group syllable estimate with silent trailing `e`
fn count_syllables(word: &str) -> usize {
    let lower = word.to_lowercase();
    if lower.chars().all(|c| c.is_ascii_digit()) {
        return 1;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut previous_vowel = false;
    for ch in lower.chars() {
        let vowel = is_vowel(ch);
        if vowel && !previous_vowel {
            count += 1;
        }
        previous_vowel = vowel;
    }

    if lower.ends_with('e') && !lower.ends_with("le") && count > 1 {
        count -= 1;
    }
    count.max(1)
}

// ============================================================================
// Keywords and links
// ============================================================================

/// Keyword occurrences divided by total words (0.015 = 1.5%)
///
/// Occurrences are case-insensitive substring matches, not whole words:
/// "dmarc" also counts inside "dmarcian".
pub fn keyword_density(text: &str, keyword: &str) -> f64 {
    let total_words = count_words(text);
    let keyword = keyword.trim().to_lowercase();
    if total_words == 0 || keyword.is_empty() {
        return 0.0;
    }
    let occurrences = text.to_lowercase().matches(keyword.as_str()).count();
    occurrences as f64 / total_words as f64
}

/// Case-insensitive containment
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Internal pages whose topic keyword appears in the text, in configured order
pub fn find_internal_link_opportunities(text: &str, topics: &[LinkTopic]) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut pages: Vec<String> = Vec::new();
    for topic in topics {
        if lower.contains(&topic.keyword.to_lowercase()) && !pages.contains(&topic.page) {
            pages.push(topic.page.clone());
        }
    }
    pages
}

/// Check meta description length, returning validity and a message
pub fn validate_meta_description(description: &str, length: &Range<usize>) -> (bool, String) {
    let chars = description.chars().count();
    if chars < length.min {
        (false, format!("Meta description too short ({} chars, minimum {})", chars, length.min))
    } else if chars > length.max {
        (false, format!("Meta description too long ({} chars, maximum {})", chars, length.max))
    } else {
        (true, format!("Meta description length optimal ({} chars)", chars))
    }
}

// ============================================================================
// Headings
// ============================================================================

/// Heading texts grouped by level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headings {
    levels: [Vec<String>; 6],
    /// Level of every heading in document order
    order: Vec<u8>,
}

impl Headings {
    /// Headings at `level` (1-6)
    pub fn at(&self, level: u8) -> &[String] {
        match level {
            1..=6 => &self.levels[usize::from(level) - 1],
            _ => &[],
        }
    }

    pub fn h1(&self) -> &[String] {
        self.at(1)
    }

    pub fn h2(&self) -> &[String] {
        self.at(2)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// First heading is H1 and no level is skipped going deeper
    pub fn has_valid_hierarchy(&self) -> bool {
        validate_heading_hierarchy(&self.order)
    }

    fn push(&mut self, level: u8, text: String) {
        self.levels[usize::from(level) - 1].push(text);
        self.order.push(level);
    }
}

/// Extract Markdown `#` headings, falling back to HTML `<hN>` tags
pub fn extract_headings(content: &str) -> Headings {
    let mut headings = Headings::default();

    for line in content.lines().map(str::trim) {
        let level = line.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&level) {
            let text = line[level..].trim();
            if !text.is_empty() {
                headings.push(level as u8, text.to_string());
            }
        }
    }

    if headings.is_empty() {
        return extract_html_headings(content);
    }
    headings
}

/// Extract `<h1>`..`<h6>` headings from HTML
pub fn extract_html_headings(html: &str) -> Headings {
    let mut headings = Headings::default();
    for caps in HTML_HEADING_RE.captures_iter(html) {
        let level: u8 = caps[1].parse().unwrap_or(6);
        let text = HTML_TAG_RE.replace_all(&caps[2], "").trim().to_string();
        headings.push(level, text);
    }
    headings
}

/// First heading must be level 1 and levels may only deepen one step at a time
pub fn validate_heading_hierarchy(levels: &[u8]) -> bool {
    let Some(first) = levels.first() else {
        return false;
    };
    if *first != 1 {
        return false;
    }
    levels.windows(2).all(|pair| pair[1] <= pair[0] + 1)
}

// ============================================================================
// URLs
// ============================================================================

/// Parse a source URL, requiring an http(s) scheme and a non-empty host
pub fn validate_source_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("'{}' is not a valid URL: {}", raw, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("'{}' must use http or https (got '{}')", raw, url.scheme()));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(format!("'{}' has no host", raw)),
    }
}

/// Lowercased host of a URL, empty when unparseable
pub fn host_of(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_default()
}
