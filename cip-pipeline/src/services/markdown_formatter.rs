//! Markdown to publishable HTML
//!
//! Renders the draft with pulldown-cmark and wraps it in a standalone page
//! carrying SEO meta tags, OpenGraph tags and a schema.org `Article` JSON-LD
//! block built from the draft metadata and brand settings.

use crate::config::BrandSettings;
use crate::models::DraftMetadata;
use crate::types::{ArticleFormatter, CollaboratorError, CollaboratorResult, FormattedArticle};
use chrono::Utc;
use pulldown_cmark::{html, Options, Parser};
use serde_json::{json, Value};

pub struct MarkdownFormatter {
    brand: BrandSettings,
}

impl MarkdownFormatter {
    pub fn new(brand: BrandSettings) -> Self {
        Self { brand }
    }

    fn schema(&self, metadata: &DraftMetadata, published_at: &str) -> Value {
        json!({
            "@context": "https://schema.org",
            "@type": "Article",
            "headline": metadata.title,
            "description": metadata.meta_description,
            "wordCount": metadata.word_count,
            "keywords": keyword_list(metadata),
            "datePublished": published_at,
            "author": { "@type": "Organization", "name": self.brand.name },
            "publisher": {
                "@type": "Organization",
                "name": self.brand.name,
                "logo": { "@type": "ImageObject", "url": self.brand.logo_url },
            },
        })
    }
}

#[async_trait::async_trait]
impl ArticleFormatter for MarkdownFormatter {
    async fn format(&self, markdown: &str, metadata: &DraftMetadata) -> CollaboratorResult<FormattedArticle> {
        let body = render_markdown(markdown);
        let published_at = Utc::now().to_rfc3339();
        let schema = self.schema(metadata, &published_at);
        let schema_json = serde_json::to_string_pretty(&schema)
            .map_err(|e| CollaboratorError::Other(format!("Failed to serialize schema: {}", e)))?
            .replace("</", "<\\/");

        let canonical_path = format!("{}/{}", self.brand.blog_path.trim_end_matches('/'), metadata.slug);
        let title = escape_html(&metadata.title);
        let description = escape_html(&metadata.meta_description);
        let keywords = escape_html(&keyword_list(metadata).join(", "));

        let html = format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<meta name="description" content="{description}">
<meta name="keywords" content="{keywords}">
<meta property="og:type" content="article">
<meta property="og:title" content="{title}">
<meta property="og:description" content="{description}">
<meta property="og:site_name" content="{site}">
<meta property="og:url" content="{canonical}">
<meta property="article:published_time" content="{published_at}">
<script type="application/ld+json">
{schema_json}
</script>
</head>
<body>
<article>
{body}</article>
</body>
</html>
"#,
            site = escape_html(&self.brand.name),
            canonical = escape_html(&canonical_path),
        );

        Ok(FormattedArticle {
            html,
            metadata: json!({
                "title": metadata.title,
                "slug": metadata.slug,
                "meta_description": metadata.meta_description,
                "word_count": metadata.word_count,
                "primary_keyword": metadata.primary_keyword,
                "secondary_keywords": metadata.secondary_keywords,
                "canonical_path": canonical_path,
                "published_at": published_at,
                "schema": schema,
            }),
        })
    }
}

/// CommonMark plus tables, footnotes and strikethrough
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

fn keyword_list(metadata: &DraftMetadata) -> Vec<String> {
    std::iter::once(metadata.primary_keyword.clone())
        .chain(metadata.secondary_keywords.iter().cloned())
        .filter(|k| !k.is_empty())
        .collect()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
