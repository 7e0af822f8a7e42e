//! Stage 8: production formatting

use super::{completed, StageContext};
use crate::models::{DraftOutput, FormatOutput, HtmlValidation, InternalLink, QaOutput};
use crate::text::{extract_html_headings, slugify, truncate_chars};
use crate::types::{StageFailure, StageOutcome};
use serde_json::{json, Value};
use tracing::{info, warn};

const MAX_SUGGESTED_LINKS: usize = 3;
const UTM_PARAMS: &str = "?utm_source=blog&utm_medium=internal_link";
const PREVIEW_CHARS: usize = 500;

pub async fn run(ctx: &StageContext<'_>, draft: &DraftOutput, qa: &QaOutput) -> StageOutcome<FormatOutput> {
    completed(format_article(ctx, draft, qa).await)
}

async fn format_article(
    ctx: &StageContext<'_>,
    draft: &DraftOutput,
    qa: &QaOutput,
) -> Result<FormatOutput, StageFailure> {
    let article = ctx
        .collaborators
        .formatter
        .format(&draft.content, &draft.metadata)
        .await?;

    let validation = validate_html(&article.html);
    if !validation.is_valid {
        warn!(pipeline_id = %ctx.pipeline_id, issues = ?validation.issues, "HTML validation issues");
    }

    let suggested_links = suggest_links(&qa.seo_analysis.internal_links, &ctx.settings.brand.blog_path);

    let mut metadata = match article.metadata {
        Value::Object(map) => Value::Object(map),
        Value::Null => json!({}),
        other => json!({ "formatter": other }),
    };
    metadata["internal_links"] = json!(qa.seo_analysis.internal_links);
    metadata["suggested_links"] = serde_json::to_value(&suggested_links)
        .map_err(|e| StageFailure::new(format!("Failed to serialize link suggestions: {}", e)))?;
    metadata["quality_score"] = json!(qa.quality_report.scores.seo_score);

    let (html_file, metadata_file) = ctx
        .artifacts
        .write_output(ctx.pipeline_id, &article.html, &metadata)
        .await?;

    info!(
        pipeline_id = %ctx.pipeline_id,
        html_file = %html_file,
        links = suggested_links.len(),
        "Article formatted"
    );

    Ok(FormatOutput {
        html_file,
        metadata_file,
        html_preview: truncate_chars(&article.html, PREVIEW_CHARS),
        suggested_links,
        validation,
    })
}

/// Up to three internal link suggestions for the pages a draft mentions
pub fn suggest_links(pages: &[String], blog_path: &str) -> Vec<InternalLink> {
    let base = blog_path.trim_end_matches('/');
    pages
        .iter()
        .take(MAX_SUGGESTED_LINKS)
        .map(|page| InternalLink {
            text: page.clone(),
            url: format!("{}/{}", base, slugify(page)),
            utm_params: UTM_PARAMS.to_string(),
        })
        .collect()
}

/// Heading structure checks on rendered HTML
pub fn validate_html(html: &str) -> HtmlValidation {
    let mut issues = Vec::new();

    if html.trim().is_empty() {
        issues.push("Empty or invalid HTML".to_string());
        return HtmlValidation { is_valid: false, issues };
    }

    let headings = extract_html_headings(html);
    if headings.is_empty() {
        issues.push("No headings found".to_string());
    }

    match headings.h1().len() {
        0 => issues.push("Missing H1 tag".to_string()),
        1 => {}
        n => issues.push(format!("Multiple H1 tags found ({})", n)),
    }

    if !headings.is_empty() && !headings.has_valid_hierarchy() {
        issues.push("Broken heading hierarchy (headings skip levels)".to_string());
    }

    HtmlValidation {
        is_valid: issues.is_empty(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_suggestions_capped_and_slugged() {
        let pages: Vec<String> = ["DMARC Guide", "SPF Configuration", "DKIM Setup", "Email Deliverability"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let links = suggest_links(&pages, "/blog/");

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].url, "/blog/dmarc-guide");
        assert_eq!(links[1].url, "/blog/spf-configuration");
        assert_eq!(links[0].utm_params, "?utm_source=blog&utm_medium=internal_link");
    }

    #[test]
    fn test_valid_html_structure() {
        let html = "<h1>Title</h1><p>x</p><h2>A</h2><h3>B</h3><h2>C</h2>";
        let validation = validate_html(html);
        assert!(validation.is_valid, "{:?}", validation.issues);
    }

    #[test]
    fn test_html_issues_reported() {
        let validation = validate_html("<h1>One</h1><h1>Two</h1><h3>Deep</h3>");
        assert!(!validation.is_valid);
        assert!(validation.issues.contains(&"Multiple H1 tags found (2)".to_string()));
        assert!(validation
            .issues
            .contains(&"Broken heading hierarchy (headings skip levels)".to_string()));

        let validation = validate_html("<p>no headings</p>");
        assert_eq!(validation.issues, vec!["No headings found", "Missing H1 tag"]);
    }
}
