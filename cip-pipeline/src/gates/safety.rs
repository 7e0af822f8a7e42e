//! Safety Gate
//!
//! Classifies copyright risk of the source and screens for sensitive topics.
//!
//! # Risk Classification
//! 1. Host contains a `high_risk` entry → `RED`
//! 2. Host contains a `medium_risk` entry → `YELLOW`
//! 3. Source longer than the long-form threshold → `YELLOW`
//! 4. Otherwise → `GREEN`
//!
//! # Decision
//! - `RED`: halt, review required
//! - `YELLOW`: proceed, review required
//! - Any sensitive topic forces review without changing `proceed`

use crate::config::SafetySettings;
use crate::text::host_of;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Sensitive topic families and their trigger phrases
const SENSITIVE_TOPICS: &[(&str, &[&str])] = &[
    (
        "legal_advice",
        &["legal advice", "legal requirement", "compliance requirement", "must comply"],
    ),
    ("financial_advice", &["investment", "financial advice", "roi guarantee"]),
    ("medical", &["medical", "health advice", "treatment"]),
    (
        "security_vulnerabilities",
        &["zero-day", "exploit", "vulnerability", "cve-"],
    ),
];

/// Copyright risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Red,
    Yellow,
    Green,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Red => "RED",
            RiskLevel::Yellow => "YELLOW",
            RiskLevel::Green => "GREEN",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RED" => Ok(RiskLevel::Red),
            "YELLOW" => Ok(RiskLevel::Yellow),
            "GREEN" => Ok(RiskLevel::Green),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

/// Safety gate outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyDecision {
    pub risk_level: RiskLevel,
    pub proceed: bool,
    pub requires_human_review: bool,
    /// One human-readable reason per triggering condition
    pub warnings: Vec<String>,
    pub sensitive_topics: Vec<String>,
    pub source_url: String,
}

/// Safety gate over configured domain lists
#[derive(Debug, Clone)]
pub struct SafetyGate {
    settings: SafetySettings,
}

impl SafetyGate {
    pub fn new(settings: SafetySettings) -> Self {
        Self { settings }
    }

    /// Evaluate a source article
    pub fn evaluate(&self, source_url: &str, content: &str) -> SafetyDecision {
        let risk_level = self.assess_copyright_risk(source_url, content);
        let sensitive_topics = check_sensitive_topics(content);
        let decision = make_decision(risk_level, sensitive_topics, source_url);

        if decision.proceed {
            info!(
                risk_level = %decision.risk_level,
                requires_review = decision.requires_human_review,
                "Safety gate passed"
            );
        } else {
            warn!(risk_level = %decision.risk_level, source_url, "Safety gate halted pipeline");
        }
        decision
    }

    /// Classify copyright risk from the source host and length
    pub fn assess_copyright_risk(&self, source_url: &str, content: &str) -> RiskLevel {
        let host = host_of(source_url);

        let matches_host = |entries: &[String]| {
            entries
                .iter()
                .map(|entry| entry.trim().to_lowercase())
                .any(|entry| !entry.is_empty() && host.contains(&entry))
        };

        if matches_host(&self.settings.high_risk) {
            return RiskLevel::Red;
        }
        if matches_host(&self.settings.medium_risk) {
            return RiskLevel::Yellow;
        }
        if content.split_whitespace().count() > self.settings.long_form_word_threshold {
            return RiskLevel::Yellow;
        }
        RiskLevel::Green
    }
}

/// Sensitive topic tags found in the content, deduplicated and sorted
pub fn check_sensitive_topics(content: &str) -> Vec<String> {
    let lower = content.to_lowercase();
    let mut found: Vec<String> = SENSITIVE_TOPICS
        .iter()
        .filter(|(_, phrases)| phrases.iter().any(|phrase| lower.contains(phrase)))
        .map(|(topic, _)| topic.to_string())
        .collect();
    found.sort();
    found.dedup();
    found
}

/// Combine risk level and sensitive topics into a decision
pub fn make_decision(
    risk_level: RiskLevel,
    sensitive_topics: Vec<String>,
    source_url: &str,
) -> SafetyDecision {
    let mut decision = SafetyDecision {
        risk_level,
        proceed: true,
        requires_human_review: false,
        warnings: Vec::new(),
        sensitive_topics,
        source_url: source_url.to_string(),
    };

    match risk_level {
        RiskLevel::Red => {
            decision.proceed = false;
            decision.requires_human_review = true;
            decision
                .warnings
                .push("Major publication with high creative content - PIPELINE HALTED".to_string());
        }
        RiskLevel::Yellow => {
            decision.requires_human_review = true;
            decision
                .warnings
                .push("Medium risk source - mandatory human review required".to_string());
        }
        RiskLevel::Green => {}
    }

    if !decision.sensitive_topics.is_empty() {
        decision.requires_human_review = true;
        decision.warnings.push(format!(
            "Sensitive topics detected: {}",
            decision.sensitive_topics.join(", ")
        ));
    }

    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> SafetyGate {
        SafetyGate::new(SafetySettings {
            high_risk: vec!["nytimes.com".to_string()],
            medium_risk: vec!["competitor.io".to_string()],
            long_form_word_threshold: 3000,
            chunk_words: 500,
        })
    }

    fn words(n: usize) -> String {
        vec!["email"; n].join(" ")
    }

    #[test]
    fn test_high_risk_host_halts_regardless_of_content() {
        let decision = gate().evaluate("https://www.nytimes.com/2024/article", &words(200));
        assert_eq!(decision.risk_level, RiskLevel::Red);
        assert!(!decision.proceed);
        assert!(decision.requires_human_review);
        assert!(decision.warnings[0].contains("PIPELINE HALTED"));
    }

    #[test]
    fn test_medium_risk_host_proceeds_with_review() {
        let decision = gate().evaluate("https://blog.competitor.io/post", &words(200));
        assert_eq!(decision.risk_level, RiskLevel::Yellow);
        assert!(decision.proceed);
        assert!(decision.requires_human_review);
    }

    #[test]
    fn test_long_form_source_is_yellow() {
        let g = gate();
        assert_eq!(g.assess_copyright_risk("https://smallblog.dev/a", &words(3000)), RiskLevel::Green);
        assert_eq!(g.assess_copyright_risk("https://smallblog.dev/a", &words(3001)), RiskLevel::Yellow);
    }

    #[test]
    fn test_green_clean_source_needs_no_review() {
        let decision = gate().evaluate("https://smallblog.dev/a", &words(1200));
        assert_eq!(decision.risk_level, RiskLevel::Green);
        assert!(decision.proceed);
        assert!(!decision.requires_human_review);
        assert!(decision.warnings.is_empty());
    }

    #[test]
    fn test_sensitive_topic_forces_review_but_not_halt() {
        let content = format!("{} This zero-day EXPLOIT needs legal advice.", words(100));
        let decision = gate().evaluate("https://smallblog.dev/a", &content);
        assert!(decision.proceed);
        assert!(decision.requires_human_review);
        assert_eq!(decision.sensitive_topics, vec!["legal_advice", "security_vulnerabilities"]);
        assert_eq!(
            decision.warnings,
            vec!["Sensitive topics detected: legal_advice, security_vulnerabilities"]
        );
    }

    #[test]
    fn test_red_with_sensitive_topics_accumulates_warnings() {
        let decision = gate().evaluate("https://nytimes.com/a", "medical treatment news");
        assert!(!decision.proceed);
        assert_eq!(decision.warnings.len(), 2);
        assert_eq!(decision.sensitive_topics, vec!["medical"]);
    }

    #[test]
    fn test_decision_is_deterministic() {
        let g = gate();
        let content = format!("{} investment", words(50));
        assert_eq!(
            g.evaluate("https://smallblog.dev/a", &content),
            g.evaluate("https://smallblog.dev/a", &content)
        );
    }

    #[test]
    fn test_risk_level_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&RiskLevel::Yellow).unwrap(), "\"YELLOW\"");
        assert_eq!("GREEN".parse::<RiskLevel>().unwrap(), RiskLevel::Green);
        assert!("blue".parse::<RiskLevel>().is_err());
    }
}
