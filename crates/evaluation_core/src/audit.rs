//! crates/evaluation_core/src/audit.rs
//!
//! Repository audits: URL validation and turning a rule report into display text.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{RepositoryReport, ScoreRecord};

/// Name of the single synthetic record an audit produces.
pub const AUDIT_SUBJECT: &str = "Repository Analysis";

fn repository_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://(www\.)?github\.com/[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+?(\.git)?/?$")
            .expect("literal pattern")
    })
}

/// Accepts `https://github.com/<owner>/<repo>` with an optional `.git` or trailing slash.
pub fn is_valid_repository_url(url: &str) -> bool {
    repository_url().is_match(url.trim())
}

/// The rendered audit: the overall text and the one record shown in the score list.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditSummary {
    pub text: String,
    pub record: ScoreRecord,
}

/// Blank text counts as absent.
fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|t| !t.trim().is_empty())
}

fn rules_text(report: &RepositoryReport) -> String {
    if report.rule_results.is_empty() {
        return "No automated rule violations detected.".to_string();
    }
    report
        .rule_results
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            let reasoning = non_empty(&rule.evidence)
                .or_else(|| non_empty(&rule.failure_reason))
                .unwrap_or("-");
            format!(
                "Rule {}: {}\n   Satisfied: {}\n   Reasoning: {}",
                i + 1,
                non_empty(&rule.rule_text).unwrap_or("-"),
                if rule.satisfied { "Yes" } else { "No" },
                reasoning
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds the audit text and its synthetic, unscored record.
pub fn summarize(report: &RepositoryReport) -> AuditSummary {
    let response = report
        .conversational_response
        .clone()
        .or_else(|| report.overall_comment.clone())
        .unwrap_or_else(|| "Analysis complete.".to_string());
    let stack = report
        .detected_stack
        .as_ref()
        .map(|s| s.join(", "))
        .unwrap_or_else(|| "Not detected".to_string());
    let log = report
        .rules_summary
        .clone()
        .unwrap_or_else(|| "No further details.".to_string());

    let text = [
        format!("RESPONSE TO YOUR QUERY:\n{}", response),
        format!("\nDETECTED STACK: {}", stack),
        format!("\n---\nDETAILED ANALYSIS LOG:\n{}", log),
        format!("\n---\nRULE RESULTS:\n{}", rules_text(report)),
    ]
    .join("\n");

    AuditSummary {
        text,
        record: ScoreRecord {
            name: Some(AUDIT_SUBJECT.to_string()),
            score_percent: None,
            reasoning: Some(response),
            ..Default::default()
        },
    }
}
