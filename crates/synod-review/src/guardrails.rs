//! Deterministic post-processing of raw model output.
//!
//! A pipeline of pure stages over the synthesizer's raw review: schema
//! enforcement, severity defaulting, file validation, deduplication,
//! severity escalation, cap enforcement, and score clamping. Each stage
//! records its name only when it actually altered the payload, so
//! `applied` is empty exactly when the raw output needed no correction.

use std::collections::HashMap;

use synod_core::{Category, Finding, Severity};
use tracing::debug;

use crate::prompt::{RawFinding, RawReview};

/// Number of normalized message characters used in the duplicate fingerprint.
const FINGERPRINT_MESSAGE_CHARS: usize = 50;

/// Fallback summary when the model produced none.
const DEFAULT_SUMMARY: &str = "Code review completed.";

/// Message keywords that make a low-severity security finding implausible.
const SERIOUS_SECURITY_KEYWORDS: &[&str] = &[
    "injection",
    "xss",
    "sql",
    "authentication",
    "authorization",
    "credential",
    "password",
    "secret",
    "token",
];

/// Immutable context the guardrails validate against.
#[derive(Debug, Clone, Default)]
pub struct GuardrailContext {
    /// File paths extracted from the diff under review. Empty means
    /// extraction failed and file validation is skipped.
    pub diff_files: Vec<String>,
}

/// A raw review after the full guardrail pipeline.
#[derive(Debug, Clone)]
pub struct Validated {
    /// Repaired summary.
    pub summary: String,
    /// Clamped score.
    pub score: f64,
    /// Surviving findings, severity-sorted and capped.
    pub findings: Vec<Finding>,
    /// Guardrails that altered the payload, in application order.
    pub applied: Vec<String>,
}

/// Run the full guardrail pipeline over a raw review.
///
/// Pure and deterministic: no I/O, no randomness, and idempotent.
/// Feeding a validated result back through produces it unchanged with an
/// empty `applied` list.
pub fn apply(raw: RawReview, ctx: &GuardrailContext, max_findings: usize) -> Validated {
    let mut applied = Vec::new();

    let (summary, summary_changed) = default_summary(raw.summary);
    if summary_changed {
        applied.push("summary_default".to_string());
    }

    let outcome = validate_schema(raw.findings);
    if outcome.schema_changed {
        applied.push("schema_validation".to_string());
    }
    if outcome.severity_defaulted {
        applied.push("severity_default".to_string());
    }
    let mut findings = outcome.findings;

    let before = findings.len();
    findings = validate_files(findings, &ctx.diff_files);
    if findings.len() != before {
        applied.push("file_validation".to_string());
    }

    let before = findings.len();
    findings = deduplicate(findings);
    if findings.len() != before {
        applied.push("duplicate_detection".to_string());
    }

    if escalate_severity(&mut findings) {
        applied.push("severity_escalation".to_string());
    }

    findings.sort_by_key(|f| std::cmp::Reverse(f.severity));

    if findings.len() > max_findings {
        findings.truncate(max_findings);
        applied.push("max_findings".to_string());
    }

    let (score, score_changed) = clamp_score(raw.score);
    if score_changed {
        applied.push("score_clamp".to_string());
    }

    if !applied.is_empty() {
        debug!(guardrails = ?applied, findings = findings.len(), "guardrails corrected payload");
    }

    Validated {
        summary,
        score,
        findings,
        applied,
    }
}

fn default_summary(summary: String) -> (String, bool) {
    let trimmed = summary.trim();
    if trimmed.is_empty() {
        (DEFAULT_SUMMARY.to_string(), true)
    } else {
        let changed = trimmed.len() != summary.len();
        (trimmed.to_string(), changed)
    }
}

struct SchemaOutcome {
    findings: Vec<Finding>,
    schema_changed: bool,
    severity_defaulted: bool,
}

/// Enforce the closed schema on each raw finding.
///
/// Findings with an empty message or an unrecognized category are dropped;
/// unrecognized severities default to `low`; non-positive line numbers
/// become absent.
fn validate_schema(raw: Vec<RawFinding>) -> SchemaOutcome {
    let mut findings = Vec::with_capacity(raw.len());
    let mut schema_changed = false;
    let mut severity_defaulted = false;

    for finding in raw {
        let message = finding.message.trim();
        if message.is_empty() {
            schema_changed = true;
            continue;
        }
        let Ok(category) = finding.category.parse::<Category>() else {
            schema_changed = true;
            continue;
        };
        let severity = match finding.severity.parse::<Severity>() {
            Ok(s) => s,
            Err(_) => {
                severity_defaulted = true;
                Severity::Low
            }
        };
        let line = match finding.line {
            Some(l) if l >= 1 && l <= u32::MAX as i64 => Some(l as u32),
            Some(_) => {
                schema_changed = true;
                None
            }
            None => None,
        };
        let suggestion = finding
            .suggestion
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        findings.push(Finding {
            category,
            severity,
            file: finding.file.filter(|f| !f.is_empty()),
            line,
            message: message.to_string(),
            suggestion,
        });
    }

    SchemaOutcome {
        findings,
        schema_changed,
        severity_defaulted,
    }
}

/// Drop findings that reference files absent from the diff.
///
/// Skipped entirely when no files could be extracted from the diff;
/// findings without a file reference always survive.
fn validate_files(findings: Vec<Finding>, diff_files: &[String]) -> Vec<Finding> {
    if diff_files.is_empty() {
        return findings;
    }
    findings
        .into_iter()
        .filter(|f| match &f.file {
            Some(file) => diff_files.iter().any(|d| d == file),
            None => true,
        })
        .collect()
}

fn fingerprint(finding: &Finding) -> (Category, Option<String>, Option<u32>, String) {
    let normalized: String = finding
        .message
        .to_lowercase()
        .trim()
        .chars()
        .take(FINGERPRINT_MESSAGE_CHARS)
        .collect();
    (
        finding.category,
        finding.file.clone(),
        finding.line,
        normalized,
    )
}

/// Collapse duplicate findings.
///
/// Two findings are duplicates when category, file, and line match and the
/// first 50 normalized characters of their messages are equal. The higher
/// severity wins; equal severity keeps the first occurrence; the survivor
/// keeps the longer suggestion.
fn deduplicate(findings: Vec<Finding>) -> Vec<Finding> {
    let mut kept: Vec<Finding> = Vec::with_capacity(findings.len());
    let mut index: HashMap<(Category, Option<String>, Option<u32>, String), usize> = HashMap::new();

    for finding in findings {
        let key = fingerprint(&finding);
        match index.get(&key) {
            Some(&i) => {
                let existing = &mut kept[i];
                let suggestion = longer_suggestion(existing.suggestion.take(), finding.suggestion.clone());
                if finding.severity > existing.severity {
                    *existing = finding;
                }
                existing.suggestion = suggestion;
            }
            None => {
                index.insert(key, kept.len());
                kept.push(finding);
            }
        }
    }

    kept
}

fn longer_suggestion(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.len() > a.len() { b } else { a }),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

/// Raise low-severity security findings whose message names a serious
/// vulnerability class to medium.
fn escalate_severity(findings: &mut [Finding]) -> bool {
    let mut changed = false;
    for finding in findings.iter_mut() {
        if finding.category == Category::Security && finding.severity == Severity::Low {
            let message = finding.message.to_lowercase();
            if SERIOUS_SECURITY_KEYWORDS.iter().any(|k| message.contains(k)) {
                finding.severity = Severity::Medium;
                changed = true;
            }
        }
    }
    changed
}

fn clamp_score(score: f64) -> (f64, bool) {
    if score.is_nan() {
        return (0.0, true);
    }
    let clamped = score.clamp(0.0, 10.0);
    (clamped, clamped != score)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_finding(category: &str, severity: &str, file: &str, line: i64, message: &str) -> RawFinding {
        RawFinding {
            category: category.into(),
            severity: severity.into(),
            file: Some(file.into()),
            line: Some(line),
            message: message.into(),
            suggestion: None,
        }
    }

    fn ctx_with(files: &[&str]) -> GuardrailContext {
        GuardrailContext {
            diff_files: files.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn clean_review() -> RawReview {
        RawReview {
            summary: "A tidy change.".into(),
            score: 8.0,
            findings: vec![raw_finding("security", "high", "a.rs", 3, "SQL built by string interpolation allows injection")],
        }
    }

    #[test]
    fn clean_payload_records_nothing() {
        let validated = apply(clean_review(), &ctx_with(&["a.rs"]), 20);
        assert!(validated.applied.is_empty());
        assert_eq!(validated.findings.len(), 1);
        assert_eq!(validated.score, 8.0);
    }

    #[test]
    fn idempotent_on_validated_output() {
        let first = apply(
            RawReview {
                summary: "  ".into(),
                score: 14.0,
                findings: vec![
                    raw_finding("security", "weird", "a.rs", 0, "credential leak in log output"),
                    raw_finding("logic", "high", "a.rs", 9, "off by one"),
                ],
            },
            &ctx_with(&["a.rs"]),
            20,
        );
        assert!(!first.applied.is_empty());

        // Feed the validated output back through unchanged.
        let reraw = RawReview {
            summary: first.summary.clone(),
            score: first.score,
            findings: first
                .findings
                .iter()
                .map(|f| RawFinding {
                    category: f.category.to_string(),
                    severity: f.severity.to_string(),
                    file: f.file.clone(),
                    line: f.line.map(|l| l as i64),
                    message: f.message.clone(),
                    suggestion: f.suggestion.clone(),
                })
                .collect(),
        };
        let second = apply(reraw, &ctx_with(&["a.rs"]), 20);
        assert!(second.applied.is_empty(), "second pass applied: {:?}", second.applied);
        assert_eq!(second.findings, first.findings);
        assert_eq!(second.summary, first.summary);
        assert_eq!(second.score, first.score);
    }

    #[test]
    fn drops_empty_messages_and_unknown_categories() {
        let raw = RawReview {
            summary: "s".into(),
            score: 5.0,
            findings: vec![
                raw_finding("security", "high", "a.rs", 1, "   "),
                raw_finding("astrology", "high", "a.rs", 2, "mercury is retrograde"),
                raw_finding("quality", "high", "a.rs", 3, "real issue"),
            ],
        };
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        assert_eq!(validated.findings.len(), 1);
        assert_eq!(validated.findings[0].message, "real issue");
        assert!(validated.applied.contains(&"schema_validation".to_string()));
    }

    #[test]
    fn unknown_severity_defaults_to_low() {
        let raw = RawReview {
            summary: "s".into(),
            score: 5.0,
            findings: vec![raw_finding("style", "catastrophic", "a.rs", 1, "bad name")],
        };
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        assert_eq!(validated.findings[0].severity, Severity::Low);
        assert!(validated.applied.contains(&"severity_default".to_string()));
    }

    #[test]
    fn category_aliases_normalize_without_dropping() {
        let raw = RawReview {
            summary: "s".into(),
            score: 5.0,
            findings: vec![raw_finding("maintainability", "medium", "a.rs", 1, "long function")],
        };
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        assert_eq!(validated.findings[0].category, Category::Quality);
    }

    #[test]
    fn non_positive_lines_become_absent() {
        let raw = RawReview {
            summary: "s".into(),
            score: 5.0,
            findings: vec![raw_finding("quality", "low", "a.rs", 0, "whole-file issue")],
        };
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        assert_eq!(validated.findings[0].line, None);
        assert!(validated.applied.contains(&"schema_validation".to_string()));
    }

    #[test]
    fn findings_outside_diff_are_dropped() {
        let raw = RawReview {
            summary: "s".into(),
            score: 5.0,
            findings: vec![
                raw_finding("quality", "high", "a.rs", 1, "in the diff"),
                raw_finding("quality", "high", "ghost.rs", 1, "hallucinated file"),
            ],
        };
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        assert_eq!(validated.findings.len(), 1);
        assert!(validated.applied.contains(&"file_validation".to_string()));
    }

    #[test]
    fn file_validation_skipped_without_extracted_files() {
        let raw = RawReview {
            summary: "s".into(),
            score: 5.0,
            findings: vec![raw_finding("quality", "high", "ghost.rs", 1, "kept anyway")],
        };
        let validated = apply(raw, &GuardrailContext::default(), 20);
        assert_eq!(validated.findings.len(), 1);
        assert!(!validated.applied.contains(&"file_validation".to_string()));
    }

    #[test]
    fn duplicates_collapse_to_higher_severity() {
        let raw = RawReview {
            summary: "s".into(),
            score: 5.0,
            findings: vec![
                raw_finding("security", "medium", "a.rs", 7, "SQL injection via user input in the query builder"),
                raw_finding("security", "critical", "a.rs", 7, "SQL INJECTION via user input in the query builder!!"),
            ],
        };
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        assert_eq!(validated.findings.len(), 1);
        assert_eq!(validated.findings[0].severity, Severity::Critical);
        assert!(validated.applied.contains(&"duplicate_detection".to_string()));
    }

    #[test]
    fn equal_severity_duplicates_keep_first_and_longer_suggestion() {
        let mut a = raw_finding("quality", "medium", "a.rs", 7, "duplicate logic in both branches");
        a.suggestion = Some("short".into());
        let mut b = raw_finding("quality", "medium", "a.rs", 7, "Duplicate logic in both branches");
        b.suggestion = Some("extract the shared branch body into a helper".into());

        let raw = RawReview {
            summary: "s".into(),
            score: 5.0,
            findings: vec![a, b],
        };
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        assert_eq!(validated.findings.len(), 1);
        // First occurrence's message survives, longer suggestion wins.
        assert_eq!(validated.findings[0].message, "duplicate logic in both branches");
        assert_eq!(
            validated.findings[0].suggestion.as_deref(),
            Some("extract the shared branch body into a helper")
        );
    }

    #[test]
    fn different_lines_are_not_duplicates() {
        let raw = RawReview {
            summary: "s".into(),
            score: 5.0,
            findings: vec![
                raw_finding("quality", "medium", "a.rs", 7, "same message"),
                raw_finding("quality", "medium", "a.rs", 8, "same message"),
            ],
        };
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        assert_eq!(validated.findings.len(), 2);
    }

    #[test]
    fn low_security_findings_with_serious_keywords_escalate() {
        let raw = RawReview {
            summary: "s".into(),
            score: 5.0,
            findings: vec![
                raw_finding("security", "low", "a.rs", 1, "password stored in plain text"),
                raw_finding("security", "low", "a.rs", 2, "missing security header"),
            ],
        };
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        let by_line = |line| {
            validated
                .findings
                .iter()
                .find(|f| f.line == Some(line))
                .unwrap()
                .severity
        };
        assert_eq!(by_line(1), Severity::Medium);
        assert_eq!(by_line(2), Severity::Low);
        assert!(validated.applied.contains(&"severity_escalation".to_string()));
    }

    #[test]
    fn cap_keeps_highest_severity_in_original_order() {
        let raw = RawReview {
            summary: "s".into(),
            score: 5.0,
            findings: vec![
                raw_finding("quality", "low", "a.rs", 1, "low one"),
                raw_finding("quality", "critical", "a.rs", 2, "critical one"),
                raw_finding("quality", "medium", "a.rs", 3, "medium one"),
                raw_finding("quality", "high", "a.rs", 4, "high one"),
                raw_finding("quality", "high", "a.rs", 5, "high two"),
            ],
        };
        let validated = apply(raw, &ctx_with(&["a.rs"]), 3);
        assert_eq!(validated.findings.len(), 3);
        assert_eq!(validated.findings[0].severity, Severity::Critical);
        assert_eq!(validated.findings[1].message, "high one");
        assert_eq!(validated.findings[2].message, "high two");
        assert!(validated.applied.contains(&"max_findings".to_string()));
    }

    #[test]
    fn score_clamps_into_range() {
        let mut raw = clean_review();
        raw.score = 11.5;
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        assert_eq!(validated.score, 10.0);
        assert!(validated.applied.contains(&"score_clamp".to_string()));

        let mut raw = clean_review();
        raw.score = -3.0;
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        assert_eq!(validated.score, 0.0);
    }

    #[test]
    fn nan_score_clamps_to_zero() {
        let mut raw = clean_review();
        raw.score = f64::NAN;
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        assert_eq!(validated.score, 0.0);
        assert!(validated.applied.contains(&"score_clamp".to_string()));
    }

    #[test]
    fn empty_summary_gets_default() {
        let mut raw = clean_review();
        raw.summary = "".into();
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        assert_eq!(validated.summary, DEFAULT_SUMMARY);
        assert!(validated.applied.contains(&"summary_default".to_string()));
    }

    #[test]
    fn output_is_sorted_by_severity_descending() {
        let raw = RawReview {
            summary: "s".into(),
            score: 5.0,
            findings: vec![
                raw_finding("style", "low", "a.rs", 1, "nit"),
                raw_finding("security", "critical", "a.rs", 2, "injection"),
                raw_finding("performance", "medium", "a.rs", 3, "slow"),
            ],
        };
        let validated = apply(raw, &ctx_with(&["a.rs"]), 20);
        let severities: Vec<Severity> = validated.findings.iter().map(|f| f.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::Medium, Severity::Low]
        );
    }
}
