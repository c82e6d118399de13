use serde::Deserialize;
use synod_core::ReviewContext;

use crate::task::AnalyzerRole;

const SYNTHESIS_SYSTEM_PROMPT: &str = "\
You are a Principal Engineer who leads code reviews across teams. Specialist \
reviewers have each examined the same code diff; your job is to synthesize \
their findings into one comprehensive, prioritized review.

Rules:
- Merge findings that describe the same issue at the same location; when \
merged findings disagree on severity, keep the higher one
- Drop findings that are clearly wrong or reference code not in the diff
- Order findings from most to least severe
- Score the overall quality of the change from 0 (unacceptable) to 10 (excellent)

Respond with a JSON object:
{
  \"summary\": \"Two to four sentences describing the change and its main risks\",
  \"score\": 0.0-10.0,
  \"findings\": [
    {
      \"category\": \"security\" | \"performance\" | \"style\" | \"quality\" | \"architecture\",
      \"severity\": \"low\" | \"medium\" | \"high\" | \"critical\",
      \"file\": \"path/to/file\",
      \"line\": 42,
      \"message\": \"Clear explanation of the issue\",
      \"suggestion\": \"Actionable fix\"
    }
  ]
}";

/// One finding exactly as the model emitted it, before any validation.
///
/// Category and severity stay as free-form strings here; the guardrail
/// pipeline owns normalizing them into the closed sets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFinding {
    /// Claimed category.
    #[serde(default)]
    pub category: String,
    /// Claimed severity.
    #[serde(default)]
    pub severity: String,
    /// Referenced file, if any.
    #[serde(default)]
    pub file: Option<String>,
    /// Referenced line; zero and negatives are treated as absent later.
    #[serde(default)]
    pub line: Option<i64>,
    /// Issue description.
    #[serde(default)]
    pub message: String,
    /// Suggested fix.
    #[serde(default)]
    pub suggestion: Option<String>,
}

/// The synthesizer's complete raw output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReview {
    /// Raw summary text.
    #[serde(default)]
    pub summary: String,
    /// Raw quality score; clamped by guardrails.
    #[serde(default)]
    pub score: f64,
    /// Raw findings.
    #[serde(default)]
    pub findings: Vec<RawFinding>,
}

#[derive(Deserialize)]
struct FindingsEnvelope {
    #[serde(default)]
    findings: Vec<RawFinding>,
}

/// Build the analyzer user prompt containing the diff under review.
///
/// # Examples
///
/// ```
/// use synod_review::prompt::build_analyzer_prompt;
///
/// let prompt = build_analyzer_prompt("+new line", "rust", None);
/// assert!(prompt.contains("+new line"));
/// assert!(prompt.contains("rust"));
/// ```
pub fn build_analyzer_prompt(diff: &str, language: &str, context: Option<&ReviewContext>) -> String {
    let mut prompt = format!(
        "Review the following {language} code changes:\n\n```diff\n{diff}\n```\n"
    );
    if let Some(ctx) = context {
        push_context(&mut prompt, ctx);
    }
    prompt
}

/// Build the synthesis user prompt from the surviving analyzer outputs.
///
/// Outputs are labeled per role so the synthesizer can weigh specialist
/// agreement; the original diff is included so it can reject findings that
/// reference code outside it.
pub fn build_synthesis_prompt(
    diff: &str,
    language: &str,
    context: Option<&ReviewContext>,
    analyzer_reports: &[(AnalyzerRole, String)],
) -> String {
    let mut prompt = format!(
        "The following {language} code changes were reviewed by specialist agents:\n\n\
         ```diff\n{diff}\n```\n"
    );
    if let Some(ctx) = context {
        push_context(&mut prompt, ctx);
    }
    prompt.push_str("\nSpecialist reports:\n");
    for (role, report) in analyzer_reports {
        prompt.push_str(&format!("\n--- {role} reviewer ---\n{report}\n"));
    }
    prompt.push_str("\nSynthesize these into the final review.");
    prompt
}

/// The synthesis system prompt.
pub fn synthesis_system_prompt() -> String {
    SYNTHESIS_SYSTEM_PROMPT.to_string()
}

fn push_context(prompt: &mut String, ctx: &ReviewContext) {
    let mut lines = Vec::new();
    if let Some(repo) = &ctx.repo {
        lines.push(format!("repository: {repo}"));
    }
    if let Some(pr) = ctx.pr_number {
        lines.push(format!("pull request: #{pr}"));
    }
    if let Some(sha) = &ctx.commit_sha {
        lines.push(format!("commit: {sha}"));
    }
    if let Some(author) = &ctx.author {
        lines.push(format!("author: {author}"));
    }
    if let Some(branch) = &ctx.branch {
        lines.push(format!("branch: {branch}"));
    }
    if !lines.is_empty() {
        prompt.push_str("\nAdditional context:\n");
        for line in lines {
            prompt.push_str(&format!("- {line}\n"));
        }
    }
}

/// Parse an analyzer response into raw findings.
///
/// Handles markdown code fences around JSON. A response that is not valid
/// JSON yields an error so the orchestrator can record the analyzer as
/// failed rather than silently contributing nothing.
///
/// # Examples
///
/// ```
/// use synod_review::prompt::parse_findings_response;
///
/// let findings = parse_findings_response(r#"{"findings":[]}"#).unwrap();
/// assert!(findings.is_empty());
/// ```
pub fn parse_findings_response(response: &str) -> Result<Vec<RawFinding>, String> {
    let cleaned = strip_code_fences(response);
    let parsed: FindingsEnvelope = serde_json::from_str(cleaned)
        .map_err(|e| format!("unparseable findings response: {e}"))?;
    Ok(parsed.findings)
}

/// Parse the synthesizer response.
///
/// Missing fields default (empty summary, score 0.0, no findings); the
/// guardrail pipeline repairs them. A response that is not JSON at all is
/// an error; the orchestrator then falls back to the merged analyzer
/// findings.
pub fn parse_synthesis_response(response: &str) -> Result<RawReview, String> {
    let cleaned = strip_code_fences(response);
    serde_json::from_str(cleaned).map_err(|e| format!("unparseable synthesis response: {e}"))
}

fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}
