use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity of a review finding.
///
/// Ordered: `Low < Medium < High < Critical`.
///
/// # Examples
///
/// ```
/// use synod_core::Severity;
///
/// let s: Severity = serde_json::from_str("\"critical\"").unwrap();
/// assert_eq!(s, Severity::Critical);
/// assert!(Severity::Critical > Severity::High);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Minor issue, fix at leisure.
    Low,
    /// Worth addressing before merge.
    Medium,
    /// Should block the merge.
    High,
    /// Must be fixed immediately.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

impl Severity {
    /// Returns `true` if `self` is at least as severe as `threshold`.
    ///
    /// # Examples
    ///
    /// ```
    /// use synod_core::Severity;
    ///
    /// assert!(Severity::Critical.meets_threshold(Severity::High));
    /// assert!(Severity::High.meets_threshold(Severity::High));
    /// assert!(!Severity::Low.meets_threshold(Severity::Medium));
    /// ```
    pub fn meets_threshold(self, threshold: Severity) -> bool {
        self >= threshold
    }
}

/// Category of a review finding.
///
/// This is a closed set; raw model output is normalized into it and
/// unrecognized categories are dropped rather than passed through.
///
/// # Examples
///
/// ```
/// use synod_core::Category;
///
/// let c: Category = "maintainability".parse().unwrap();
/// assert_eq!(c, Category::Quality);
/// assert!("banana".parse::<Category>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Vulnerabilities, unsafe handling of untrusted input, secrets.
    Security,
    /// Inefficiency, scalability, resource use.
    Performance,
    /// Readability, naming, formatting conventions.
    Style,
    /// Correctness, logic, maintainability.
    Quality,
    /// Structural and design concerns.
    Architecture,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Security => write!(f, "security"),
            Category::Performance => write!(f, "performance"),
            Category::Style => write!(f, "style"),
            Category::Quality => write!(f, "quality"),
            Category::Architecture => write!(f, "architecture"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "security" => Ok(Category::Security),
            "performance" => Ok(Category::Performance),
            "style" | "formatting" => Ok(Category::Style),
            // Models frequently label correctness issues with one of these.
            "quality" | "logic" | "correctness" | "maintainability" | "bug" => Ok(Category::Quality),
            "architecture" | "design" => Ok(Category::Architecture),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// A single validated review finding.
///
/// # Examples
///
/// ```
/// use synod_core::{Category, Finding, Severity};
///
/// let finding = Finding {
///     category: Category::Security,
///     severity: Severity::High,
///     file: Some("app/auth.py".into()),
///     line: Some(24),
///     message: "String-interpolated SQL query allows injection".into(),
///     suggestion: Some("Use a parameterized query".into()),
/// };
/// assert_eq!(finding.severity, Severity::High);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Category of the issue.
    pub category: Category,
    /// Severity of the issue.
    pub severity: Severity,
    /// Path of the affected file, if the model located it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Line number in the new version of the file (1-based).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Explanation of the issue.
    pub message: String,
    /// Optional fix suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Informational context about a review request.
///
/// Passed through to prompts verbatim; never interpreted by the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewContext {
    /// Repository identifier (`org/repo`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Pull request number, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    /// Commit SHA under review.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    /// Author username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Branch name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// A code review request.
///
/// # Examples
///
/// ```
/// use synod_core::ReviewRequest;
///
/// let request = ReviewRequest {
///     diff: "+let x = 1;".into(),
///     language: Some("rust".into()),
///     context: None,
/// };
/// assert!(request.language.is_some());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    /// Unified diff to review.
    pub diff: String,
    /// Primary language hint; auto-detected from the diff when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Informational request context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ReviewContext>,
}

/// Execution metadata attached to every review result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewMetadata {
    /// Wall-clock time for the whole review in milliseconds.
    pub execution_time_ms: u64,
    /// Approximate total tokens consumed by the model calls.
    pub tokens_used: u64,
    /// Number of agents in the configured pipeline.
    pub agent_count: usize,
    /// Model identifier used for the review.
    pub model: String,
    /// Guardrails that altered the payload, in application order.
    #[serde(default)]
    pub guardrails_applied: Vec<String>,
    /// Analyzer tasks that failed, as `role: reason` entries.
    #[serde(default)]
    pub failed_analyzers: Vec<String>,
}

/// Final result of a completed code review.
///
/// # Examples
///
/// ```
/// use synod_core::{ReviewMetadata, ReviewResult};
///
/// let result = ReviewResult {
///     summary: "Looks good".into(),
///     score: 9.0,
///     findings: vec![],
///     metadata: ReviewMetadata {
///         execution_time_ms: 1200,
///         tokens_used: 400,
///         agent_count: 5,
///         model: "gpt-4o-mini".into(),
///         guardrails_applied: vec![],
///         failed_analyzers: vec![],
///     },
/// };
/// assert!(result.findings.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    /// High-level summary of the review.
    pub summary: String,
    /// Overall code quality score (0–10).
    pub score: f64,
    /// Validated findings, sorted by severity descending.
    pub findings: Vec<Finding>,
    /// Execution metadata.
    pub metadata: ReviewMetadata,
}

impl ReviewResult {
    /// Count findings at exactly `severity`.
    pub fn count_at(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    /// The highest severity present, if any findings exist.
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    /// Render the review result as markdown, suitable for a PR comment.
    pub fn to_markdown(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        out.push_str("## AI Code Review\n\n");
        let _ = writeln!(out, "**Summary:** {}", self.summary);
        let _ = writeln!(out, "**Quality Score:** {:.1}/10\n", self.score);

        if self.findings.is_empty() {
            out.push_str("No issues found.\n");
        } else {
            for tier in [
                Severity::Critical,
                Severity::High,
                Severity::Medium,
                Severity::Low,
            ] {
                let in_tier: Vec<&Finding> =
                    self.findings.iter().filter(|f| f.severity == tier).collect();
                if in_tier.is_empty() {
                    continue;
                }
                let _ = writeln!(out, "### {} severity\n", heading_label(tier));
                for f in in_tier {
                    let location = match (&f.file, f.line) {
                        (Some(file), Some(line)) => format!("`{file}:{line}`"),
                        (Some(file), None) => format!("`{file}`"),
                        _ => "`unknown`".into(),
                    };
                    let _ = writeln!(out, "- **{}** in {location}", f.category);
                    let _ = writeln!(out, "  > {}", f.message);
                    if let Some(s) = &f.suggestion {
                        let _ = writeln!(out, "  > **Suggestion:** {s}");
                    }
                    out.push('\n');
                }
            }
        }

        let _ = writeln!(
            out,
            "---\n*Reviewed by {} AI agents using {} in {}ms*",
            self.metadata.agent_count, self.metadata.model, self.metadata.execution_time_ms,
        );
        out
    }
}

fn heading_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "Low",
        Severity::Medium => "Medium",
        Severity::High => "High",
        Severity::Critical => "Critical",
    }
}

impl fmt::Display for ReviewResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Review Results")?;
        writeln!(f, "==============")?;
        writeln!(
            f,
            "Model: {} | Score: {:.1}/10 | Findings: {} | Time: {}ms\n",
            self.metadata.model,
            self.score,
            self.findings.len(),
            self.metadata.execution_time_ms,
        )?;
        writeln!(f, "{}\n", self.summary)?;

        if self.findings.is_empty() {
            writeln!(f, "No issues found.")?;
        } else {
            for finding in &self.findings {
                let label = finding.severity.to_string().to_uppercase();
                let location = match (&finding.file, finding.line) {
                    (Some(file), Some(line)) => format!("{file}:{line}"),
                    (Some(file), None) => file.clone(),
                    _ => "unknown".into(),
                };
                writeln!(f, "[{label}] {} ({location})", finding.category)?;
                writeln!(f, "  {}", finding.message)?;
                if let Some(s) = &finding.suggestion {
                    writeln!(f, "  Suggestion: {s}")?;
                }
                writeln!(f)?;
            }
        }

        if !self.metadata.failed_analyzers.is_empty() {
            writeln!(
                f,
                "Degraded: {}",
                self.metadata.failed_analyzers.join("; ")
            )?;
        }

        Ok(())
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use synod_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary (default).
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
