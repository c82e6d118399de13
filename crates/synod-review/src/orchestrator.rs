use std::sync::Arc;

use futures_util::future::join_all;
use synod_core::{ReviewContext, SynodError};
use tracing::{debug, info, warn};

use crate::diff::estimate_tokens;
use crate::llm::{ChatBackend, ChatMessage, Role};
use crate::prompt::{
    self, build_analyzer_prompt, build_synthesis_prompt, RawFinding, RawReview,
};
use crate::task::{AnalyzerRole, TaskSpec};

/// Agents in the configured pipeline: four analyzers plus the synthesizer.
pub const AGENT_COUNT: usize = AnalyzerRole::ALL.len() + 1;

/// Intermediate result of one analyzer task.
///
/// Owned by the orchestrator for the duration of one review and discarded
/// after synthesis.
#[derive(Debug)]
pub struct AgentOutput {
    /// Role that produced this output.
    pub role: AnalyzerRole,
    /// The raw report text, as handed to the synthesizer.
    pub report: String,
    /// Parsed findings, kept for the synthesis fallback path.
    pub findings: Vec<RawFinding>,
}

/// Raw outcome of one orchestrated review, before guardrails.
#[derive(Debug)]
pub struct Orchestration {
    /// The synthesizer's (or fallback's) raw review.
    pub raw: RawReview,
    /// Failed tasks as `role: reason` entries, synthesizer included.
    pub failed_analyzers: Vec<String>,
    /// Approximate tokens consumed across all model calls.
    pub tokens_used: u64,
}

/// Two-phase review orchestrator.
///
/// Phase one fans the diff out to four role-scoped analyzer tasks that run
/// concurrently against the backend; phase two runs a single synthesis task
/// over the combined output. Analyzer failures degrade the review instead
/// of failing it; only all four failing aborts the request.
pub struct Orchestrator {
    backend: Arc<dyn ChatBackend>,
}

impl Orchestrator {
    /// Create an orchestrator over a chat backend.
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Identifier of the model serving this orchestrator.
    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Run one full review over an already-sanitized diff.
    ///
    /// # Errors
    ///
    /// Returns [`SynodError::Analysis`] when every analyzer task fails;
    /// individual failures are recorded in the result instead.
    pub async fn run(
        &self,
        diff: &str,
        language: &str,
        context: Option<&ReviewContext>,
    ) -> Result<Orchestration, SynodError> {
        info!(language, diff_bytes = diff.len(), "starting review");

        // Parallel analysis phase. Each task gets an immutable view of the
        // same diff; there is no shared mutable state between them.
        let tasks = AnalyzerRole::ALL
            .iter()
            .map(|&role| self.run_analyzer(role, diff, language, context));
        let settled = join_all(tasks).await;

        let mut outputs: Vec<AgentOutput> = Vec::new();
        let mut failed: Vec<String> = Vec::new();
        for result in settled {
            match result {
                Ok(output) => outputs.push(output),
                Err((role, reason)) => {
                    warn!(%role, %reason, "analyzer task failed");
                    failed.push(format!("{role}: {reason}"));
                }
            }
        }

        if outputs.is_empty() {
            return Err(SynodError::Analysis(format!(
                "all analyzer tasks failed ({})",
                failed.join("; ")
            )));
        }

        let mut tokens_used = estimate_tokens(diff);
        for output in &outputs {
            tokens_used += estimate_tokens(&output.report);
        }

        // Sequential synthesis phase: starts only after every analyzer has
        // settled, and sees the complete set of surviving outputs.
        let raw = match self.run_synthesis(diff, language, context, &outputs).await {
            Ok((raw, response_tokens)) => {
                tokens_used += response_tokens;
                raw
            }
            Err(reason) => {
                warn!(%reason, "synthesis failed, falling back to merged analyzer findings");
                failed.push(format!("synthesizer: {reason}"));
                fallback_review(&outputs)
            }
        };

        info!(
            findings = raw.findings.len(),
            failed = failed.len(),
            "review finished"
        );

        Ok(Orchestration {
            raw,
            failed_analyzers: failed,
            tokens_used,
        })
    }

    async fn run_analyzer(
        &self,
        role: AnalyzerRole,
        diff: &str,
        language: &str,
        context: Option<&ReviewContext>,
    ) -> Result<AgentOutput, (AnalyzerRole, String)> {
        let spec = TaskSpec::for_role(role);
        let messages = vec![
            ChatMessage {
                role: Role::System,
                content: spec.system_prompt(),
            },
            ChatMessage {
                role: Role::User,
                content: build_analyzer_prompt(diff, language, context),
            },
        ];

        let report = self
            .backend
            .chat(messages)
            .await
            .map_err(|e| (role, e.to_string()))?;
        let findings = prompt::parse_findings_response(&report).map_err(|e| (role, e))?;
        debug!(%role, findings = findings.len(), "analyzer finished");

        Ok(AgentOutput {
            role,
            report,
            findings,
        })
    }

    async fn run_synthesis(
        &self,
        diff: &str,
        language: &str,
        context: Option<&ReviewContext>,
        outputs: &[AgentOutput],
    ) -> Result<(RawReview, u64), String> {
        let reports: Vec<(AnalyzerRole, String)> = outputs
            .iter()
            .map(|o| (o.role, o.report.clone()))
            .collect();
        let messages = vec![
            ChatMessage {
                role: Role::System,
                content: prompt::synthesis_system_prompt(),
            },
            ChatMessage {
                role: Role::User,
                content: build_synthesis_prompt(diff, language, context, &reports),
            },
        ];

        let response = self
            .backend
            .chat(messages)
            .await
            .map_err(|e| e.to_string())?;
        let raw = prompt::parse_synthesis_response(&response)?;
        Ok((raw, estimate_tokens(&response)))
    }
}

/// Deterministic replacement when synthesis is unavailable: the
/// concatenated analyzer findings with a severity-weighted score.
fn fallback_review(outputs: &[AgentOutput]) -> RawReview {
    let findings: Vec<RawFinding> = outputs
        .iter()
        .flat_map(|o| o.findings.iter().cloned())
        .collect();
    let score = fallback_score(&findings);
    RawReview {
        summary: "Synthesis was unavailable; returning merged analyzer findings.".into(),
        score,
        findings,
    }
}

fn fallback_score(findings: &[RawFinding]) -> f64 {
    let mut score: f64 = 10.0;
    for finding in findings {
        score -= match finding.severity.to_lowercase().as_str() {
            "critical" => 2.5,
            "high" => 1.5,
            "medium" => 0.75,
            _ => 0.25,
        };
    }
    score.clamp(0.0, 10.0)
}
