use std::sync::Arc;
use std::time::{Duration, Instant};

use synod_core::{
    ReviewMetadata, ReviewRequest, ReviewResult, SynodConfig, SynodError,
};
use tracing::info;

use crate::diff;
use crate::guardrails::{self, GuardrailContext};
use crate::llm::ChatBackend;
use crate::orchestrator::{Orchestrator, AGENT_COUNT};

/// The externally callable review entry point.
///
/// Validates and sanitizes the request, drives the orchestrator under the
/// configured deadline, applies the guardrail pipeline, and shapes the
/// final [`ReviewResult`]. Holds no per-request state; one instance serves
/// concurrent reviews.
///
/// Authentication and rate limiting are enforced by the gateway before a
/// request reaches this type.
pub struct ReviewService {
    config: Arc<SynodConfig>,
    orchestrator: Orchestrator,
    deadline: Duration,
}

impl ReviewService {
    /// Create a service from validated configuration and a chat backend.
    pub fn new(config: Arc<SynodConfig>, backend: Arc<dyn ChatBackend>) -> Self {
        let deadline = Duration::from_secs(config.review.request_timeout_seconds);
        Self {
            config,
            orchestrator: Orchestrator::new(backend),
            deadline,
        }
    }

    /// Override the end-to-end deadline.
    ///
    /// The configured `request_timeout_seconds` remains the default; this
    /// exists for one-shot CLI runs and tests that need a shorter leash.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run one code review.
    ///
    /// # Errors
    ///
    /// - [`SynodError::Validation`] — empty diff; rejected before any
    ///   model call.
    /// - [`SynodError::DiffTooLarge`] — diff over the configured limit.
    /// - [`SynodError::Timeout`] — deadline elapsed; all in-flight model
    ///   calls are cancelled and no partial result is returned.
    /// - [`SynodError::Analysis`] — every analyzer task failed.
    pub async fn review(&self, request: ReviewRequest) -> Result<ReviewResult, SynodError> {
        let started = Instant::now();

        if request.diff.trim().is_empty() {
            return Err(SynodError::Validation("diff must not be empty".into()));
        }
        let limit = self.config.review.max_diff_bytes;
        if request.diff.len() > limit {
            return Err(SynodError::DiffTooLarge { limit });
        }

        let sanitized = diff::sanitize(&request.diff);
        let language = request
            .language
            .clone()
            .filter(|l| !l.trim().is_empty())
            .or_else(|| diff::detect_language(&sanitized))
            .unwrap_or_else(|| "unknown".into());

        let orchestration = tokio::time::timeout(
            self.deadline,
            self.orchestrator
                .run(&sanitized, &language, request.context.as_ref()),
        )
        .await
        .map_err(|_| SynodError::Timeout {
            seconds: self.deadline.as_secs(),
        })??;

        let ctx = GuardrailContext {
            diff_files: diff::extract_files(&sanitized),
        };
        let validated = guardrails::apply(
            orchestration.raw,
            &ctx,
            self.config.review.max_findings,
        );

        let result = ReviewResult {
            summary: validated.summary,
            score: validated.score,
            findings: validated.findings,
            metadata: ReviewMetadata {
                execution_time_ms: started.elapsed().as_millis() as u64,
                tokens_used: orchestration.tokens_used,
                agent_count: AGENT_COUNT,
                model: self.orchestrator.model().to_string(),
                guardrails_applied: validated.applied,
                failed_analyzers: orchestration.failed_analyzers,
            },
        };

        info!(
            findings = result.findings.len(),
            score = result.score,
            elapsed_ms = result.metadata.execution_time_ms,
            "review completed"
        );

        Ok(result)
    }
}
