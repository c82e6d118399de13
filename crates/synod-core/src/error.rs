/// Errors that can occur across the Synod gateway.
///
/// Each variant wraps a specific failure domain. Library crates use this
/// type directly; the binary crate converts to `miette` diagnostics at the
/// boundary, and the gateway crate owns the mapping to HTTP status codes.
///
/// # Examples
///
/// ```
/// use synod_core::SynodError;
///
/// let err = SynodError::Validation("diff must not be empty".into());
/// assert!(err.to_string().contains("diff must not be empty"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SynodError {
    /// Malformed request; rejected before any agent work.
    #[error("validation error: {0}")]
    Validation(String),

    /// Diff exceeds the configured maximum size.
    #[error("diff exceeds maximum size of {limit} bytes")]
    DiffTooLarge {
        /// The configured size limit in bytes.
        limit: usize,
    },

    /// Missing or invalid credential.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Per-credential quota exceeded.
    #[error("rate limit exceeded: maximum {limit} requests per minute")]
    RateLimit {
        /// The configured per-minute limit.
        limit: u32,
    },

    /// Every analyzer task failed; no synthesis was attempted.
    #[error("analysis failed: {0}")]
    Analysis(String),

    /// End-to-end deadline exceeded; in-flight work was cancelled.
    #[error("review timed out after {seconds} seconds")]
    Timeout {
        /// The configured deadline in seconds.
        seconds: u64,
    },

    /// LLM API or response error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
