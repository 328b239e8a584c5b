//! Error types for the verification pipeline.

/// Pipeline errors.
///
/// Verification failures never surface here: the client folds them into
/// [`VerificationOutcome`](crate::types::VerificationOutcome). These are the
/// failures of the surrounding boundaries (runtime, gateway, config).
#[derive(Debug, thiserror::Error)]
pub enum HiveError {
    /// The container runtime is not installed or not answering.
    #[error("container runtime unavailable: {message}")]
    RuntimeMissing { message: String },

    /// A container runtime command exited non-zero or could not be spawned.
    #[error("container command `{command}` failed: {message}")]
    Runtime { command: String, message: String },

    /// A bounded wait expired.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The gateway refused the paper for content-policy reasons.
    #[error("publication blocked by moderation: {message}")]
    ModerationBlocked { message: String },

    /// The gateway answered with a non-success status.
    #[error("gateway returned HTTP {status}: {message}")]
    Gateway { status: u16, message: String },

    /// Network error.
    #[error("network error: {message}")]
    Network { message: String },

    /// Invalid response body.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The caller cancelled the run.
    #[error("pipeline cancelled")]
    Cancelled,
}

impl HiveError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::RuntimeMissing { .. } | Self::Runtime { .. } => 2,

            Self::ModerationBlocked { .. } => 4,

            Self::Timeout { .. }
            | Self::Gateway { .. }
            | Self::Network { .. }
            | Self::InvalidResponse { .. } => 1,

            Self::Cancelled => 130,
        }
    }

    /// Whether the error is transient.
    ///
    /// The pipeline never retries a publish; this only informs callers that
    /// decide to resubmit a whole run later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Gateway { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_moderation_block(&self) -> bool {
        matches!(self, Self::ModerationBlocked { .. })
    }
}

impl From<reqwest::Error> for HiveError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for pipeline operations.
pub type HiveResult<T> = Result<T, HiveError>;
