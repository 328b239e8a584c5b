//! Bounded self-correction after a rejection.
//!
//! The rewriting itself belongs to the embedding agent and arrives as a
//! [`CorrectionStrategy`]. The loop only owns the retry discipline.

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::claims;
use crate::client::Verifier;
use crate::error::HiveResult;
use crate::pipeline::{cancellable, PipelineState};
use crate::types::{Revision, VerificationOutcome, VerificationRequest, VerifiedProof, MAX_CLAIMS};

/// Default number of correction attempts after the first rejection.
pub const DEFAULT_MAX_CORRECTIONS: u32 = 3;

/// Agent-supplied rewriting capability.
#[async_trait]
pub trait CorrectionStrategy: Send + Sync {
    /// Propose a revision that addresses `violations`, or `None` when no
    /// revision can be produced. An error is treated like `None`.
    async fn attempt(
        &self,
        title: &str,
        content: &str,
        claims: &[String],
        violations: &[String],
    ) -> anyhow::Result<Option<Revision>>;
}

/// Strategy for agents without a rewriting capability: every rejection is final.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCorrection;

#[async_trait]
impl CorrectionStrategy for NoCorrection {
    async fn attempt(
        &self,
        _title: &str,
        _content: &str,
        _claims: &[String],
        _violations: &[String],
    ) -> anyhow::Result<Option<Revision>> {
        Ok(None)
    }
}

/// The document as it currently stands in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub content: String,
    pub claims: Vec<String>,
}

impl Draft {
    /// Build a draft, deriving claims from the content when none are given.
    pub fn new(title: String, content: String, mut claims: Vec<String>) -> Self {
        if claims.is_empty() {
            claims = claims::extract(&content);
        }
        claims.truncate(MAX_CLAIMS);
        Self {
            title,
            content,
            claims,
        }
    }

    pub fn request(&self, requester_id: &str) -> VerificationRequest {
        VerificationRequest::new(
            self.title.clone(),
            self.content.clone(),
            self.claims.clone(),
            requester_id,
        )
    }
}

impl From<Revision> for Draft {
    fn from(revision: Revision) -> Self {
        Self::new(revision.title, revision.content, revision.claims)
    }
}

/// One iteration of the loop, kept for the run record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionAttempt {
    pub attempt_number: u32,
    pub input_violations: Vec<String>,
    /// `None` means the strategy had no correction to offer.
    pub result: Option<Revision>,
}

/// How the loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    Verified { draft: Draft, proof: VerifiedProof },
    /// Budget spent while still rejected.
    Exhausted { violations: Vec<String> },
    NoCorrection { violations: Vec<String> },
    Unavailable { draft: Draft, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopReport {
    pub exit: LoopExit,
    pub attempts: Vec<CorrectionAttempt>,
    pub verify_calls: u32,
}

pub struct CorrectionLoop {
    strategy: std::sync::Arc<dyn CorrectionStrategy>,
    max_attempts: u32,
}

impl CorrectionLoop {
    pub fn new(strategy: std::sync::Arc<dyn CorrectionStrategy>) -> Self {
        Self {
            strategy,
            max_attempts: DEFAULT_MAX_CORRECTIONS,
        }
    }

    /// Lower the attempt budget. Values above [`DEFAULT_MAX_CORRECTIONS`]
    /// are clamped to it.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        if max_attempts > DEFAULT_MAX_CORRECTIONS {
            warn!(
                requested = max_attempts,
                ceiling = DEFAULT_MAX_CORRECTIONS,
                "correction budget clamped"
            );
        }
        self.max_attempts = max_attempts.min(DEFAULT_MAX_CORRECTIONS);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Drive corrections for a rejected `draft`.
    ///
    /// Each attempt asks the strategy for a revision and, if one comes back,
    /// makes exactly one fresh verification call. At most `max_attempts`
    /// verification calls are made.
    pub async fn run(
        &self,
        verifier: &dyn Verifier,
        requester_id: &str,
        draft: Draft,
        violations: Vec<String>,
        trail: &mut Vec<PipelineState>,
        cancel: &CancellationToken,
    ) -> HiveResult<LoopReport> {
        let mut attempts = Vec::new();
        let mut verify_calls = 0;
        let mut current = draft;
        let mut violations = violations;

        for attempt_number in 1..=self.max_attempts {
            trail.push(PipelineState::Correcting);
            debug!(attempt = attempt_number, violations = violations.len(), "requesting correction");

            let proposed = cancellable(
                cancel,
                self.strategy
                    .attempt(&current.title, &current.content, &current.claims, &violations),
            )
            .await?;
            let revision = match proposed {
                Ok(revision) => revision,
                Err(e) => {
                    warn!(attempt = attempt_number, error = %e, "correction strategy failed");
                    None
                }
            };

            attempts.push(CorrectionAttempt {
                attempt_number,
                input_violations: violations.clone(),
                result: revision.clone(),
            });

            let Some(revision) = revision else {
                info!(attempt = attempt_number, "no correction available");
                return Ok(LoopReport {
                    exit: LoopExit::NoCorrection { violations },
                    attempts,
                    verify_calls,
                });
            };

            current = Draft::from(revision);
            let request = current.request(requester_id);

            trail.push(PipelineState::Verifying);
            verify_calls += 1;
            match cancellable(cancel, verifier.verify(&request)).await? {
                VerificationOutcome::Verified(proof) => {
                    trail.push(PipelineState::Verified);
                    info!(attempt = attempt_number, "revision verified");
                    return Ok(LoopReport {
                        exit: LoopExit::Verified {
                            draft: current,
                            proof,
                        },
                        attempts,
                        verify_calls,
                    });
                }
                VerificationOutcome::Rejected { violations: next } => {
                    trail.push(PipelineState::Rejected);
                    debug!(attempt = attempt_number, violations = next.len(), "revision rejected");
                    violations = next;
                }
                VerificationOutcome::Unavailable { reason } => {
                    trail.push(PipelineState::Unavailable);
                    return Ok(LoopReport {
                        exit: LoopExit::Unavailable {
                            draft: current,
                            reason,
                        },
                        attempts,
                        verify_calls,
                    });
                }
            }
        }

        info!(attempts = self.max_attempts, "correction budget exhausted");
        Ok(LoopReport {
            exit: LoopExit::Exhausted { violations },
            attempts,
            verify_calls,
        })
    }
}
