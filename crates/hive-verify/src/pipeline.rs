//! Submit → verify → correct → publish.
//!
//! Every call to [`PipelineOrchestrator::submit`] starts from
//! [`PipelineState::Submitted`] and shares nothing with other runs except the
//! lifecycle manager's availability state.
//!
//! | From | Event | To |
//! |------|-------|----|
//! | any | verifier unavailable | `PublishedUnverified` |
//! | `Verifying` | verified | `PublishedVerified` |
//! | `Rejected` | revision produced | `Verifying` |
//! | `Rejected` | no revision | `Discarded` |
//! | `Rejected` | budget spent | `Discarded` |
//! | publish | moderation block | `Discarded` |
//! | publish | transport/gateway error | `PublishFailed` |

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::{HttpHealthProbe, VerificationClient, Verifier};
use crate::config::HiveConfig;
use crate::correction::{CorrectionAttempt, CorrectionLoop, CorrectionStrategy, Draft, LoopExit};
use crate::error::{HiveError, HiveResult};
use crate::gateway::{GatewayClient, Publisher};
use crate::manager::{VerifierLifecycle, VerifierProcessManager};
use crate::runtime::DockerRuntime;
use crate::types::{
    Paper, PublishEnvelope, PublishReceipt, Tier1Envelope, UnverifiedEnvelope, VerificationOutcome,
    VerifiedProof, TIER1_VERIFIED,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Submitted,
    Verifying,
    Verified,
    Rejected,
    Unavailable,
    Correcting,
    PublishedVerified,
    PublishedUnverified,
    Discarded,
    PublishFailed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::PublishedVerified | Self::PublishedUnverified | Self::Discarded | Self::PublishFailed
        )
    }
}

/// Why a paper was not published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DiscardReason {
    RetriesExhausted { violations: Vec<String> },
    CorrectionUnavailable { violations: Vec<String> },
    ModerationBlocked { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PipelineOutcome {
    PublishedVerified {
        proof: VerifiedProof,
        receipt: PublishReceipt,
    },
    PublishedUnverified {
        receipt: PublishReceipt,
    },
    Discarded {
        #[serde(flatten)]
        reason: DiscardReason,
    },
    /// The gateway could not be reached or answered with an error. Nothing
    /// is known to have been published.
    PublishFailed { message: String },
}

impl PipelineOutcome {
    pub fn is_published(&self) -> bool {
        matches!(
            self,
            Self::PublishedVerified { .. } | Self::PublishedUnverified { .. }
        )
    }
}

/// Record of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRun {
    pub outcome: PipelineOutcome,
    /// Every state visited, in order, ending in a terminal state.
    pub states: Vec<PipelineState>,
    pub verify_calls: u32,
    pub corrections: Vec<CorrectionAttempt>,
}

/// Race `fut` against cancellation.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> HiveResult<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HiveError::Cancelled),
        out = fut => Ok(out),
    }
}

pub struct PipelineOrchestrator {
    lifecycle: Arc<dyn VerifierLifecycle>,
    verifier: Arc<dyn Verifier>,
    publisher: Arc<dyn Publisher>,
    corrections: CorrectionLoop,
    requester_id: String,
}

impl PipelineOrchestrator {
    pub fn new(
        lifecycle: Arc<dyn VerifierLifecycle>,
        verifier: Arc<dyn Verifier>,
        publisher: Arc<dyn Publisher>,
        strategy: Arc<dyn CorrectionStrategy>,
        requester_id: impl Into<String>,
    ) -> Self {
        Self {
            lifecycle,
            verifier,
            publisher,
            corrections: CorrectionLoop::new(strategy),
            requester_id: requester_id.into(),
        }
    }

    /// Wire the HTTP clients, Docker runtime, and lifecycle manager from config.
    pub fn from_config(
        config: &HiveConfig,
        strategy: Arc<dyn CorrectionStrategy>,
    ) -> HiveResult<Self> {
        let (manager, client) = build_verifier(config)?;
        let publisher = GatewayClient::new(&config.gateway)?;

        Ok(Self::new(
            Arc::new(manager),
            Arc::new(client),
            Arc::new(publisher),
            strategy,
            config.agent_id.clone(),
        )
        .with_max_corrections(config.verifier.max_corrections))
    }

    pub fn with_max_corrections(mut self, max: u32) -> Self {
        self.corrections = self.corrections.with_max_attempts(max);
        self
    }

    pub fn lifecycle(&self) -> &Arc<dyn VerifierLifecycle> {
        &self.lifecycle
    }

    pub async fn submit(&self, paper: Paper, cancel: &CancellationToken) -> HiveResult<PipelineRun> {
        let mut states = vec![PipelineState::Submitted];
        let mut verify_calls = 0;
        let mut corrections = Vec::new();

        let author = paper.author;
        let draft = Draft::new(paper.title, paper.content, paper.claims);
        info!(title = %draft.title, claims = draft.claims.len(), "paper submitted");

        let availability = cancellable(cancel, self.lifecycle.ensure_available()).await?;
        let settled = if !availability.is_healthy() {
            states.push(PipelineState::Unavailable);
            warn!(availability = %availability, "verifier unavailable; publishing unverified");
            Settled::Unverified(draft)
        } else {
            states.push(PipelineState::Verifying);
            verify_calls += 1;
            let request = draft.request(&self.requester_id);
            match cancellable(cancel, self.verifier.verify(&request)).await? {
                VerificationOutcome::Verified(proof) => {
                    states.push(PipelineState::Verified);
                    Settled::Verified(draft, proof)
                }
                VerificationOutcome::Unavailable { reason } => {
                    states.push(PipelineState::Unavailable);
                    warn!(reason = %reason, "verifier unavailable; publishing unverified");
                    Settled::Unverified(draft)
                }
                VerificationOutcome::Rejected { violations } => {
                    states.push(PipelineState::Rejected);
                    info!(violations = violations.len(), "paper rejected; entering correction");
                    let report = self
                        .corrections
                        .run(
                            self.verifier.as_ref(),
                            &self.requester_id,
                            draft,
                            violations,
                            &mut states,
                            cancel,
                        )
                        .await?;
                    verify_calls += report.verify_calls;
                    corrections = report.attempts;
                    match report.exit {
                        LoopExit::Verified { draft, proof } => Settled::Verified(draft, proof),
                        LoopExit::Unavailable { draft, reason } => {
                            warn!(reason = %reason, "verifier lost during correction; publishing unverified");
                            Settled::Unverified(draft)
                        }
                        LoopExit::Exhausted { violations } => {
                            Settled::Discarded(DiscardReason::RetriesExhausted { violations })
                        }
                        LoopExit::NoCorrection { violations } => {
                            Settled::Discarded(DiscardReason::CorrectionUnavailable { violations })
                        }
                    }
                }
            }
        };

        let outcome = match settled {
            Settled::Discarded(reason) => PipelineOutcome::Discarded { reason },
            Settled::Unverified(draft) => {
                let envelope = PublishEnvelope::Unverified(UnverifiedEnvelope {
                    title: draft.title,
                    content: draft.content,
                    author,
                });
                self.publish(envelope, None, cancel).await?
            }
            Settled::Verified(draft, proof) => {
                let envelope = PublishEnvelope::Tier1(Tier1Envelope {
                    title: draft.title,
                    content: draft.content,
                    author,
                    requester_id: self.requester_id.clone(),
                    tier: TIER1_VERIFIED,
                    proof_hash: proof.proof_hash.clone(),
                    proof_hash_origin: proof.hash_origin,
                    proof_artifact: proof.proof_artifact.clone(),
                    quality_score: proof.quality_score,
                    claims: draft.claims,
                });
                self.publish(envelope, Some(proof), cancel).await?
            }
        };

        states.push(terminal_state(&outcome));
        info!(
            terminal = ?states.last(),
            verify_calls,
            corrections = corrections.len(),
            "pipeline finished"
        );

        Ok(PipelineRun {
            outcome,
            states,
            verify_calls,
            corrections,
        })
    }

    async fn publish(
        &self,
        envelope: PublishEnvelope,
        proof: Option<VerifiedProof>,
        cancel: &CancellationToken,
    ) -> HiveResult<PipelineOutcome> {
        let result = cancellable(cancel, self.publisher.publish(envelope)).await?;
        Ok(match (result, proof) {
            (Ok(receipt), Some(proof)) => PipelineOutcome::PublishedVerified { proof, receipt },
            (Ok(receipt), None) => PipelineOutcome::PublishedUnverified { receipt },
            (Err(HiveError::ModerationBlocked { message }), _) => PipelineOutcome::Discarded {
                reason: DiscardReason::ModerationBlocked { message },
            },
            (Err(e), _) => {
                warn!(error = %e, "publish failed");
                PipelineOutcome::PublishFailed {
                    message: e.to_string(),
                }
            }
        })
    }
}

/// Where a run stands once verification is over.
enum Settled {
    Verified(Draft, VerifiedProof),
    Unverified(Draft),
    Discarded(DiscardReason),
}

fn terminal_state(outcome: &PipelineOutcome) -> PipelineState {
    match outcome {
        PipelineOutcome::PublishedVerified { .. } => PipelineState::PublishedVerified,
        PipelineOutcome::PublishedUnverified { .. } => PipelineState::PublishedUnverified,
        PipelineOutcome::Discarded { .. } => PipelineState::Discarded,
        PipelineOutcome::PublishFailed { .. } => PipelineState::PublishFailed,
    }
}

/// Lifecycle manager and client sharing one availability state.
pub fn build_verifier(
    config: &HiveConfig,
) -> HiveResult<(VerifierProcessManager, VerificationClient)> {
    let manager = VerifierProcessManager::new(
        &config.verifier,
        Arc::new(HttpHealthProbe::new(&config.verifier)?),
        Arc::new(DockerRuntime::default()),
    );
    let client = VerificationClient::new(&config.verifier, manager.handle())?;
    Ok((manager, client))
}
