//! Verification-and-publish pipeline for hive research agents.
//!
//! An agent hands a [`Paper`] to the [`PipelineOrchestrator`], which:
//!
//! - makes sure the proof-checking backend is reachable (starting its
//!   container if needed) through the [`VerifierProcessManager`]
//! - submits the paper and its extracted claims to the verifier
//! - drives up to three corrections through an agent-supplied
//!   [`CorrectionStrategy`] when the verifier rejects
//! - publishes once: tier-1 with proof metadata, unverified when the backend
//!   is unavailable, or not at all when the paper is discarded
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use hive_verify::{HiveConfig, NoCorrection, Paper, PipelineOrchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = HiveConfig::from_env();
//! let pipeline = PipelineOrchestrator::from_config(&config, Arc::new(NoCorrection))?;
//!
//! let paper = Paper::new("On Sparse Gossip", "# Results\n...", config.author());
//! let run = pipeline.submit(paper, &CancellationToken::new()).await?;
//! println!("{:?} after {} verify calls", run.outcome, run.verify_calls);
//! # Ok(())
//! # }
//! ```
//!
//! Configuration is read from YAML ([`HiveConfig::load`]) or the environment
//! ([`HiveConfig::from_env`]); see the [`config`] module for variables.

pub mod claims;
pub mod client;
pub mod clock;
pub mod config;
pub mod correction;
mod digest;
pub mod error;
pub mod gateway;
pub mod manager;
pub mod pipeline;
pub mod runtime;
pub mod types;

// Re-export main types
pub use claims::extract as extract_claims;
pub use client::{HttpHealthProbe, VerificationClient, Verifier};
pub use clock::{NullSleeper, Sleeper, TokioSleeper};
pub use config::{GatewayConfig, HiveConfig, VerifierConfig};
pub use correction::{
    CorrectionAttempt, CorrectionLoop, CorrectionStrategy, Draft, LoopExit, NoCorrection,
};
pub use digest::local_proof_hash;
pub use error::{HiveError, HiveResult};
pub use gateway::{GatewayClient, Publisher};
pub use manager::{AvailabilityHandle, HealthProbe, VerifierLifecycle, VerifierProcessManager};
pub use pipeline::{
    build_verifier, DiscardReason, PipelineOrchestrator, PipelineOutcome, PipelineRun,
    PipelineState,
};
pub use runtime::{ContainerRuntime, ContainerSpec, DockerRuntime};
pub use types::{
    HashOrigin, Paper, PublishEnvelope, PublishReceipt, Revision, Tier1Envelope,
    UnverifiedEnvelope, VerificationOutcome, VerificationRequest, VerifiedProof,
    VerifierAvailability, MAX_CLAIMS,
};
