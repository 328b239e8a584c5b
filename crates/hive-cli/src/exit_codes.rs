//! Exit codes for the `hive` binary.
//! These codes are part of the public contract; agent supervisors branch on them.

use hive_verify::{DiscardReason, PipelineOutcome};

pub const EXIT_SUCCESS: i32 = 0;
pub const PUBLISH_FAILED: i32 = 1; // Gateway unreachable or answered with an error
pub const CONFIG_ERROR: i32 = 2; // Bad config, unreadable input, internal failure
pub const DISCARDED: i32 = 3; // Verification failed and corrections ran out
pub const MODERATION_BLOCKED: i32 = 4; // Gateway moderation refused the paper
pub const VERIFIER_UNAVAILABLE: i32 = 1; // `hive status` only

pub fn for_outcome(outcome: &PipelineOutcome) -> i32 {
    match outcome {
        PipelineOutcome::PublishedVerified { .. } | PipelineOutcome::PublishedUnverified { .. } => {
            EXIT_SUCCESS
        }
        PipelineOutcome::PublishFailed { .. } => PUBLISH_FAILED,
        PipelineOutcome::Discarded {
            reason: DiscardReason::ModerationBlocked { .. },
        } => MODERATION_BLOCKED,
        PipelineOutcome::Discarded { .. } => DISCARDED,
    }
}
