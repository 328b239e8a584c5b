//! Verification client.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::config::VerifierConfig;
use crate::digest::local_proof_hash;
use crate::error::{HiveError, HiveResult};
use crate::manager::{AvailabilityHandle, HealthProbe};
use crate::types::{
    HashOrigin, VerificationOutcome, VerificationRequest, VerifiedProof, VerifyResponse,
};

mod http;

use http::{HttpBackend, VerifyCall};

pub(crate) const USER_AGENT_VALUE: &str = concat!("hive-verify/", env!("CARGO_PKG_VERSION"));

/// Placeholder violation for rejections that arrive without any.
pub const UNSPECIFIED_VIOLATION: &str = "UNVERIFIED: verifier reported no violations";

/// Anything that turns a request into an outcome.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, request: &VerificationRequest) -> VerificationOutcome;
}

/// HTTP client for the verifier's `/verify` endpoint.
#[derive(Debug, Clone)]
pub struct VerificationClient {
    http: HttpBackend,
    availability: AvailabilityHandle,
}

impl VerificationClient {
    pub fn new(config: &VerifierConfig, availability: AvailabilityHandle) -> HiveResult<Self> {
        Ok(Self {
            http: http_backend(config)?,
            availability,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.http.base_url
    }

    /// Submit one request.
    ///
    /// Returns `Unavailable` without touching the network unless the
    /// availability handle reads `Healthy`. Every failure after that point is a
    /// rejection, so the correction loop can act on it.
    pub async fn verify(&self, request: &VerificationRequest) -> VerificationOutcome {
        let availability = self.availability.current();
        if !availability.is_healthy() {
            return VerificationOutcome::Unavailable {
                reason: format!("verifier is {}", availability),
            };
        }

        debug!(
            title = %request.title(),
            claims = request.claims().len(),
            "submitting verification request"
        );

        match self.http.verify(request).await {
            VerifyCall::Answered(response) => outcome_from_response(response, request.content()),
            VerifyCall::TimedOut(after) => VerificationOutcome::Rejected {
                violations: vec![timeout_violation(after)],
            },
            VerifyCall::Failed(detail) => VerificationOutcome::Rejected {
                violations: vec![format!("VERIFIER_ERROR: {}", detail)],
            },
        }
    }
}

#[async_trait]
impl Verifier for VerificationClient {
    async fn verify(&self, request: &VerificationRequest) -> VerificationOutcome {
        VerificationClient::verify(self, request).await
    }
}

/// `GET /health` probe for the lifecycle manager.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    http: HttpBackend,
}

impl HttpHealthProbe {
    pub fn new(config: &VerifierConfig) -> HiveResult<Self> {
        Ok(Self {
            http: http_backend(config)?,
        })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn is_healthy(&self) -> bool {
        self.http.health().await
    }
}

fn http_backend(config: &VerifierConfig) -> HiveResult<HttpBackend> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

    let client = reqwest::Client::builder()
        .default_headers(default_headers)
        .build()
        .map_err(|e| HiveError::Network {
            message: format!("failed to create HTTP client: {}", e),
        })?;

    Ok(HttpBackend {
        client,
        base_url: config.base_url().to_string(),
        probe_timeout: config.probe_timeout(),
        verify_timeout: config.verify_timeout(),
    })
}

fn timeout_violation(after: Duration) -> String {
    if after.subsec_millis() == 0 {
        format!("TIMEOUT: proof search exceeded {}s", after.as_secs())
    } else {
        format!("TIMEOUT: proof search exceeded {}ms", after.as_millis())
    }
}

/// Map a decoded `/verify` body to an outcome.
///
/// `verified: null` counts as a rejection. A verified body without a usable
/// `proof_hash` gets a local one over artifact and content.
pub(crate) fn outcome_from_response(response: VerifyResponse, content: &str) -> VerificationOutcome {
    if response.verified != Some(true) {
        let violations = response
            .violations
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| vec![UNSPECIFIED_VIOLATION.to_string()]);
        return VerificationOutcome::Rejected { violations };
    }

    let proof_artifact = response.lean_proof.unwrap_or_default();
    let (proof_hash, hash_origin) = match response.proof_hash {
        Some(hash) if !hash.trim().is_empty() => (hash, HashOrigin::Backend),
        _ => (
            local_proof_hash(&proof_artifact, content),
            HashOrigin::Local,
        ),
    };

    VerificationOutcome::Verified(VerifiedProof {
        proof_hash,
        proof_artifact,
        quality_score: response.occam_score,
        hash_origin,
    })
}
