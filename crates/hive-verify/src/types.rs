//! Domain and wire types for the verifier and gateway protocols.

use serde::{Deserialize, Serialize};

/// Maximum number of claims handed to the verifier per request.
pub const MAX_CLAIMS: usize = 10;

/// Availability of the verification backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerifierAvailability {
    Unknown,
    Starting,
    Healthy,
    Unavailable,
}

impl VerifierAvailability {
    pub fn is_healthy(self) -> bool {
        self == Self::Healthy
    }
}

impl std::fmt::Display for VerifierAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::Starting => "STARTING",
            Self::Healthy => "HEALTHY",
            Self::Unavailable => "UNAVAILABLE",
        };
        f.write_str(s)
    }
}

/// A paper submitted to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub content: String,
    pub author: String,

    /// Claims chosen by the agent. Empty means "extract from content".
    #[serde(default)]
    pub claims: Vec<String>,
}

impl Paper {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            author: author.into(),
            claims: Vec::new(),
        }
    }

    pub fn with_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.claims = claims.into_iter().map(Into::into).collect();
        self
    }
}

/// A revised draft produced by a correction strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub title: String,
    pub content: String,

    /// Empty means "re-derive claims from the revised content".
    #[serde(default)]
    pub claims: Vec<String>,
}

/// One verification request. Immutable once built; claims are capped at
/// [`MAX_CLAIMS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationRequest {
    title: String,
    content: String,
    claims: Vec<String>,
    #[serde(rename = "agent_id")]
    requester_id: String,
}

impl VerificationRequest {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        mut claims: Vec<String>,
        requester_id: impl Into<String>,
    ) -> Self {
        claims.truncate(MAX_CLAIMS);
        Self {
            title: title.into(),
            content: content.into(),
            claims,
            requester_id: requester_id.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn claims(&self) -> &[String] {
        &self.claims
    }

    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }
}

/// Where a proof hash came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashOrigin {
    /// Issued by the verifier in its response.
    Backend,
    /// Computed locally because the verifier omitted it.
    Local,
}

/// Proof material attached to a verified paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedProof {
    pub proof_hash: String,
    pub proof_artifact: String,
    pub quality_score: Option<f64>,
    pub hash_origin: HashOrigin,
}

/// Result of one verification request.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Verified(VerifiedProof),
    Rejected { violations: Vec<String> },
    Unavailable { reason: String },
}

/// Response body of `POST /verify`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub verified: Option<bool>,

    #[serde(default)]
    pub proof_hash: Option<String>,

    /// Proof artifact emitted by the prover.
    #[serde(default)]
    pub lean_proof: Option<String>,

    #[serde(default)]
    pub occam_score: Option<f64>,

    #[serde(default)]
    pub violations: Option<Vec<String>>,
}

/// Envelope for papers published without proof metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnverifiedEnvelope {
    pub title: String,
    pub content: String,
    pub author: String,
}

/// Envelope for tier-1 verified papers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tier1Envelope {
    pub title: String,
    pub content: String,
    pub author: String,
    #[serde(rename = "agent_id")]
    pub requester_id: String,
    pub tier: &'static str,
    pub proof_hash: String,
    pub proof_hash_origin: HashOrigin,
    #[serde(rename = "lean_proof")]
    pub proof_artifact: String,
    #[serde(rename = "occam_score")]
    pub quality_score: Option<f64>,
    pub claims: Vec<String>,
}

/// Tier marker carried by verified envelopes.
pub const TIER1_VERIFIED: &str = "TIER1_VERIFIED";

/// Payload handed to the publish boundary. Built once per run and moved into
/// the publisher, so a run cannot publish twice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PublishEnvelope {
    Unverified(UnverifiedEnvelope),
    Tier1(Tier1Envelope),
}

impl PublishEnvelope {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Tier1(_))
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Unverified(e) => &e.title,
            Self::Tier1(e) => &e.title,
        }
    }
}

/// Gateway acknowledgement of a publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    #[serde(default)]
    pub status: String,

    /// Remaining response fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
