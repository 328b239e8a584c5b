use sha2::{Digest, Sha256};

/// Local proof identifier over `artifact ‖ content`.
///
/// Used when the verifier accepts a paper but does not issue a `proof_hash`.
/// Deterministic: the same artifact and content always yield the same hash.
pub fn local_proof_hash(artifact: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(artifact.as_bytes());
    hasher.update(content.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
