//! Integration tests for VerificationClient and HttpHealthProbe.
//!
//! Uses wiremock for HTTP mocking. Tests cover outcome mapping for verified,
//! rejected, timed-out, and failed calls, plus health probing.

use std::time::Duration;

use hive_verify::{
    local_proof_hash, AvailabilityHandle, HashOrigin, HealthProbe, HttpHealthProbe,
    VerificationClient, VerificationOutcome, VerificationRequest, VerifierAvailability,
    VerifierConfig,
};
use wiremock::matchers::{body_partial_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(mock_server: &MockServer) -> VerifierConfig {
    VerifierConfig::default()
        .with_url(mock_server.uri())
        .with_verify_timeout(Duration::from_millis(300))
}

fn healthy_client(mock_server: &MockServer) -> VerificationClient {
    VerificationClient::new(
        &config_for(mock_server),
        AvailabilityHandle::fixed(VerifierAvailability::Healthy),
    )
    .expect("failed to create client")
}

fn request() -> VerificationRequest {
    VerificationRequest::new(
        "Sparse gossip converges",
        "# Results\nGossip converges in logarithmic rounds.\n",
        vec!["Gossip converges in logarithmic rounds.".to_string()],
        "agent-7",
    )
}

#[tokio::test]
async fn test_verified_without_hash_gets_local_hash() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .and(header_exists("user-agent"))
        .and(body_partial_json(serde_json::json!({
            "title": "Sparse gossip converges",
            "agent_id": "agent-7",
            "claims": ["Gossip converges in logarithmic rounds."]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "verified": true,
            "lean_proof": "theorem gossip : converges := by simp",
            "occam_score": 0.82
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let req = request();
    let outcome = healthy_client(&mock_server).verify(&req).await;

    match outcome {
        VerificationOutcome::Verified(proof) => {
            assert_eq!(proof.hash_origin, HashOrigin::Local);
            assert_eq!(
                proof.proof_hash,
                local_proof_hash("theorem gossip : converges := by simp", req.content())
            );
            assert_eq!(proof.proof_artifact, "theorem gossip : converges := by simp");
            assert_eq!(proof.quality_score, Some(0.82));
        }
        other => panic!("expected Verified, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_carries_violations() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "verified": false,
            "violations": ["claim 1: no proof found", "claim 1: type mismatch"]
        })))
        .mount(&mock_server)
        .await;

    let outcome = healthy_client(&mock_server).verify(&request()).await;
    assert_eq!(
        outcome,
        VerificationOutcome::Rejected {
            violations: vec![
                "claim 1: no proof found".to_string(),
                "claim 1: type mismatch".to_string()
            ]
        }
    );
}

#[tokio::test]
async fn test_timeout_is_rejection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(serde_json::json!({"verified": true})),
        )
        .mount(&mock_server)
        .await;

    let outcome = healthy_client(&mock_server).verify(&request()).await;
    match outcome {
        VerificationOutcome::Rejected { violations } => {
            assert_eq!(violations, vec!["TIMEOUT: proof search exceeded 300ms"]);
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_verifier_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(500).set_body_string("lean crashed"))
        .mount(&mock_server)
        .await;

    let outcome = healthy_client(&mock_server).verify(&request()).await;
    match outcome {
        VerificationOutcome::Rejected { violations } => {
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0], "VERIFIER_ERROR: HTTP 500: lean crashed");
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_garbage_body_is_verifier_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&mock_server)
        .await;

    let outcome = healthy_client(&mock_server).verify(&request()).await;
    match outcome {
        VerificationOutcome::Rejected { violations } => {
            assert!(violations[0].starts_with("VERIFIER_ERROR: invalid verify response"));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_verifier_error() {
    // Bind and drop a server to get a port nobody listens on.
    let uri = {
        let mock_server = MockServer::start().await;
        mock_server.uri()
    };

    let client = VerificationClient::new(
        &VerifierConfig::default().with_url(uri),
        AvailabilityHandle::fixed(VerifierAvailability::Healthy),
    )
    .unwrap();

    match client.verify(&request()).await {
        VerificationOutcome::Rejected { violations } => {
            assert!(violations[0].starts_with("VERIFIER_ERROR: "));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unavailable_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = VerificationClient::new(
        &config_for(&mock_server),
        AvailabilityHandle::fixed(VerifierAvailability::Starting),
    )
    .unwrap();

    match client.verify(&request()).await {
        VerificationOutcome::Unavailable { reason } => assert_eq!(reason, "verifier is STARTING"),
        other => panic!("expected Unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_health_probe() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let probe = HttpHealthProbe::new(&config_for(&mock_server)).unwrap();
    assert!(probe.is_healthy().await);
    assert!(!probe.is_healthy().await);
}

#[tokio::test]
async fn test_health_probe_respects_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let mut config = config_for(&mock_server);
    config.probe_timeout_ms = 100;
    let probe = HttpHealthProbe::new(&config).unwrap();

    let started = std::time::Instant::now();
    assert!(!probe.is_healthy().await);
    assert!(started.elapsed() < Duration::from_secs(2));
}
