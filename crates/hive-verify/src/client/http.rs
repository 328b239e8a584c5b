//! HTTP layer: status mapping and timeouts for the verifier.
//!
//! This is the ONLY place for status code handling. client/mod.rs never
//! interprets status codes.

use std::time::Duration;

use tracing::{debug, warn};

use crate::types::{VerificationRequest, VerifyResponse};

/// Result of one `POST /verify` call.
#[derive(Debug)]
pub(crate) enum VerifyCall {
    Answered(VerifyResponse),
    TimedOut(Duration),
    Failed(String),
}

/// HTTP backend for the verifier (holds reqwest client and bounds).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) probe_timeout: Duration,
    pub(crate) verify_timeout: Duration,
}

impl HttpBackend {
    /// `GET /health`; true only for a 2xx answer within the probe timeout.
    pub(crate) async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => {
                let ok = response.status().is_success();
                debug!(url = %url, status = response.status().as_u16(), "health probe answered");
                ok
            }
            Err(e) => {
                debug!(url = %url, error = %e, "health probe failed");
                false
            }
        }
    }

    /// Single verification request. Never retried here: the correction loop
    /// owns the retry budget.
    pub(crate) async fn verify(&self, request: &VerificationRequest) -> VerifyCall {
        let url = format!("{}/verify", self.base_url);

        let response = match self
            .client
            .post(&url)
            .timeout(self.verify_timeout)
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return VerifyCall::TimedOut(self.verify_timeout),
            Err(e) => {
                warn!(url = %url, error = %e, "verifier transport error");
                return VerifyCall::Failed(e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            warn!(status = status.as_u16(), "verifier returned error status");
            return VerifyCall::Failed(format!("HTTP {}: {}", status.as_u16(), body));
        }

        match response.json::<VerifyResponse>().await {
            Ok(parsed) => VerifyCall::Answered(parsed),
            Err(e) if e.is_timeout() => VerifyCall::TimedOut(self.verify_timeout),
            Err(e) => VerifyCall::Failed(format!("invalid verify response: {}", e)),
        }
    }
}
