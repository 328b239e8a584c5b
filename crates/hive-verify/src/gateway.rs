//! Publish boundary.
//!
//! `POST /publish-paper` is never retried: a response lost in transit may
//! still mean the paper went out, and a second attempt would double-publish.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::client::USER_AGENT_VALUE;
use crate::config::GatewayConfig;
use crate::error::{HiveError, HiveResult};
use crate::types::{PublishEnvelope, PublishReceipt};

/// Consumes an envelope and reports the gateway's answer.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, envelope: PublishEnvelope) -> HiveResult<PublishReceipt>;
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> HiveResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| HiveError::Network {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Publisher for GatewayClient {
    async fn publish(&self, envelope: PublishEnvelope) -> HiveResult<PublishReceipt> {
        let url = format!("{}/publish-paper", self.base_url);
        debug!(url = %url, title = %envelope.title(), verified = envelope.is_verified(), "publishing paper");

        let response = self.client.post(&url).json(&envelope).send().await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| HiveError::Network {
            message: format!("failed to read publish response: {}", e),
        })?;

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(PublishReceipt {
                    status: status.as_str().to_string(),
                    extra: Default::default(),
                });
            }
            return serde_json::from_str(&body).map_err(|e| HiveError::InvalidResponse {
                message: format!("failed to parse publish response: {}", e),
            });
        }

        if let Some(message) = moderation_message(status, &body) {
            warn!(status = status.as_u16(), message = %message, "publication blocked by moderation");
            return Err(HiveError::ModerationBlocked { message });
        }

        let message: String = body.chars().take(200).collect();
        Err(HiveError::Gateway {
            status: status.as_u16(),
            message,
        })
    }
}

const MODERATION_FLAGS: [&str; 3] = ["warden", "moderation", "flagged"];

/// A 400/403 whose JSON body carries a truthy moderation flag.
///
/// Returns the human-readable reason from `message`, `reason`, or `error`.
fn moderation_message(status: StatusCode, body: &str) -> Option<String> {
    if status != StatusCode::BAD_REQUEST && status != StatusCode::FORBIDDEN {
        return None;
    }

    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    let flagged = MODERATION_FLAGS.iter().any(|key| match json.get(*key) {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(_) => true,
    });
    if !flagged {
        return None;
    }

    let message = ["message", "reason", "error"]
        .iter()
        .find_map(|key| json.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("rejected by content moderation")
        .to_string();
    Some(message)
}
