//! Pipeline configuration.
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `HIVE_AGENT_ID` | Agent identifier sent as `agent_id` (default: `hive-agent`) |
//! | `HIVE_AGENT_NAME` | Author name on published papers (default: agent id) |
//! | `HIVE_VERIFIER_URL` | Verifier base URL (default: `http://localhost:5000`) |
//! | `HIVE_VERIFIER_CONTAINER` | Managed container name (default: `hive-verifier`) |
//! | `HIVE_VERIFIER_IMAGE` | Container image to run |
//! | `HIVE_VERIFIER_PORT` | Port published by the container (default: 5000) |
//! | `HIVE_VERIFY_TIMEOUT_MS` | Verification request timeout (default: 60000) |
//! | `HIVE_GATEWAY_URL` | Gateway base URL (default: `http://localhost:3000`) |
//! | `HIVE_GATEWAY_TIMEOUT` | Publish timeout in seconds (default: 30) |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::correction::DEFAULT_MAX_CORRECTIONS;
use crate::error::{HiveError, HiveResult};
use crate::manager::HEALTH_POLL_CEILING;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiveConfig {
    #[serde(default = "default_agent_id")]
    pub agent_id: String,

    /// Author name; falls back to `agent_id`.
    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub verifier: VerifierConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Verifier backend and container lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    #[serde(default = "default_verifier_url")]
    pub url: String,

    #[serde(default = "default_container_name")]
    pub container_name: String,

    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_remove_timeout_ms")]
    pub remove_timeout_ms: u64,

    #[serde(default = "default_start_timeout_ms")]
    pub start_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    #[serde(default = "default_verify_timeout_ms")]
    pub verify_timeout_ms: u64,

    /// Correction attempts after the first rejection.
    #[serde(default = "default_max_corrections")]
    pub max_corrections: u32,

    /// Start the container when the probe fails. When off, an unhealthy
    /// verifier is reported unavailable without touching the runtime.
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
}

/// Publish gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub url: String,

    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

fn default_agent_id() -> String {
    "hive-agent".to_string()
}

fn default_verifier_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_container_name() -> String {
    "hive-verifier".to_string()
}

fn default_image() -> String {
    "p2pclaw/lean-verifier:latest".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

fn default_remove_timeout_ms() -> u64 {
    10_000
}

fn default_start_timeout_ms() -> u64 {
    120_000
}

fn default_auto_start() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_poll_attempts() -> u32 {
    30
}

fn default_verify_timeout_ms() -> u64 {
    60_000
}

fn default_max_corrections() -> u32 {
    3
}

fn default_gateway_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_gateway_timeout() -> u64 {
    30
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            url: default_verifier_url(),
            container_name: default_container_name(),
            image: default_image(),
            port: default_port(),
            probe_timeout_ms: default_probe_timeout_ms(),
            remove_timeout_ms: default_remove_timeout_ms(),
            start_timeout_ms: default_start_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_attempts: default_poll_attempts(),
            verify_timeout_ms: default_verify_timeout_ms(),
            max_corrections: default_max_corrections(),
            auto_start: default_auto_start(),
        }
    }
}

impl VerifierConfig {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("HIVE_VERIFIER_URL").unwrap_or_else(|_| default_verifier_url()),
            container_name: std::env::var("HIVE_VERIFIER_CONTAINER")
                .unwrap_or_else(|_| default_container_name()),
            image: std::env::var("HIVE_VERIFIER_IMAGE").unwrap_or_else(|_| default_image()),
            port: env_parse("HIVE_VERIFIER_PORT").unwrap_or_else(default_port),
            verify_timeout_ms: env_parse("HIVE_VERIFY_TIMEOUT_MS")
                .unwrap_or_else(default_verify_timeout_ms),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn remove_timeout(&self) -> Duration {
        Duration::from_millis(self.remove_timeout_ms)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    /// Reject budgets above the hard ceilings: three corrections and a 60s
    /// health-poll window.
    pub fn validate(&self) -> HiveResult<()> {
        if self.max_corrections > DEFAULT_MAX_CORRECTIONS {
            return Err(HiveError::Config {
                message: format!(
                    "verifier.max_corrections is {}, at most {} allowed",
                    self.max_corrections, DEFAULT_MAX_CORRECTIONS
                ),
            });
        }
        let window = self
            .poll_interval()
            .checked_mul(self.poll_attempts)
            .unwrap_or(Duration::MAX);
        if window > HEALTH_POLL_CEILING {
            return Err(HiveError::Config {
                message: format!(
                    "verifier health polling spans {}ms ({} x {}ms), at most {}ms allowed",
                    window.as_millis(),
                    self.poll_attempts,
                    self.poll_interval_ms,
                    HEALTH_POLL_CEILING.as_millis()
                ),
            });
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            timeout_secs: default_gateway_timeout(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("HIVE_GATEWAY_URL").unwrap_or_else(|_| default_gateway_url()),
            timeout_secs: env_parse("HIVE_GATEWAY_TIMEOUT").unwrap_or_else(default_gateway_timeout),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            agent_id: default_agent_id(),
            author: None,
            verifier: VerifierConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl HiveConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            agent_id: std::env::var("HIVE_AGENT_ID").unwrap_or_else(|_| default_agent_id()),
            author: std::env::var("HIVE_AGENT_NAME").ok(),
            verifier: VerifierConfig::from_env(),
            gateway: GatewayConfig::from_env(),
        }
    }

    /// Load config from a YAML file. Missing keys take their defaults;
    /// budgets above their ceilings are rejected.
    pub fn load(path: &Path) -> HiveResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| HiveError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        let config: Self = serde_yaml::from_str(&text).map_err(|e| HiveError::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
        })?;
        config.verifier.validate()?;
        Ok(config)
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn author(&self) -> &str {
        self.author.as_deref().unwrap_or(&self.agent_id)
    }
}
