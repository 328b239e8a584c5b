//! Container runtime boundary.
//!
//! The verifier ships as a container image. The manager only needs three
//! operations from the runtime: a presence probe, remove-by-name, and
//! run-detached. Every call carries an explicit timeout and child processes
//! are killed if the waiting future is dropped.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::VerifierConfig;
use crate::error::{HiveError, HiveResult};

/// What to run for the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub port: u16,
    pub restart_policy: String,
}

impl ContainerSpec {
    pub fn from_config(config: &VerifierConfig) -> Self {
        Self {
            name: config.container_name.clone(),
            image: config.image.clone(),
            port: config.port,
            restart_policy: "unless-stopped".to_string(),
        }
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Presence probe. `Err(RuntimeMissing)` when the runtime is not usable.
    async fn version(&self) -> HiveResult<String>;

    /// Remove a container by name. Succeeds when nothing by that name exists.
    async fn remove(&self, name: &str, timeout: Duration) -> HiveResult<()>;

    /// Start a detached container.
    async fn run_detached(&self, spec: &ContainerSpec, timeout: Duration) -> HiveResult<()>;
}

/// Docker CLI implementation.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    program: String,
    probe_timeout: Duration,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl DockerRuntime {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            probe_timeout: Duration::from_secs(10),
        }
    }

    async fn exec(&self, args: &[&str], timeout: Duration) -> HiveResult<CommandOutput> {
        let command = format!("{} {}", self.program, args.join(" "));
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        debug!(command = %command, timeout_ms, "running container command");

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    HiveError::RuntimeMissing {
                        message: format!("`{}` not found on PATH", self.program),
                    }
                } else {
                    HiveError::Runtime {
                        command: command.clone(),
                        message: format!("failed to spawn: {}", e),
                    }
                }
            })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| HiveError::Timeout {
                operation: command.clone(),
                timeout_ms,
            })?
            .map_err(|e| HiveError::Runtime {
                command: command.clone(),
                message: e.to_string(),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn version(&self) -> HiveResult<String> {
        let out = self
            .exec(&["version", "--format", "{{.Server.Version}}"], self.probe_timeout)
            .await
            .map_err(|e| match e {
                HiveError::RuntimeMissing { message } => HiveError::RuntimeMissing { message },
                other => HiveError::RuntimeMissing {
                    message: other.to_string(),
                },
            })?;

        if out.success {
            Ok(out.stdout)
        } else {
            Err(HiveError::RuntimeMissing {
                message: out.stderr,
            })
        }
    }

    async fn remove(&self, name: &str, timeout: Duration) -> HiveResult<()> {
        let out = self.exec(&["rm", "-f", name], timeout).await?;
        if out.success || is_not_found(&out.stderr) {
            Ok(())
        } else {
            Err(HiveError::Runtime {
                command: format!("{} rm -f {}", self.program, name),
                message: out.stderr,
            })
        }
    }

    async fn run_detached(&self, spec: &ContainerSpec, timeout: Duration) -> HiveResult<()> {
        let args = run_args(spec);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.exec(&args, timeout).await?;
        if out.success {
            debug!(container_id = %out.stdout, "container started");
            Ok(())
        } else {
            Err(HiveError::Runtime {
                command: format!("{} run {}", self.program, spec.name),
                message: out.stderr,
            })
        }
    }
}

fn run_args(spec: &ContainerSpec) -> Vec<String> {
    vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--restart".to_string(),
        spec.restart_policy.clone(),
        "-p".to_string(),
        format!("{0}:{0}", spec.port),
        spec.image.clone(),
    ]
}

fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("no such container") || lower.contains("not found")
}
