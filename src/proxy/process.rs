//! Proxy process control: dry-run validation and graceful reload.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::schema::ProxyConfig;

/// Errors raised by proxy commands.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("failed to prepare candidate configuration: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("failed to run {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("'{command}' exited with {status}\n{output}")]
    Failed {
        command: String,
        status: String,
        output: String,
    },
}

/// The running proxy process as seen by the orchestrator.
#[async_trait]
pub trait ProxyProcess: Send + Sync {
    /// Syntax-check a candidate artifact without touching the live process.
    async fn test(&self, content: &str) -> Result<(), ProxyError>;

    /// Ask the proxy to gracefully reload its configuration.
    async fn reload(&self) -> Result<(), ProxyError>;
}

/// Controls an nginx-compatible binary through its command-line interface.
#[derive(Debug, Clone)]
pub struct NginxProcess {
    binary: PathBuf,
    timeout: Duration,
}

impl NginxProcess {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(&config.binary, Duration::from_secs(config.command_timeout_secs))
    }

    async fn run(&self, args: &[&str]) -> Result<(), ProxyError> {
        let command = format!("{} {}", self.binary.display(), args.join(" "));
        tracing::debug!(command = %command, "Running proxy command");

        let child = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = match timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(ProxyError::Spawn {
                    binary: self.binary.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ProxyError::Timeout {
                    command,
                    secs: self.timeout.as_secs(),
                })
            }
        };

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(ProxyError::Failed {
            command,
            status: output.status.to_string(),
            output: combined,
        })
    }
}

#[async_trait]
impl ProxyProcess for NginxProcess {
    async fn test(&self, content: &str) -> Result<(), ProxyError> {
        let mut candidate = tempfile::Builder::new()
            .prefix("candidate-nginx-cfg")
            .tempfile()
            .map_err(ProxyError::TempFile)?;
        candidate
            .write_all(content.as_bytes())
            .and_then(|_| candidate.flush())
            .map_err(ProxyError::TempFile)?;

        let path = path_arg(candidate.path());
        self.run(&["-c", &path, "-t"]).await
    }

    async fn reload(&self) -> Result<(), ProxyError> {
        self.run(&["-s", "reload"]).await
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
