use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::Candidate;
use crate::ports::{DiscoveryError, DiscoverySource};

pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(120);

/// Discovery source that executes a command per cycle.
///
/// The command must print a JSON array of
/// `{"blockchain", "ticker", "contractAddress"}` objects on stdout and exit 0.
#[derive(Debug, Clone)]
pub struct ProcessDiscovery {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessDiscovery {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn parse(stdout: &[u8]) -> Result<Vec<Candidate>, DiscoveryError> {
        let text = String::from_utf8_lossy(stdout);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DiscoveryError::Unavailable("scraper produced no output".into()));
        }

        serde_json::from_str(trimmed)
            .map_err(|e| DiscoveryError::Unavailable(format!("malformed scraper output: {}", e)))
    }
}

#[async_trait]
impl DiscoverySource for ProcessDiscovery {
    fn name(&self) -> &str {
        &self.command
    }

    async fn discover(&self) -> Result<Vec<Candidate>, DiscoveryError> {
        let child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DiscoveryError::Unavailable(format!("failed to start {}: {}", self.command, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DiscoveryError::Unavailable(format!("{} timed out after {:?}", self.command, self.timeout)))?
            .map_err(|e| DiscoveryError::Unavailable(format!("{} failed: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DiscoveryError::Unavailable(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let candidates = Self::parse(&output.stdout)?;
        tracing::debug!("{} reported {} candidates", self.command, candidates.len());
        Ok(candidates)
    }
}
