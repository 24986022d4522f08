use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Candidate;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DiscoveryError {
    /// Source could not produce a candidate list (non-zero exit, timeout,
    /// malformed payload)
    #[error("Discovery unavailable: {0}")]
    Unavailable(String),
}

/// Produces newly listed tokens, in the order the source reports them
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    fn name(&self) -> &str;

    async fn discover(&self) -> Result<Vec<Candidate>, DiscoveryError>;
}
