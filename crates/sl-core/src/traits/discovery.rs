//! Coordinator discovery trait

use async_trait::async_trait;

use crate::error::ProtocolError;
use crate::types::Candidate;

/// Finds a coordinator to register with
#[async_trait]
pub trait CoordinatorDiscovery: Send + Sync {
    /// Locate one coordinator candidate
    async fn discover(&self) -> Result<Candidate, ProtocolError>;

    /// Check that the candidate really is a coordinator we can talk to
    async fn verify(&self, candidate: &Candidate) -> Result<(), ProtocolError>;
}
