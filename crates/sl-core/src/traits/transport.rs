//! Execution transport trait

use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::Candidate;

/// Channel that carries build commands between node and coordinator
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Connect as `node_name` and block until the connection ends.
    ///
    /// `Ok(())` is a clean disconnect; errors are retried by the supervisor.
    async fn connect(&self, candidate: &Candidate, node_name: &str) -> Result<(), TransportError>;
}
