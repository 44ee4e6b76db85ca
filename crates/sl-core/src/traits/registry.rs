//! Coordinator-side node registry trait

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::ProtocolError;
use crate::types::{Candidate, LabelSet, NodeMode};

/// Everything the coordinator needs to create a node
#[derive(Debug, Clone, Default)]
pub struct NodeRegistration {
    /// Requested node name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Executor count
    pub executors: u32,
    /// Remote filesystem root
    pub fs_root: String,
    /// Labels to attach
    pub labels: LabelSet,
    /// Tool name to installation path
    pub tool_locations: BTreeMap<String, String>,
    /// Scheduling mode
    pub mode: NodeMode,
    /// Machine identity hash, if enabled
    pub hash: Option<String>,
    /// Replace an existing node of the same name
    pub delete_existing_clients: bool,
}

/// Node registration and label mutation calls
#[async_trait]
pub trait NodeRegistrar: Send + Sync {
    /// Create the node and return the name the coordinator settled on
    async fn create_node(
        &self,
        candidate: &Candidate,
        registration: &NodeRegistration,
    ) -> Result<String, ProtocolError>;

    /// Labels the coordinator currently holds for `name`
    async fn get_labels(&self, candidate: &Candidate, name: &str)
        -> Result<LabelSet, ProtocolError>;

    /// Attach labels to the node
    async fn add_labels(
        &self,
        candidate: &Candidate,
        name: &str,
        labels: &LabelSet,
    ) -> Result<(), ProtocolError>;

    /// Detach labels from the node
    async fn remove_labels(
        &self,
        candidate: &Candidate,
        name: &str,
        labels: &LabelSet,
    ) -> Result<(), ProtocolError>;
}
