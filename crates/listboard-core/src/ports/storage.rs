//! Storage trait for node persistence

use crate::order::OrderBy;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listboard_types::{Node, NodeId, NodeList, Status};

/// One signed vote adjustment, applied as `vote = vote + delta`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteBump {
    pub node_id: NodeId,
    pub delta: i64,
}

impl VoteBump {
    pub fn new(node_id: impl Into<NodeId>, delta: i64) -> Self {
        Self {
            node_id: node_id.into(),
            delta,
        }
    }
}

/// Node store
///
/// Implemented by every backend and by the caching decorator. Reads only
/// ever see enabled nodes of the requested domain.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Health check against the underlying engine
    async fn ping(&self) -> Result<()>;

    async fn get_child_nodes(
        &self,
        domain_id: &str,
        parent_id: &str,
        count: usize,
        offset: usize,
        order_by: &OrderBy,
    ) -> Result<NodeList>;

    /// Domain-wide feed
    async fn get_all_nodes(
        &self,
        domain_id: &str,
        count: usize,
        offset: usize,
        order_by: &OrderBy,
    ) -> Result<NodeList>;

    async fn get_total_child_nodes(&self, domain_id: &str, parent_id: &str) -> Result<usize>;

    async fn get_node(&self, domain_id: &str, node_id: &str) -> Result<Node>;

    /// Persist a new node; the store assigns `id`, `created` and `updated`
    async fn add_node(&self, node: &Node) -> Result<NodeId>;

    async fn bump_vote(
        &self,
        domain_id: &str,
        node_id: &str,
        delta: i64,
        updated: DateTime<Utc>,
    ) -> Result<()>;

    /// Apply several bumps atomically: all land or none do
    async fn bump_votes(
        &self,
        domain_id: &str,
        bumps: &[VoteBump],
        updated: DateTime<Utc>,
    ) -> Result<()>;

    /// Update title, body, rendered and updated where id, domain and
    /// tripcode all match. No match is `NotFound`.
    async fn edit_node(&self, node: &Node) -> Result<()>;

    /// Soft-delete transition; matches regardless of current status
    async fn set_status(&self, domain_id: &str, node_id: &str, status: Status) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
