//! In-memory node store for tests and development
//!
//! Reads are linear scans. Nothing survives a restart.

use super::vote_overflow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listboard_core::{
    ListboardError, Node, NodeId, NodeList, OrderBy, Result, Status, StorageBackend, VoteBump,
};
use tokio::sync::RwLock;

pub struct MemoryStore {
    nodes: RwLock<Vec<Node>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
        }
    }

    async fn find<F>(&self, filter: F, count: usize, offset: usize, order_by: &OrderBy) -> NodeList
    where
        F: Fn(&Node) -> bool,
    {
        let nodes = self.nodes.read().await;
        let mut found: Vec<Node> = nodes
            .iter()
            .filter(|n| n.status == Status::Enabled && filter(n))
            .cloned()
            .collect();
        // Stable, so insertion order breaks ties
        found.sort_by(|a, b| order_by.compare(a, b));
        found.into_iter().skip(offset).take(count).collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn position(nodes: &[Node], domain_id: &str, node_id: &str) -> Option<usize> {
    nodes
        .iter()
        .position(|n| n.domain_id == domain_id && n.id == node_id && n.status == Status::Enabled)
}

#[async_trait]
impl StorageBackend for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get_child_nodes(
        &self,
        domain_id: &str,
        parent_id: &str,
        count: usize,
        offset: usize,
        order_by: &OrderBy,
    ) -> Result<NodeList> {
        Ok(self
            .find(
                |n| n.domain_id == domain_id && n.parent_id == parent_id,
                count,
                offset,
                order_by,
            )
            .await)
    }

    async fn get_all_nodes(
        &self,
        domain_id: &str,
        count: usize,
        offset: usize,
        order_by: &OrderBy,
    ) -> Result<NodeList> {
        Ok(self
            .find(|n| n.domain_id == domain_id, count, offset, order_by)
            .await)
    }

    async fn get_total_child_nodes(&self, domain_id: &str, parent_id: &str) -> Result<usize> {
        let nodes = self.nodes.read().await;
        Ok(nodes
            .iter()
            .filter(|n| {
                n.status == Status::Enabled && n.domain_id == domain_id && n.parent_id == parent_id
            })
            .count())
    }

    async fn get_node(&self, domain_id: &str, node_id: &str) -> Result<Node> {
        let nodes = self.nodes.read().await;
        position(&nodes, domain_id, node_id)
            .map(|i| nodes[i].clone())
            .ok_or_else(|| ListboardError::not_found(domain_id, node_id))
    }

    async fn add_node(&self, node: &Node) -> Result<NodeId> {
        let now = Utc::now();
        let mut stored = node.clone();
        stored.id = uuid::Uuid::new_v4().to_string();
        stored.created = now;
        stored.updated = now;

        let id = stored.id.clone();
        self.nodes.write().await.push(stored);
        Ok(id)
    }

    async fn bump_vote(
        &self,
        domain_id: &str,
        node_id: &str,
        delta: i64,
        updated: DateTime<Utc>,
    ) -> Result<()> {
        self.bump_votes(domain_id, &[VoteBump::new(node_id, delta)], updated)
            .await
    }

    async fn bump_votes(
        &self,
        domain_id: &str,
        bumps: &[VoteBump],
        updated: DateTime<Utc>,
    ) -> Result<()> {
        let mut nodes = self.nodes.write().await;

        // Resolve and range-check every target before touching any of them.
        // A node bumped twice is checked against its running total.
        let mut targets: Vec<(usize, i64)> = Vec::with_capacity(bumps.len());
        for bump in bumps {
            let i = position(&nodes, domain_id, &bump.node_id)
                .ok_or_else(|| ListboardError::not_found(domain_id, &bump.node_id))?;
            let current = targets
                .iter()
                .rev()
                .find(|(j, _)| *j == i)
                .map_or(nodes[i].vote, |(_, vote)| *vote);
            let vote = current
                .checked_add(bump.delta)
                .ok_or_else(|| vote_overflow(domain_id, &bump.node_id, bump.delta))?;
            targets.push((i, vote));
        }

        for (i, vote) in targets {
            nodes[i].vote = vote;
            nodes[i].updated = updated;
        }
        Ok(())
    }

    async fn edit_node(&self, node: &Node) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        let stored = nodes
            .iter_mut()
            .find(|n| {
                n.id == node.id
                    && n.domain_id == node.domain_id
                    && n.tripcode == node.tripcode
                    && n.status == Status::Enabled
            })
            .ok_or_else(|| ListboardError::not_found(&node.domain_id, &node.id))?;

        stored.title = node.title.clone();
        stored.body = node.body.clone();
        stored.rendered = node.rendered.clone();
        stored.updated = node.updated;
        Ok(())
    }

    async fn set_status(&self, domain_id: &str, node_id: &str, status: Status) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        let stored = nodes
            .iter_mut()
            .find(|n| n.domain_id == domain_id && n.id == node_id)
            .ok_or_else(|| ListboardError::not_found(domain_id, node_id))?;

        stored.status = status;
        stored.updated = Utc::now();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
