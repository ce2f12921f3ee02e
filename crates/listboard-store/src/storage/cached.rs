//! Caching decorator for any `StorageBackend`
//!
//! Reads are read-through and only successful results are kept. Any
//! successful write clears every table of the written domain; other
//! domains are untouched. Each domain's tables sit behind their own mutex,
//! created atomically on first use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use listboard_core::{
    DomainId, Node, NodeId, NodeList, OrderBy, Result, Status, StorageBackend, VoteBump,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// (parent, count, offset, order)
type ChildKey = (NodeId, usize, usize, OrderBy);

#[derive(Default)]
struct DomainCache {
    /// Bumped on every clear; fills started before a clear are dropped
    generation: u64,
    totals: HashMap<NodeId, usize>,
    nodes: HashMap<NodeId, Node>,
    children: HashMap<ChildKey, NodeList>,
}

impl DomainCache {
    fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.totals.clear();
        self.nodes.clear();
        self.children.clear();
    }
}

pub struct CachedStore {
    inner: Arc<dyn StorageBackend>,
    domains: DashMap<DomainId, Arc<Mutex<DomainCache>>>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner,
            domains: DashMap::new(),
        }
    }

    /// The domain's cache, created if absent
    fn domain(&self, domain_id: &str) -> Arc<Mutex<DomainCache>> {
        if let Some(cache) = self.domains.get(domain_id) {
            return cache.clone();
        }
        self.domains
            .entry(domain_id.to_string())
            .or_default()
            .clone()
    }

    async fn invalidate(&self, domain_id: &str) {
        let cache = self.domain(domain_id);
        cache.lock().await.clear();
        debug!("Cache cleared for domain {}", domain_id);
    }

    async fn read_through<T, F>(
        &self,
        domain_id: &str,
        table: &'static str,
        lookup: impl FnOnce(&DomainCache) -> Option<T> + Send,
        fetch: F,
        fill: impl FnOnce(&mut DomainCache, &T) + Send,
    ) -> Result<T>
    where
        T: Send,
        F: Future<Output = Result<T>> + Send,
    {
        let cache = self.domain(domain_id);

        let generation = {
            let guard = cache.lock().await;
            if let Some(hit) = lookup(&*guard) {
                debug!("Cache hit: {} in domain {}", table, domain_id);
                return Ok(hit);
            }
            debug!("Cache miss: {} in domain {}", table, domain_id);
            guard.generation
        };

        let value = fetch.await?;

        let mut guard = cache.lock().await;
        if guard.generation == generation {
            fill(&mut *guard, &value);
        } else {
            // A write landed while we were reading; the value may predate it
            debug!(
                "Dropping {} fill for domain {}: invalidated during fetch",
                table, domain_id
            );
        }
        Ok(value)
    }
}

#[async_trait]
impl StorageBackend for CachedStore {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn get_child_nodes(
        &self,
        domain_id: &str,
        parent_id: &str,
        count: usize,
        offset: usize,
        order_by: &OrderBy,
    ) -> Result<NodeList> {
        let key: ChildKey = (parent_id.to_string(), count, offset, order_by.clone());
        let lookup_key = key.clone();
        self.read_through(
            domain_id,
            "child nodes",
            move |c| c.children.get(&lookup_key).cloned(),
            self.inner
                .get_child_nodes(domain_id, parent_id, count, offset, order_by),
            move |c, nodes| {
                c.children.insert(key, nodes.clone());
            },
        )
        .await
    }

    async fn get_all_nodes(
        &self,
        domain_id: &str,
        count: usize,
        offset: usize,
        order_by: &OrderBy,
    ) -> Result<NodeList> {
        // Domain-wide feeds are rare and large; not worth caching
        self.inner
            .get_all_nodes(domain_id, count, offset, order_by)
            .await
    }

    async fn get_total_child_nodes(&self, domain_id: &str, parent_id: &str) -> Result<usize> {
        self.read_through(
            domain_id,
            "total",
            |c| c.totals.get(parent_id).copied(),
            self.inner.get_total_child_nodes(domain_id, parent_id),
            |c, total| {
                c.totals.insert(parent_id.to_string(), *total);
            },
        )
        .await
    }

    async fn get_node(&self, domain_id: &str, node_id: &str) -> Result<Node> {
        self.read_through(
            domain_id,
            "node",
            |c| c.nodes.get(node_id).cloned(),
            self.inner.get_node(domain_id, node_id),
            |c, node| {
                c.nodes.insert(node_id.to_string(), node.clone());
            },
        )
        .await
    }

    async fn add_node(&self, node: &Node) -> Result<NodeId> {
        let id = self.inner.add_node(node).await?;
        self.invalidate(&node.domain_id).await;
        Ok(id)
    }

    async fn bump_vote(
        &self,
        domain_id: &str,
        node_id: &str,
        delta: i64,
        updated: DateTime<Utc>,
    ) -> Result<()> {
        self.inner
            .bump_vote(domain_id, node_id, delta, updated)
            .await?;
        self.invalidate(domain_id).await;
        Ok(())
    }

    async fn bump_votes(
        &self,
        domain_id: &str,
        bumps: &[VoteBump],
        updated: DateTime<Utc>,
    ) -> Result<()> {
        self.inner.bump_votes(domain_id, bumps, updated).await?;
        self.invalidate(domain_id).await;
        Ok(())
    }

    async fn edit_node(&self, node: &Node) -> Result<()> {
        self.inner.edit_node(node).await?;
        self.invalidate(&node.domain_id).await;
        Ok(())
    }

    async fn set_status(&self, domain_id: &str, node_id: &str, status: Status) -> Result<()> {
        self.inner.set_status(domain_id, node_id, status).await?;
        self.invalidate(domain_id).await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}
