//! Model façade used by the presentation layer
//!
//! Reads come in two flavours: a `Result`-returning one, and a `must_`
//! variant that panics on any storage error. Handlers with no sane degraded
//! response use the latter and rely on the request layer to isolate the
//! panic. Writes always return `Result` and enforce the invariants storage
//! does not: parent/child domain match, level progression, and `rendered`
//! being derived from `body`.

use chrono::Utc;
use listboard_core::render::render_markdown;
use listboard_core::{
    Level, ListboardError, Node, NodeId, NodeList, OrderBy, Result, Status, StorageBackend,
    VoteBump,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct Model {
    db: Arc<dyn StorageBackend>,
}

impl Model {
    pub fn new(db: Arc<dyn StorageBackend>) -> Self {
        Self { db }
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.db
    }

    pub async fn get_child_nodes(
        &self,
        domain_id: &str,
        parent_id: &str,
        count: usize,
        offset: usize,
        order_by: &OrderBy,
    ) -> Result<NodeList> {
        self.db
            .get_child_nodes(domain_id, parent_id, count, offset, order_by)
            .await
    }

    pub async fn must_get_child_nodes(
        &self,
        domain_id: &str,
        parent_id: &str,
        count: usize,
        offset: usize,
        order_by: &OrderBy,
    ) -> NodeList {
        match self
            .get_child_nodes(domain_id, parent_id, count, offset, order_by)
            .await
        {
            Ok(nodes) => nodes,
            Err(e) => panic!("get_child_nodes({domain_id}, {parent_id}) failed: {e}"),
        }
    }

    pub async fn get_all_nodes(
        &self,
        domain_id: &str,
        count: usize,
        offset: usize,
        order_by: &OrderBy,
    ) -> Result<NodeList> {
        self.db
            .get_all_nodes(domain_id, count, offset, order_by)
            .await
    }

    pub async fn must_get_all_nodes(
        &self,
        domain_id: &str,
        count: usize,
        offset: usize,
        order_by: &OrderBy,
    ) -> NodeList {
        match self.get_all_nodes(domain_id, count, offset, order_by).await {
            Ok(nodes) => nodes,
            Err(e) => panic!("get_all_nodes({domain_id}) failed: {e}"),
        }
    }

    pub async fn get_total(&self, domain_id: &str, parent_id: &str) -> Result<usize> {
        self.db.get_total_child_nodes(domain_id, parent_id).await
    }

    pub async fn must_get_total(&self, domain_id: &str, parent_id: &str) -> usize {
        match self.get_total(domain_id, parent_id).await {
            Ok(total) => total,
            Err(e) => panic!("get_total({domain_id}, {parent_id}) failed: {e}"),
        }
    }

    pub async fn get_node(&self, domain_id: &str, node_id: &str) -> Result<Node> {
        self.db.get_node(domain_id, node_id).await
    }

    pub async fn must_get_node(&self, domain_id: &str, node_id: &str) -> Node {
        match self.get_node(domain_id, node_id).await {
            Ok(node) => node,
            Err(e) => panic!("get_node({domain_id}, {node_id}) failed: {e}"),
        }
    }

    /// Validate and persist a new node.
    ///
    /// `rendered` is recomputed from `body` and `status` forced to enabled.
    /// A non-root parent must exist in the same domain, and the node's level
    /// must be exactly one below it.
    pub async fn add_node(&self, mut node: Node) -> Result<NodeId> {
        node.rendered = render_markdown(&node.body);
        node.status = Status::Enabled;

        let expected = if node.is_root_child() {
            Level::List
        } else {
            // Lookup is domain-scoped, so a foreign parent is NotFound
            let parent = self.db.get_node(&node.domain_id, &node.parent_id).await?;
            parent.level.child().ok_or_else(|| {
                ListboardError::InvalidNode(format!("{} nodes take no children", parent.level))
            })?
        };
        if node.level != expected {
            return Err(ListboardError::InvalidNode(format!(
                "expected a {} under parent {}, got a {}",
                expected, node.parent_id, node.level
            )));
        }

        self.db.add_node(&node).await
    }

    /// Replace title and body of a node the caller proves to own
    pub async fn edit_node(
        &self,
        domain_id: &str,
        node_id: &str,
        title: &str,
        body: &str,
        tripcode: &str,
    ) -> Result<()> {
        if tripcode.is_empty() {
            return Err(ListboardError::InvalidNode(
                "anonymous posts cannot be edited".to_string(),
            ));
        }

        let mut node = self.db.get_node(domain_id, node_id).await?;
        node.title = title.to_string();
        node.body = body.to_string();
        node.rendered = render_markdown(body);
        node.tripcode = tripcode.to_string();
        node.updated = Utc::now();

        self.db.edit_node(&node).await
    }

    /// Cast `delta` on an item: the item's tally moves by `delta` and its
    /// list's activity counter by one, in a single atomic write.
    pub async fn vote(&self, domain_id: &str, item_id: &str, delta: i64) -> Result<()> {
        check_delta(delta)?;

        let item = self.db.get_node(domain_id, item_id).await?;
        if item.level != Level::Item {
            return Err(ListboardError::InvalidNode(format!(
                "votes target items, {} is a {}",
                item.id, item.level
            )));
        }

        let bumps = [
            VoteBump::new(item.id.clone(), delta),
            VoteBump::new(item.parent_id.clone(), 1),
        ];
        self.db.bump_votes(domain_id, &bumps, Utc::now()).await
    }

    /// Store a vote reply under its item and cast the vote it carries.
    ///
    /// If the vote cannot be applied the reply is disabled again, so no
    /// visible reply exists without its counted vote.
    pub async fn add_vote_reply(&self, reply: Node) -> Result<NodeId> {
        if reply.level != Level::Reply {
            return Err(ListboardError::InvalidNode(format!(
                "vote replies are {} nodes, got {}",
                Level::Reply,
                reply.level
            )));
        }

        let domain_id = reply.domain_id.clone();
        let item_id = reply.parent_id.clone();
        let delta = reply.vote;
        check_delta(delta)?;

        let reply_id = self.add_node(reply).await?;
        if let Err(e) = self.vote(&domain_id, &item_id, delta).await {
            warn!(
                "Vote on {}/{} failed, withdrawing reply {}: {}",
                domain_id, item_id, reply_id, e
            );
            if let Err(undo) = self
                .db
                .set_status(&domain_id, &reply_id, Status::Disabled)
                .await
            {
                error!(
                    "Could not withdraw reply {}/{} after failed vote: {}",
                    domain_id, reply_id, undo
                );
            }
            return Err(e);
        }

        Ok(reply_id)
    }

    pub async fn hide_node(&self, domain_id: &str, node_id: &str) -> Result<()> {
        self.db
            .set_status(domain_id, node_id, Status::Disabled)
            .await?;
        info!("Node {}/{} hidden", domain_id, node_id);
        Ok(())
    }
}

fn check_delta(delta: i64) -> Result<()> {
    if !(-1..=1).contains(&delta) {
        return Err(ListboardError::InvalidNode(format!(
            "vote must be -1, 0 or 1, got {}",
            delta
        )));
    }
    Ok(())
}
