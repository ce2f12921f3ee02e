//! Behaviour every backend must share, run against each of them and
//! against each wrapped in the read cache.

use chrono::{TimeZone, Utc};
use listboard_core::tripcode::tripcode;
use listboard_core::{
    Level, Node, OrderBy, Status, StorageBackend, VoteBump, ROOT_NODE_ID,
};
use listboard_store::{CachedStore, MemoryStore, Model, PostgresStore, SqliteStore};
use std::sync::Arc;

async fn backends() -> Vec<(&'static str, Arc<dyn StorageBackend>)> {
    let memory: Arc<dyn StorageBackend> = Arc::new(MemoryStore::new());
    let sqlite: Arc<dyn StorageBackend> = Arc::new(SqliteStore::open(":memory:").await.unwrap());
    let cached_memory: Arc<dyn StorageBackend> =
        Arc::new(CachedStore::new(Arc::new(MemoryStore::new())));
    let cached_sqlite: Arc<dyn StorageBackend> = Arc::new(CachedStore::new(Arc::new(
        SqliteStore::open(":memory:").await.unwrap(),
    )));

    let mut all = vec![
        ("memory", memory),
        ("sqlite", sqlite),
        ("cached-memory", cached_memory),
        ("cached-sqlite", cached_sqlite),
    ];

    // LISTBOARD_TEST_PG_DSN=postgres://localhost/listboard_test
    if let Ok(dsn) = std::env::var("LISTBOARD_TEST_PG_DSN") {
        let pg = Arc::new(PostgresStore::open(&dsn).await.unwrap());
        all.push(("postgres", pg.clone() as Arc<dyn StorageBackend>));
        all.push(("cached-postgres", Arc::new(CachedStore::new(pg))));
    }
    all
}

/// Domains are unique per run so a shared PostgreSQL database stays usable
fn fresh_domain() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[tokio::test]
async fn test_added_node_reads_back_unchanged() {
    for (name, db) in backends().await {
        let domain = fresh_domain();
        let mut node = Node::new(&domain, ROOT_NODE_ID, Level::List, "Best editors");
        node.body = "Which one *and* why?".to_string();
        node.rendered = "<p>Which one <em>and</em> why?</p>\n".to_string();
        node.tripcode = tripcode("pw").unwrap();
        node.vote = 3;
        let long_ago = Utc.with_ymd_and_hms(2001, 2, 3, 4, 5, 6).unwrap();
        node.created = long_ago;
        node.updated = long_ago;

        let before = Utc::now();
        let id = db.add_node(&node).await.unwrap();
        assert!(!id.is_empty(), "{name}");

        let stored = db.get_node(&domain, &id).await.unwrap();
        assert_eq!(stored.id, id, "{name}");
        assert_eq!(stored.parent_id, node.parent_id, "{name}");
        assert_eq!(stored.domain_id, node.domain_id, "{name}");
        assert_eq!(stored.title, node.title, "{name}");
        assert_eq!(stored.vote, node.vote, "{name}");
        assert_eq!(stored.tripcode, node.tripcode, "{name}");
        assert_eq!(stored.body, node.body, "{name}");
        assert_eq!(stored.rendered, node.rendered, "{name}");
        assert_eq!(stored.status, Status::Enabled, "{name}");
        assert_eq!(stored.level, Level::List, "{name}");
        // Timestamps are the store's, not the caller's
        assert!(stored.created > long_ago, "{name}");
        assert!(stored.created.timestamp() >= before.timestamp() - 1, "{name}");
        assert!(stored.updated.timestamp() >= before.timestamp() - 1, "{name}");
    }
}

#[tokio::test]
async fn test_domains_are_isolated() {
    for (name, db) in backends().await {
        let (a, b) = (fresh_domain(), fresh_domain());
        let id = db
            .add_node(&Node::new(&a, ROOT_NODE_ID, Level::List, "only in a"))
            .await
            .unwrap();

        assert!(db.get_node(&b, &id).await.unwrap_err().is_not_found(), "{name}");
        assert_eq!(db.get_total_child_nodes(&b, ROOT_NODE_ID).await.unwrap(), 0, "{name}");
        assert!(db
            .get_child_nodes(&b, ROOT_NODE_ID, 10, 0, &OrderBy::default())
            .await
            .unwrap()
            .is_empty());
        assert!(db
            .get_all_nodes(&b, 10, 0, &OrderBy::default())
            .await
            .unwrap()
            .is_empty());
        assert!(db.bump_vote(&b, &id, 1, Utc::now()).await.is_err(), "{name}");
        assert_eq!(db.get_node(&a, &id).await.unwrap().vote, 0, "{name}");
    }
}

#[tokio::test]
async fn test_pages_reassemble_the_full_listing() {
    for (name, db) in backends().await {
        let domain = fresh_domain();
        let list = db
            .add_node(&Node::new(&domain, ROOT_NODE_ID, Level::List, "list"))
            .await
            .unwrap();
        for i in 0..7 {
            let mut item = Node::new(&domain, &list, Level::Item, format!("item {i}"));
            item.vote = i % 3;
            db.add_node(&item).await.unwrap();
        }

        let order = OrderBy::top_voted();
        let total = db.get_total_child_nodes(&domain, &list).await.unwrap();
        assert_eq!(total, 7, "{name}");

        let everything = db
            .get_child_nodes(&domain, &list, total, 0, &order)
            .await
            .unwrap();
        let mut paged = Vec::new();
        for offset in (0..total).step_by(3) {
            let page = db
                .get_child_nodes(&domain, &list, 3, offset, &order)
                .await
                .unwrap();
            assert!(page.len() <= 3, "{name}");
            paged.extend(page);
        }

        let ids = |nodes: &[Node]| nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&paged), ids(&everything), "{name}");
        assert!(
            everything.windows(2).all(|w| w[0].vote >= w[1].vote),
            "{name}: not sorted by vote"
        );
        assert!(db
            .get_child_nodes(&domain, &list, 3, total, &order)
            .await
            .unwrap()
            .is_empty());
    }
}

#[tokio::test]
async fn test_reads_reflect_writes() {
    for (name, db) in backends().await {
        let domain = fresh_domain();
        let list = db
            .add_node(&Node::new(&domain, ROOT_NODE_ID, Level::List, "list"))
            .await
            .unwrap();

        // Prime whatever the backend caches
        assert_eq!(db.get_node(&domain, &list).await.unwrap().vote, 0);
        assert_eq!(db.get_total_child_nodes(&domain, &list).await.unwrap(), 0);
        let roots = db
            .get_child_nodes(&domain, ROOT_NODE_ID, 10, 0, &OrderBy::default())
            .await
            .unwrap();
        assert_eq!(roots.len(), 1, "{name}");

        let item = db
            .add_node(&Node::new(&domain, &list, Level::Item, "item"))
            .await
            .unwrap();
        assert_eq!(db.get_total_child_nodes(&domain, &list).await.unwrap(), 1, "{name}");

        db.bump_vote(&domain, &list, 2, Utc::now()).await.unwrap();
        assert_eq!(db.get_node(&domain, &list).await.unwrap().vote, 2, "{name}");
        let roots = db
            .get_child_nodes(&domain, ROOT_NODE_ID, 10, 0, &OrderBy::default())
            .await
            .unwrap();
        assert_eq!(roots[0].vote, 2, "{name}");

        let mut edit = db.get_node(&domain, &item).await.unwrap();
        edit.title = "renamed".to_string();
        edit.updated = Utc::now();
        db.edit_node(&edit).await.unwrap();
        let children = db
            .get_child_nodes(&domain, &list, 10, 0, &OrderBy::default())
            .await
            .unwrap();
        assert_eq!(children[0].title, "renamed", "{name}");
    }
}

#[tokio::test]
async fn test_bump_votes_applies_all_or_nothing() {
    for (name, db) in backends().await {
        let domain = fresh_domain();
        let list = db
            .add_node(&Node::new(&domain, ROOT_NODE_ID, Level::List, "list"))
            .await
            .unwrap();
        let item = db
            .add_node(&Node::new(&domain, &list, Level::Item, "item"))
            .await
            .unwrap();

        let good = [VoteBump::new(item.clone(), -1), VoteBump::new(list.clone(), 1)];
        db.bump_votes(&domain, &good, Utc::now()).await.unwrap();
        assert_eq!(db.get_node(&domain, &item).await.unwrap().vote, -1, "{name}");
        assert_eq!(db.get_node(&domain, &list).await.unwrap().vote, 1, "{name}");

        let bad = [VoteBump::new(item.clone(), 1), VoteBump::new("424242", 1)];
        assert!(db.bump_votes(&domain, &bad, Utc::now()).await.is_err(), "{name}");
        assert_eq!(db.get_node(&domain, &item).await.unwrap().vote, -1, "{name}");
    }
}

#[tokio::test]
async fn test_disabled_nodes_vanish_from_every_read() {
    for (name, db) in backends().await {
        let domain = fresh_domain();
        let list = db
            .add_node(&Node::new(&domain, ROOT_NODE_ID, Level::List, "list"))
            .await
            .unwrap();
        let item = db
            .add_node(&Node::new(&domain, &list, Level::Item, "spam"))
            .await
            .unwrap();
        assert_eq!(db.get_total_child_nodes(&domain, &list).await.unwrap(), 1);

        db.set_status(&domain, &item, Status::Disabled).await.unwrap();

        assert!(db.get_node(&domain, &item).await.unwrap_err().is_not_found(), "{name}");
        assert_eq!(db.get_total_child_nodes(&domain, &list).await.unwrap(), 0, "{name}");
        let children = db
            .get_child_nodes(&domain, &list, 10, 0, &OrderBy::default())
            .await
            .unwrap();
        assert!(children.is_empty(), "{name}");
        let all = db
            .get_all_nodes(&domain, 10, 0, &OrderBy::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1, "{name}");
    }
}

#[tokio::test]
async fn test_votes_aggregate_through_the_model() {
    for (name, db) in backends().await {
        let model = Model::new(db);
        let domain = fresh_domain();

        let list = model
            .add_node(Node::new(&domain, ROOT_NODE_ID, Level::List, "Pets"))
            .await
            .unwrap();
        let item = model
            .add_node(Node::new(&domain, &list, Level::Item, "Cats"))
            .await
            .unwrap();

        model.vote(&domain, &item, 1).await.unwrap();
        model.vote(&domain, &item, 1).await.unwrap();
        model.vote(&domain, &item, -1).await.unwrap();
        model.vote(&domain, &item, 0).await.unwrap();

        assert_eq!(model.must_get_node(&domain, &item).await.vote, 1, "{name}");
        // One activity tick per vote cast, whatever its sign
        assert_eq!(model.must_get_node(&domain, &list).await.vote, 4, "{name}");

        let mut reply = Node::new(&domain, &item, Level::Reply, "");
        reply.body = "they are great".to_string();
        reply.vote = 1;
        let reply_id = model.add_vote_reply(reply).await.unwrap();

        assert_eq!(model.must_get_node(&domain, &item).await.vote, 2, "{name}");
        assert_eq!(model.must_get_node(&domain, &list).await.vote, 5, "{name}");
        assert_eq!(
            model.must_get_node(&domain, &reply_id).await.rendered,
            "<p>they are great</p>\n",
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_only_the_tripcode_owner_can_edit() {
    for (name, db) in backends().await {
        let model = Model::new(db);
        let domain = fresh_domain();
        let owner = tripcode("owner secret").unwrap();

        let mut list = Node::new(&domain, ROOT_NODE_ID, Level::List, "Original");
        list.tripcode = owner.clone();
        let id = model.add_node(list).await.unwrap();

        let intruder = tripcode("guess").unwrap();
        let err = model
            .edit_node(&domain, &id, "Defaced", "", &intruder)
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{name}");
        assert!(model.edit_node(&domain, &id, "Defaced", "", "").await.is_err());
        assert_eq!(model.must_get_node(&domain, &id).await.title, "Original");

        model
            .edit_node(&domain, &id, "Updated", "**new**", &owner)
            .await
            .unwrap();
        let node = model.must_get_node(&domain, &id).await;
        assert_eq!(node.title, "Updated", "{name}");
        assert_eq!(node.rendered, "<p><strong>new</strong></p>\n", "{name}");
    }
}

#[tokio::test]
async fn test_feed_spans_levels_newest_first() {
    for (name, db) in backends().await {
        let model = Model::new(db);
        let domain = fresh_domain();

        let list = model
            .add_node(Node::new(&domain, ROOT_NODE_ID, Level::List, "first"))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let item = model
            .add_node(Node::new(&domain, &list, Level::Item, "second"))
            .await
            .unwrap();

        let feed = model
            .get_all_nodes(&domain, 10, 0, &OrderBy::newest())
            .await
            .unwrap();
        let ids: Vec<&str> = feed.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![item.as_str(), list.as_str()], "{name}");
    }
}

#[tokio::test]
async fn test_vote_overflow_leaves_node_readable() {
    for (name, db) in backends().await {
        let domain = fresh_domain();
        let mut node = Node::new(&domain, ROOT_NODE_ID, Level::List, "maxed out");
        node.vote = i64::MAX;
        let id = db.add_node(&node).await.unwrap();

        assert!(db.bump_vote(&domain, &id, 1, Utc::now()).await.is_err(), "{name}");
        let stored = db.get_node(&domain, &id).await.unwrap();
        assert_eq!(stored.vote, i64::MAX, "{name}");

        let listing = db
            .get_child_nodes(&domain, ROOT_NODE_ID, 10, 0, &OrderBy::top_voted())
            .await
            .unwrap();
        assert_eq!(listing.len(), 1, "{name}");

        db.bump_vote(&domain, &id, -1, Utc::now()).await.unwrap();
        assert_eq!(db.get_node(&domain, &id).await.unwrap().vote, i64::MAX - 1);
    }
}

#[tokio::test]
async fn test_edit_must_match_id_domain_and_tripcode() {
    for (name, db) in backends().await {
        let domain = fresh_domain();
        let mut node = Node::new(&domain, ROOT_NODE_ID, Level::List, "Original");
        node.tripcode = tripcode("owner").unwrap();
        let id = db.add_node(&node).await.unwrap();
        let other = db
            .add_node(&Node::new(&domain, ROOT_NODE_ID, Level::List, "Neighbour"))
            .await
            .unwrap();

        let mut edit = db.get_node(&domain, &id).await.unwrap();
        edit.title = "Changed".to_string();
        edit.updated = Utc::now();

        let mut foreign_domain = edit.clone();
        foreign_domain.domain_id = fresh_domain();
        assert!(db.edit_node(&foreign_domain).await.unwrap_err().is_not_found(), "{name}");

        let mut missing_id = edit.clone();
        missing_id.id = "987654321".to_string();
        assert!(db.edit_node(&missing_id).await.unwrap_err().is_not_found(), "{name}");

        // Right trip code, someone else's node
        let mut wrong_node = edit.clone();
        wrong_node.id = other.clone();
        assert!(db.edit_node(&wrong_node).await.unwrap_err().is_not_found(), "{name}");

        let mut wrong_trip = edit.clone();
        wrong_trip.tripcode = tripcode("intruder").unwrap();
        assert!(db.edit_node(&wrong_trip).await.unwrap_err().is_not_found(), "{name}");

        assert_eq!(db.get_node(&domain, &id).await.unwrap().title, "Original", "{name}");
        assert_eq!(db.get_node(&domain, &other).await.unwrap().title, "Neighbour", "{name}");

        db.edit_node(&edit).await.unwrap();
        assert_eq!(db.get_node(&domain, &id).await.unwrap().title, "Changed", "{name}");
    }
}
