//! Storage layer
//!
//! Three interchangeable backends behind `StorageBackend`: SQLite
//! (embedded), PostgreSQL (networked) and an in-memory store for tests.
//! Any of them can be wrapped in `CachedStore`.

pub mod cached;
pub mod memory;
pub mod postgres;
pub mod sqlite;

pub use cached::CachedStore;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use listboard_core::{Level, ListboardError, Node, Result, Status, StorageBackend};
use std::sync::Arc;
use tracing::info;

/// Table every SQL backend reads and writes
pub(crate) const NODE_TABLE: &str = "node";

/// Backend selector plus connection string, as supplied by configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: String,
    pub dsn: String,
    pub cache: bool,
}

impl StorageConfig {
    pub fn new(backend: impl Into<String>, dsn: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            dsn: dsn.into(),
            cache: false,
        }
    }

    pub fn cached(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }
}

/// Open, health-check and (optionally) cache-wrap the configured backend
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config.backend.as_str() {
        "sqlite" | "sqlite3" => Arc::new(SqliteStore::open(&config.dsn).await?),
        "postgres" | "postgresql" => Arc::new(PostgresStore::open(&config.dsn).await?),
        "memory" => Arc::new(MemoryStore::new()),
        other => return Err(ListboardError::UnsupportedBackend(other.to_string())),
    };
    backend.ping().await?;

    info!("using database: {} cached: {}", config.backend, config.cache);

    if config.cache {
        Ok(Arc::new(CachedStore::new(backend)))
    } else {
        Ok(backend)
    }
}

// Helper struct for sqlx query_as, shared by both SQL backends
#[derive(sqlx::FromRow)]
pub(crate) struct NodeRow {
    id: String,
    parent_id: String,
    domain_id: String,
    title: String,
    vote: i64,
    tripcode: String,
    body: String,
    rendered: String,
    status: i32,
    level: i32,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl TryFrom<NodeRow> for Node {
    type Error = ListboardError;

    fn try_from(r: NodeRow) -> Result<Self> {
        let level = Level::from_i32(r.level).ok_or_else(|| {
            ListboardError::Persistence(format!("node {} has unknown level {}", r.id, r.level))
        })?;
        let status = Status::from_i32(r.status).ok_or_else(|| {
            ListboardError::Persistence(format!("node {} has unknown status {}", r.id, r.status))
        })?;

        Ok(Node {
            id: r.id,
            parent_id: r.parent_id,
            domain_id: r.domain_id,
            title: r.title,
            vote: r.vote,
            tripcode: r.tripcode,
            body: r.body,
            rendered: r.rendered,
            status,
            level,
            created: r.created,
            updated: r.updated,
        })
    }
}

pub(crate) fn rows_to_nodes(rows: Vec<NodeRow>) -> Result<Vec<Node>> {
    rows.into_iter().map(Node::try_from).collect()
}

/// SQL ids are engine-assigned integers; anything else matches no row
pub(crate) fn row_id(node_id: &str) -> Option<i64> {
    node_id.parse::<i64>().ok().filter(|id| *id > 0)
}

pub(crate) fn db_err(e: sqlx::Error) -> ListboardError {
    ListboardError::Persistence(e.to_string())
}

pub(crate) fn vote_overflow(domain_id: &str, node_id: &str, delta: i64) -> ListboardError {
    ListboardError::Persistence(format!(
        "vote on {}/{} out of range after adding {}",
        domain_id, node_id, delta
    ))
}

pub(crate) fn window(count: usize, offset: usize) -> (i64, i64) {
    (
        i64::try_from(count).unwrap_or(i64::MAX),
        i64::try_from(offset).unwrap_or(i64::MAX),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_id_rejects_non_numeric() {
        assert_eq!(row_id("42"), Some(42));
        assert_eq!(row_id("0"), None);
        assert_eq!(row_id("-3"), None);
        assert_eq!(row_id("7b1c9e4e-0000"), None);
        assert_eq!(row_id("1 OR 1=1"), None);
    }

    #[tokio::test]
    async fn test_open_rejects_unknown_backend() {
        let err = open(&StorageConfig::new("mysql", "x")).await.err().unwrap();
        assert!(matches!(err, ListboardError::UnsupportedBackend(ref b) if b == "mysql"));
    }

    #[tokio::test]
    async fn test_open_memory_with_cache() {
        let store = open(&StorageConfig::new("memory", "").cached(true))
            .await
            .unwrap();
        store.ping().await.unwrap();
        assert_eq!(store.get_total_child_nodes("1", "0").await.unwrap(), 0);
    }
}
