//! SQLite database layer (embedded, no external dependencies)

use super::{db_err, row_id, rows_to_nodes, vote_overflow, window, NodeRow, NODE_TABLE};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listboard_core::{
    ListboardError, Node, NodeId, NodeList, OrderBy, Result, Status, StorageBackend, VoteBump,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};

const SELECT_COLUMNS: &str = "CAST(id AS TEXT) AS id, parent_id, domain_id, title, vote, \
     tripcode, body, rendered, status, level, created, updated";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open a file path, a `sqlite:` URL, or `:memory:`
    pub async fn open(dsn: &str) -> Result<Self> {
        info!("Opening SQLite database at: {}", dsn);

        let in_memory = matches!(dsn, ":memory:" | "sqlite::memory:");
        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(connect_err)?
        } else if dsn.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(dsn)
                .map_err(connect_err)?
                .journal_mode(SqliteJournalMode::Wal)
        } else {
            ensure_parent_dir(dsn).await?;
            SqliteConnectOptions::new()
                .filename(dsn)
                .journal_mode(SqliteJournalMode::Wal)
        }
        .create_if_missing(true)
        .synchronous(SqliteSynchronous::Normal);

        // Every connection to :memory: is its own database, so pin one
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(connect_err)?;

        info!("SQLite connection established, running migrations...");
        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS node (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                parent_id TEXT NOT NULL,
                domain_id TEXT NOT NULL,
                title TEXT NOT NULL,
                vote INTEGER NOT NULL DEFAULT 0,
                tripcode TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                rendered TEXT NOT NULL DEFAULT '',
                status INTEGER NOT NULL DEFAULT 1,
                level INTEGER NOT NULL DEFAULT 0,
                created TEXT NOT NULL,
                updated TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS node_domain_parent
            ON node (domain_id, parent_id, status)
            "#,
        )
        .execute(pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for SqliteStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(connect_err)?;
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
        let (limit, offset) = window(count, offset);
        let sql = format!(
            "SELECT {} FROM node WHERE domain_id = ?1 AND status = ?2 AND parent_id = ?3 \
             ORDER BY {} LIMIT ?4 OFFSET ?5",
            SELECT_COLUMNS,
            order_by.sql_clause(NODE_TABLE)
        );
        let rows: Vec<NodeRow> = sqlx::query_as(&sql)
            .bind(domain_id)
            .bind(Status::Enabled.as_i32())
            .bind(parent_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows_to_nodes(rows)
    }

    async fn get_all_nodes(
        &self,
        domain_id: &str,
        count: usize,
        offset: usize,
        order_by: &OrderBy,
    ) -> Result<NodeList> {
        let (limit, offset) = window(count, offset);
        let sql = format!(
            "SELECT {} FROM node WHERE domain_id = ?1 AND status = ?2 \
             ORDER BY {} LIMIT ?3 OFFSET ?4",
            SELECT_COLUMNS,
            order_by.sql_clause(NODE_TABLE)
        );
        let rows: Vec<NodeRow> = sqlx::query_as(&sql)
            .bind(domain_id)
            .bind(Status::Enabled.as_i32())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows_to_nodes(rows)
    }

    async fn get_total_child_nodes(&self, domain_id: &str, parent_id: &str) -> Result<usize> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT count(*) FROM node WHERE domain_id = ?1 AND parent_id = ?2 AND status = ?3
            "#,
        )
        .bind(domain_id)
        .bind(parent_id)
        .bind(Status::Enabled.as_i32())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(usize::try_from(total).unwrap_or_default())
    }

    async fn get_node(&self, domain_id: &str, node_id: &str) -> Result<Node> {
        let id = row_id(node_id).ok_or_else(|| ListboardError::not_found(domain_id, node_id))?;
        let sql = format!(
            "SELECT {} FROM node WHERE id = ?1 AND domain_id = ?2 AND status = ?3",
            SELECT_COLUMNS
        );
        let row: Option<NodeRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(domain_id)
            .bind(Status::Enabled.as_i32())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.ok_or_else(|| ListboardError::not_found(domain_id, node_id))?
            .try_into()
    }

    async fn add_node(&self, node: &Node) -> Result<NodeId> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO node (parent_id, domain_id, title, vote, tripcode, body,
                              rendered, status, level, created, updated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&node.parent_id)
        .bind(&node.domain_id)
        .bind(&node.title)
        .bind(node.vote)
        .bind(&node.tripcode)
        .bind(&node.body)
        .bind(&node.rendered)
        .bind(node.status.as_i32())
        .bind(node.level.as_i32())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = result.last_insert_rowid().to_string();
        debug!("Added node {}/{}", node.domain_id, id);
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
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for bump in bumps {
            let Some(id) = row_id(&bump.node_id) else {
                tx.rollback().await.map_err(db_err)?;
                return Err(ListboardError::not_found(domain_id, &bump.node_id));
            };
            // SQLite promotes an overflowing integer sum to REAL, so the
            // bound check happens in the WHERE clause
            let result = sqlx::query(
                r#"
                UPDATE node SET vote = vote + ?1, updated = ?2
                WHERE domain_id = ?3 AND id = ?4 AND status = ?5
                  AND vote >= (-9223372036854775807 - 1) - min(?1, 0)
                  AND vote <= 9223372036854775807 - max(?1, 0)
                "#,
            )
            .bind(bump.delta)
            .bind(updated)
            .bind(domain_id)
            .bind(id)
            .bind(Status::Enabled.as_i32())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            if result.rows_affected() == 0 {
                let exists: Option<(i64,)> = sqlx::query_as(
                    "SELECT vote FROM node WHERE domain_id = ?1 AND id = ?2 AND status = ?3",
                )
                .bind(domain_id)
                .bind(id)
                .bind(Status::Enabled.as_i32())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
                tx.rollback().await.map_err(db_err)?;

                return Err(match exists {
                    Some(_) => vote_overflow(domain_id, &bump.node_id, bump.delta),
                    None => ListboardError::not_found(domain_id, &bump.node_id),
                });
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn edit_node(&self, node: &Node) -> Result<()> {
        let id =
            row_id(&node.id).ok_or_else(|| ListboardError::not_found(&node.domain_id, &node.id))?;
        let result = sqlx::query(
            r#"
            UPDATE node SET title = ?1, body = ?2, rendered = ?3, updated = ?4
            WHERE id = ?5 AND domain_id = ?6 AND tripcode = ?7 AND status = ?8
            "#,
        )
        .bind(&node.title)
        .bind(&node.body)
        .bind(&node.rendered)
        .bind(node.updated)
        .bind(id)
        .bind(&node.domain_id)
        .bind(&node.tripcode)
        .bind(Status::Enabled.as_i32())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(ListboardError::not_found(&node.domain_id, &node.id));
        }
        Ok(())
    }

    async fn set_status(&self, domain_id: &str, node_id: &str, status: Status) -> Result<()> {
        let id = row_id(node_id).ok_or_else(|| ListboardError::not_found(domain_id, node_id))?;
        let result = sqlx::query(
            r#"
            UPDATE node SET status = ?1, updated = ?2 WHERE id = ?3 AND domain_id = ?4
            "#,
        )
        .bind(status.as_i32())
        .bind(Utc::now())
        .bind(id)
        .bind(domain_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(ListboardError::not_found(domain_id, node_id));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

async fn ensure_parent_dir(path: &str) -> Result<()> {
    if let Some(parent) = std::path::Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        debug!("Creating parent directory: {}", parent.display());
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            ListboardError::Connection(format!(
                "Failed to create database directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    Ok(())
}

fn connect_err(e: sqlx::Error) -> ListboardError {
    ListboardError::Connection(e.to_string())
}
