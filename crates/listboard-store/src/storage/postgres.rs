//! PostgreSQL database layer (networked)
//!
//! Identifiers come from an identity column, never from reading `max(id)`,
//! so concurrent inserts cannot collide.

use super::{db_err, row_id, rows_to_nodes, window, NodeRow, NODE_TABLE};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listboard_core::{
    ListboardError, Node, NodeId, NodeList, OrderBy, Result, Status, StorageBackend, VoteBump,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info};

const SELECT_COLUMNS: &str = "id::text AS id, parent_id, domain_id, title, vote, \
     tripcode, body, rendered, status, level, created, updated";

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn open(dsn: &str) -> Result<Self> {
        info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(dsn)
            .await
            .map_err(|e| ListboardError::Connection(e.to_string()))?;

        info!("PostgreSQL connection established, running migrations...");
        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    async fn run_migrations(pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS node (
                id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
                parent_id TEXT NOT NULL,
                domain_id TEXT NOT NULL,
                title TEXT NOT NULL,
                vote BIGINT NOT NULL DEFAULT 0,
                tripcode TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                rendered TEXT NOT NULL DEFAULT '',
                status INTEGER NOT NULL DEFAULT 1,
                level INTEGER NOT NULL DEFAULT 0,
                created TIMESTAMPTZ NOT NULL,
                updated TIMESTAMPTZ NOT NULL
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
impl StorageBackend for PostgresStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| ListboardError::Connection(e.to_string()))?;
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
            "SELECT {} FROM node WHERE domain_id = $1 AND status = $2 AND parent_id = $3 \
             ORDER BY {} LIMIT $4 OFFSET $5",
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
            "SELECT {} FROM node WHERE domain_id = $1 AND status = $2 \
             ORDER BY {} LIMIT $3 OFFSET $4",
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
            SELECT count(*) FROM node WHERE domain_id = $1 AND parent_id = $2 AND status = $3
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
            "SELECT {} FROM node WHERE id = $1 AND domain_id = $2 AND status = $3",
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
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO node (parent_id, domain_id, title, vote, tripcode, body,
                              rendered, status, level, created, updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
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
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        debug!("Added node {}/{}", node.domain_id, id);
        Ok(id.to_string())
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
            let result = sqlx::query(
                r#"
                UPDATE node SET vote = vote + $1, updated = $2
                WHERE domain_id = $3 AND id = $4 AND status = $5
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
                tx.rollback().await.map_err(db_err)?;
                return Err(ListboardError::not_found(domain_id, &bump.node_id));
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
            UPDATE node SET title = $1, body = $2, rendered = $3, updated = $4
            WHERE id = $5 AND domain_id = $6 AND tripcode = $7 AND status = $8
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
            UPDATE node SET status = $1, updated = $2 WHERE id = $3 AND domain_id = $4
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
