//! PostgreSQL storage backend.
//!
//! Each record type lives in its own JSONB document table:
//! `(id, doc, created_at, updated_at, deleted_at, deleted_by)`. The
//! lifecycle pair is denormalized into columns so partition filters and
//! the default sorts stay on indexed columns; everything else sorts
//! through a `doc->>` projection.

use std::any::Any;
use std::marker::PhantomData;

use anyhow::{Context, bail};
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgQueryResult};
use sqlx::query::Query;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db;
use crate::lifecycle::{LifecycleRecord, ListQuery};
use crate::store::{Collection, Partition};
use crate::txn::{StoreSession, TransactionBackend, TransactionContext};

/// JSONB document collection for one record type.
pub struct PgCollection<T> {
    pool: PgPool,
    table: &'static str,
    _record: PhantomData<fn() -> T>,
}

impl<T: LifecycleRecord> PgCollection<T> {
    /// Create a collection over the given table.
    ///
    /// The table name is compiled in per entity type and never derived
    /// from input.
    pub fn new(pool: PgPool, table: &'static str) -> Self {
        Self {
            pool,
            table,
            _record: PhantomData,
        }
    }

    /// Execute a write on the context's session when one is open,
    /// otherwise directly on the pool.
    async fn execute(
        &self,
        ctx: &TransactionContext,
        query: Query<'_, Postgres, PgArguments>,
    ) -> anyhow::Result<PgQueryResult> {
        if let Some(handle) = ctx.session() {
            let mut guard = handle.lock().await;
            if let Some(session) = guard.as_any_mut().downcast_mut::<PgSession>() {
                let tx = session
                    .transaction()
                    .context("transaction already completed")?;
                return query
                    .execute(&mut **tx)
                    .await
                    .context("failed to execute statement in transaction");
            }
            bail!("transaction context does not belong to a PostgreSQL session");
        }

        query
            .execute(&self.pool)
            .await
            .context("failed to execute statement")
    }
}

#[async_trait]
impl<T: LifecycleRecord> Collection<T> for PgCollection<T> {
    async fn find_page(&self, partition: Partition, query: &ListQuery) -> anyhow::Result<Vec<T>> {
        let sql = format!(
            "SELECT doc FROM {} WHERE {} ORDER BY {} {} LIMIT $1 OFFSET $2",
            self.table,
            partition_filter(partition),
            sort_expression(&query.sort),
            query.order.as_sql(),
        );

        let docs = sqlx::query_scalar::<_, serde_json::Value>(&sql)
            .bind(query.limit as i64)
            .bind(query.offset as i64)
            .fetch_all(&self.pool)
            .await
            .context("failed to list records")?;

        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).context("failed to decode stored record"))
            .collect()
    }

    async fn count(&self, partition: Partition) -> anyhow::Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            self.table,
            partition_filter(partition)
        );

        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .context("failed to count records")?;

        Ok(count as u64)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<T>> {
        let sql = format!("SELECT doc FROM {} WHERE id = $1", self.table);

        let doc = sqlx::query_scalar::<_, serde_json::Value>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch record by id")?;

        doc.map(|doc| serde_json::from_value(doc).context("failed to decode stored record"))
            .transpose()
    }

    async fn insert(&self, ctx: &TransactionContext, record: &T) -> anyhow::Result<()> {
        let doc = serde_json::to_value(record).context("failed to encode record")?;
        let sql = format!(
            "INSERT INTO {} (id, doc, created_at, updated_at, deleted_at, deleted_by) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            self.table
        );

        let query = sqlx::query(&sql)
            .bind(record.id())
            .bind(doc)
            .bind(record.created_at())
            .bind(record.updated_at())
            .bind(record.lifecycle().deleted_at())
            .bind(record.lifecycle().deleting_actor());

        self.execute(ctx, query).await?;
        Ok(())
    }

    async fn replace(&self, ctx: &TransactionContext, record: &T) -> anyhow::Result<bool> {
        let doc = serde_json::to_value(record).context("failed to encode record")?;
        let sql = format!(
            "UPDATE {} SET doc = $2, updated_at = $3, deleted_at = $4, deleted_by = $5 \
             WHERE id = $1",
            self.table
        );

        let query = sqlx::query(&sql)
            .bind(record.id())
            .bind(doc)
            .bind(record.updated_at())
            .bind(record.lifecycle().deleted_at())
            .bind(record.lifecycle().deleting_actor());

        let result = self.execute(ctx, query).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, ctx: &TransactionContext, id: Uuid) -> anyhow::Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
        let query = sqlx::query(&sql).bind(id);

        let result = self.execute(ctx, query).await?;
        Ok(result.rows_affected() > 0)
    }
}

fn partition_filter(partition: Partition) -> &'static str {
    match partition {
        Partition::Active => "deleted_at IS NULL",
        Partition::Deleted => "deleted_at IS NOT NULL",
    }
}

/// Resolve a requested sort field to a SQL expression.
///
/// The audit columns sort natively; any other field sorts through the
/// JSONB document. Field names are restricted to identifier characters;
/// anything else falls back to `created_at`.
fn sort_expression(field: &str) -> String {
    match field {
        "created_at" | "updated_at" | "deleted_at" => field.to_string(),
        other if is_identifier(other) => format!("doc->>'{other}'"),
        _ => "created_at".to_string(),
    }
}

fn is_identifier(field: &str) -> bool {
    !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An open PostgreSQL transaction.
pub struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx: Some(tx) }
    }

    fn transaction(&mut self) -> Option<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut()
    }
}

#[async_trait]
impl StoreSession for PgSession {
    async fn commit(&mut self) -> anyhow::Result<()> {
        match self.tx.take() {
            Some(tx) => tx.commit().await.context("failed to commit transaction"),
            None => Ok(()),
        }
    }

    async fn abort(&mut self) -> anyhow::Result<()> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.context("failed to abort transaction"),
            None => Ok(()),
        }
    }

    async fn end(&mut self) -> anyhow::Result<()> {
        // Releasing a session whose transaction never completed rolls it
        // back rather than leaving it open on the connection.
        match self.tx.take() {
            Some(tx) => tx.rollback().await.context("failed to release session"),
            None => Ok(()),
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Transaction backend over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgTransactionBackend {
    pool: PgPool,
}

impl PgTransactionBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionBackend for PgTransactionBackend {
    /// Probe the pool with a round trip. A failing probe degrades the
    /// write path to non-atomic mode instead of erroring.
    async fn supports_transactions(&self) -> bool {
        db::check_health(&self.pool).await
    }

    async fn begin(&self) -> anyhow::Result<Box<dyn StoreSession>> {
        let tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;

        Ok(Box::new(PgSession::new(tx)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn audit_columns_sort_natively() {
        assert_eq!(sort_expression("created_at"), "created_at");
        assert_eq!(sort_expression("deleted_at"), "deleted_at");
    }

    #[test]
    fn document_fields_sort_through_jsonb() {
        assert_eq!(sort_expression("title"), "doc->>'title'");
        assert_eq!(sort_expression("updated_by"), "doc->>'updated_by'");
    }

    #[test]
    fn hostile_sort_fields_fall_back() {
        assert_eq!(sort_expression("title'; DROP TABLE x--"), "created_at");
        assert_eq!(sort_expression(""), "created_at");
        assert_eq!(sort_expression("a b"), "created_at");
    }
}
