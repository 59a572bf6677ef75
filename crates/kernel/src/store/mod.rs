//! Persistence backends.
//!
//! [`Collection`] is the seam between the lifecycle repository and actual
//! storage: a handful of primitive operations over one record type. Two
//! backends are provided: PostgreSQL JSONB document tables and an
//! in-memory map used by tests and database-less deployments.

mod memory;
mod postgres;

pub use memory::{MemoryCollection, MemoryTransactionBackend};
pub use postgres::{PgCollection, PgTransactionBackend};

use async_trait::async_trait;
use uuid::Uuid;

use crate::lifecycle::{LifecycleRecord, ListQuery};
use crate::txn::TransactionContext;

/// The lifecycle partition a query addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Active,
    Deleted,
}

impl Partition {
    /// Whether a record belongs to this partition.
    pub fn contains<T: LifecycleRecord>(&self, record: &T) -> bool {
        match self {
            Partition::Active => record.lifecycle().is_active(),
            Partition::Deleted => record.lifecycle().is_deleted(),
        }
    }
}

/// Primitive storage operations over one record type.
///
/// Reads run outside any transactional scope; writes accept the operation's
/// context and join its session when the backend supports one.
#[async_trait]
pub trait Collection<T: LifecycleRecord>: Send + Sync {
    /// Fetch one page of records from a partition.
    async fn find_page(&self, partition: Partition, query: &ListQuery) -> anyhow::Result<Vec<T>>;

    /// Count the records in a partition.
    async fn count(&self, partition: Partition) -> anyhow::Result<u64>;

    /// Fetch a record by id regardless of partition.
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<T>>;

    /// Insert a new record. Fails on duplicate id.
    async fn insert(&self, ctx: &TransactionContext, record: &T) -> anyhow::Result<()>;

    /// Replace a stored record wholesale. Returns false if it is missing.
    async fn replace(&self, ctx: &TransactionContext, record: &T) -> anyhow::Result<bool>;

    /// Remove a record physically. Returns false if it is missing.
    async fn delete(&self, ctx: &TransactionContext, id: Uuid) -> anyhow::Result<bool>;
}
