//! In-memory storage backend.
//!
//! Backs tests and database-less deployments. Reports no transaction
//! support, which makes it the canonical degraded topology: every write
//! through it is individually durable (for the lifetime of the process)
//! but never atomic as a group.

use std::cmp::Ordering;
use std::collections::HashMap;

use anyhow::bail;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::lifecycle::{LifecycleRecord, ListQuery, SortOrder};
use crate::store::{Collection, Partition};
use crate::txn::{StoreSession, TransactionBackend, TransactionContext};

/// Map-backed collection over one record type.
#[derive(Default)]
pub struct MemoryCollection<T> {
    rows: RwLock<HashMap<Uuid, T>>,
}

impl<T: LifecycleRecord> MemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records, both partitions.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl<T: LifecycleRecord> Collection<T> for MemoryCollection<T> {
    async fn find_page(&self, partition: Partition, query: &ListQuery) -> anyhow::Result<Vec<T>> {
        let mut matched: Vec<T> = {
            let rows = self.rows.read();
            rows.values()
                .filter(|record| partition.contains(*record))
                .cloned()
                .collect()
        };

        matched.sort_by(|a, b| compare_by_field(a, b, &query.sort));
        if query.order == SortOrder::Desc {
            matched.reverse();
        }

        Ok(matched
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn count(&self, partition: Partition) -> anyhow::Result<u64> {
        let rows = self.rows.read();
        Ok(rows
            .values()
            .filter(|record| partition.contains(*record))
            .count() as u64)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<T>> {
        Ok(self.rows.read().get(&id).cloned())
    }

    async fn insert(&self, _ctx: &TransactionContext, record: &T) -> anyhow::Result<()> {
        let mut rows = self.rows.write();
        if rows.contains_key(&record.id()) {
            bail!("duplicate record id {}", record.id());
        }
        rows.insert(record.id(), record.clone());
        Ok(())
    }

    async fn replace(&self, _ctx: &TransactionContext, record: &T) -> anyhow::Result<bool> {
        let mut rows = self.rows.write();
        if !rows.contains_key(&record.id()) {
            return Ok(false);
        }
        rows.insert(record.id(), record.clone());
        Ok(true)
    }

    async fn delete(&self, _ctx: &TransactionContext, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.rows.write().remove(&id).is_some())
    }
}

/// Compare two records on a named field.
///
/// The audit timestamps are compared natively; any other field is compared
/// through its JSON representation.
fn compare_by_field<T: LifecycleRecord>(a: &T, b: &T, field: &str) -> Ordering {
    match field {
        "created_at" => a.created_at().cmp(&b.created_at()),
        "updated_at" => a.updated_at().cmp(&b.updated_at()),
        "deleted_at" => a
            .lifecycle()
            .deleted_at()
            .cmp(&b.lifecycle().deleted_at()),
        _ => value_order(&json_field(a, field), &json_field(b, field)),
    }
}

fn json_field<T: LifecycleRecord>(record: &T, field: &str) -> Value {
    serde_json::to_value(record)
        .ok()
        .and_then(|value| value.get(field).cloned())
        .unwrap_or(Value::Null)
}

fn value_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Transaction backend for the in-memory store: atomicity is never
/// available, so the coordinator always degrades to detached contexts.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryTransactionBackend;

#[async_trait]
impl TransactionBackend for MemoryTransactionBackend {
    async fn supports_transactions(&self) -> bool {
        false
    }

    async fn begin(&self) -> anyhow::Result<Box<dyn StoreSession>> {
        bail!("the in-memory store does not support transactions");
    }
}
