//! Generic repository enforcing the active/deleted partition.
//!
//! One instance per entity type, composed over a [`Collection`] backend.
//! Every operation checks the lifecycle partition before touching storage,
//! so a record in the wrong partition behaves exactly like a missing one.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{KernelError, KernelResult};
use crate::lifecycle::page::ListQuery;
use crate::lifecycle::{Lifecycle, LifecycleRecord, Page, PageMeta, PageRequest, SortOrder};
use crate::store::{Collection, Partition};
use crate::txn::TransactionContext;

/// Repository over an entity type with lifecycle semantics.
pub struct LifecycleRepository<T: LifecycleRecord> {
    collection: Arc<dyn Collection<T>>,
    entity: &'static str,
}

impl<T: LifecycleRecord> Clone for LifecycleRepository<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            entity: self.entity,
        }
    }
}

impl<T: LifecycleRecord> LifecycleRepository<T> {
    /// Create a repository over the given collection backend.
    ///
    /// `entity` is a short name used in log lines ("content", "file", ...).
    pub fn new(collection: Arc<dyn Collection<T>>, entity: &'static str) -> Self {
        Self { collection, entity }
    }

    /// List active records.
    ///
    /// Defaults to `created_at` descending when no sort is requested; an
    /// explicitly requested sort field defaults to ascending.
    pub async fn list_active(&self, page: &PageRequest) -> KernelResult<Page<T>> {
        self.list(Partition::Active, page, "created_at").await
    }

    /// List soft-deleted records, defaulting to `deleted_at` descending.
    pub async fn list_deleted(&self, page: &PageRequest) -> KernelResult<Page<T>> {
        self.list(Partition::Deleted, page, "deleted_at").await
    }

    async fn list(
        &self,
        partition: Partition,
        page: &PageRequest,
        default_sort: &str,
    ) -> KernelResult<Page<T>> {
        let query = ListQuery {
            sort: page.sort.clone().unwrap_or_else(|| default_sort.to_string()),
            order: page.order.unwrap_or(if page.sort.is_some() {
                SortOrder::Asc
            } else {
                SortOrder::Desc
            }),
            offset: page.offset(),
            limit: page.page_size(),
        };

        let total = self.collection.count(partition).await?;
        let data = self.collection.find_page(partition, &query).await?;

        Ok(Page {
            data,
            meta: PageMeta::new(total, page.page_number(), page.page_size()),
        })
    }

    /// Fetch a single record by id.
    ///
    /// Matches only active records unless `include_deleted` is set.
    pub async fn find_one(&self, id: Uuid, include_deleted: bool) -> KernelResult<T> {
        let record = self
            .collection
            .get(id)
            .await?
            .ok_or(KernelError::NotFound)?;

        if !include_deleted && record.lifecycle().is_deleted() {
            return Err(KernelError::NotFound);
        }

        Ok(record)
    }

    /// Persist a new record. The caller constructs it in the active state
    /// with its audit fields already stamped.
    pub async fn create(&self, ctx: &TransactionContext, record: T) -> KernelResult<T> {
        self.collection.insert(ctx, &record).await?;
        debug!(entity = self.entity, id = %record.id(), "record created");
        Ok(record)
    }

    /// Apply a partial update to an active record.
    ///
    /// Last write wins: there is no version check, and concurrent updates
    /// to the same record silently overwrite one another.
    pub async fn update<F>(
        &self,
        ctx: &TransactionContext,
        id: Uuid,
        actor: Uuid,
        apply: F,
    ) -> KernelResult<T>
    where
        F: FnOnce(&mut T),
    {
        let mut record = self.find_one(id, false).await?;
        apply(&mut record);
        record.mark_updated(actor, Utc::now());

        if !self.collection.replace(ctx, &record).await? {
            return Err(KernelError::NotFound);
        }

        debug!(entity = self.entity, id = %id, "record updated");
        Ok(record)
    }

    /// Soft-delete an active record, stamping the deletion pair.
    ///
    /// A record that is already deleted is not visible to this operation.
    pub async fn soft_delete(
        &self,
        ctx: &TransactionContext,
        id: Uuid,
        actor: Uuid,
    ) -> KernelResult<T> {
        let mut record = self.find_one(id, false).await?;
        record.set_lifecycle(Lifecycle::deleted_by(actor));

        if !self.collection.replace(ctx, &record).await? {
            return Err(KernelError::NotFound);
        }

        debug!(entity = self.entity, id = %id, actor = %actor, "record soft-deleted");
        Ok(record)
    }

    /// Restore a soft-deleted record to the active partition.
    ///
    /// Restoring a record that is already active is an error, not a no-op.
    pub async fn restore(
        &self,
        ctx: &TransactionContext,
        id: Uuid,
        actor: Uuid,
    ) -> KernelResult<T> {
        let mut record = self
            .collection
            .get(id)
            .await?
            .ok_or(KernelError::NotFound)?;

        if record.lifecycle().is_active() {
            return Err(KernelError::NotFound);
        }

        record.set_lifecycle(Lifecycle::Active);
        record.mark_updated(actor, Utc::now());

        if !self.collection.replace(ctx, &record).await? {
            return Err(KernelError::NotFound);
        }

        debug!(entity = self.entity, id = %id, actor = %actor, "record restored");
        Ok(record)
    }

    /// Physically remove a record.
    ///
    /// Administrative bypass: works from either lifecycle state, including
    /// directly on an active record that was never soft-deleted.
    pub async fn hard_delete(&self, ctx: &TransactionContext, id: Uuid) -> KernelResult<()> {
        if !self.collection.delete(ctx, id).await? {
            return Err(KernelError::NotFound);
        }

        debug!(entity = self.entity, id = %id, "record purged");
        Ok(())
    }
}
