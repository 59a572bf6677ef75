//! Content write orchestration.
//!
//! The only component that touches everything: block processing, the
//! transactional scope, the lifecycle repository, and change fan-out.
//! Validation runs before any write is attempted; the broadcast runs
//! strictly after the write commits and can neither fail nor roll it
//! back.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::content::BlockProcessor;
use crate::error::KernelResult;
use crate::lifecycle::{LifecycleRepository, Page, PageRequest};
use crate::models::{ContentItem, CreateContent, UpdateContent};
use crate::realtime::{ChangeEvent, ChangeHub};
use crate::txn::{TransactionContext, TransactionCoordinator};

/// A committed content write plus its transaction correlation id.
///
/// The id is assigned in degraded (non-transactional) mode too, so log
/// correlation works on every topology.
#[derive(Debug, Clone)]
pub struct CommittedContent {
    pub item: ContentItem,
    pub transaction_id: Uuid,
}

/// Service for content write operations.
#[derive(Clone)]
pub struct ContentService {
    inner: Arc<ContentServiceInner>,
}

struct ContentServiceInner {
    repository: LifecycleRepository<ContentItem>,
    processor: BlockProcessor,
    coordinator: TransactionCoordinator,
    hub: ChangeHub,
    cache: DashMap<Uuid, ContentItem>,
}

impl ContentService {
    pub fn new(
        repository: LifecycleRepository<ContentItem>,
        processor: BlockProcessor,
        coordinator: TransactionCoordinator,
        hub: ChangeHub,
    ) -> Self {
        Self {
            inner: Arc::new(ContentServiceInner {
                repository,
                processor,
                coordinator,
                hub,
                cache: DashMap::new(),
            }),
        }
    }

    /// Create a content record.
    ///
    /// Block validation failures abort before any write; on success the
    /// committed record is broadcast to all live subscribers.
    pub async fn create(&self, input: CreateContent, actor: Uuid) -> KernelResult<CommittedContent> {
        let CreateContent {
            title,
            description,
            blocks,
            metadata,
        } = input;

        let blocks = self.inner.processor.process_blocks(blocks, actor).await?;
        let record = ContentItem::new(
            title,
            description,
            blocks,
            metadata.unwrap_or_default(),
            actor,
        );

        let repository = self.inner.repository.clone();
        let (item, transaction_id) = self
            .inner
            .coordinator
            .run_in_transaction(move |ctx| async move { repository.create(&ctx, record).await })
            .await?;

        self.inner.hub.publish(ChangeEvent::content_created(&item));
        info!(content_id = %item.id, transaction_id = %transaction_id, "content created");

        Ok(CommittedContent {
            item,
            transaction_id,
        })
    }

    /// Update a content record.
    ///
    /// A supplied block list replaces the stored one wholesale and is
    /// re-validated in full; absent fields are left untouched. Last write
    /// wins under concurrent updates.
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateContent,
        actor: Uuid,
    ) -> KernelResult<CommittedContent> {
        let UpdateContent {
            title,
            description,
            blocks,
            metadata,
        } = input;

        let blocks = match blocks {
            Some(inputs) => Some(self.inner.processor.process_blocks(inputs, actor).await?),
            None => None,
        };

        let repository = self.inner.repository.clone();
        let (item, transaction_id) = self
            .inner
            .coordinator
            .run_in_transaction(move |ctx| async move {
                repository
                    .update(&ctx, id, actor, |record| {
                        if let Some(title) = title {
                            record.title = title;
                        }
                        if let Some(description) = description {
                            record.description = Some(description);
                        }
                        if let Some(blocks) = blocks {
                            record.blocks = blocks;
                        }
                        if let Some(metadata) = metadata {
                            record.metadata = metadata;
                        }
                    })
                    .await
            })
            .await?;

        self.inner.cache.remove(&id);
        self.inner.hub.publish(ChangeEvent::content_updated(&item));
        info!(content_id = %id, transaction_id = %transaction_id, "content updated");

        Ok(CommittedContent {
            item,
            transaction_id,
        })
    }

    /// Soft-delete a content record and announce it.
    ///
    /// Subscribers receive `{id, deleted: true}` so they can react without
    /// re-fetching. Returns the post-deletion snapshot.
    pub async fn remove(&self, id: Uuid, actor: Uuid) -> KernelResult<ContentItem> {
        let repository = self.inner.repository.clone();
        let (item, transaction_id) = self
            .inner
            .coordinator
            .run_in_transaction(move |ctx| async move {
                repository.soft_delete(&ctx, id, actor).await
            })
            .await?;

        self.inner.cache.remove(&id);
        self.inner.hub.publish(ChangeEvent::content_deleted(id));
        info!(content_id = %id, transaction_id = %transaction_id, "content removed");

        Ok(item)
    }

    /// Restore a soft-deleted content record and announce the update.
    pub async fn restore(&self, id: Uuid, actor: Uuid) -> KernelResult<ContentItem> {
        let item = self
            .inner
            .repository
            .restore(&TransactionContext::detached(), id, actor)
            .await?;

        self.inner.cache.remove(&id);
        self.inner.hub.publish(ChangeEvent::content_updated(&item));
        info!(content_id = %id, "content restored");

        Ok(item)
    }

    /// Physically remove a content record from either lifecycle state.
    ///
    /// Administrative bypass, no broadcast: subscribers only ever see
    /// committed soft-deletes.
    pub async fn purge(&self, id: Uuid) -> KernelResult<()> {
        self.inner
            .repository
            .hard_delete(&TransactionContext::detached(), id)
            .await?;

        self.inner.cache.remove(&id);
        info!(content_id = %id, "content purged");

        Ok(())
    }

    /// Fetch an active content record, through the read cache.
    pub async fn find(&self, id: Uuid) -> KernelResult<ContentItem> {
        if let Some(item) = self.inner.cache.get(&id) {
            return Ok(item.clone());
        }

        let item = self.inner.repository.find_one(id, false).await?;
        self.inner.cache.insert(id, item.clone());

        Ok(item)
    }

    /// List active content records.
    pub async fn list(&self, page: &PageRequest) -> KernelResult<Page<ContentItem>> {
        self.inner.repository.list_active(page).await
    }

    /// List soft-deleted content records.
    pub async fn list_deleted(&self, page: &PageRequest) -> KernelResult<Page<ContentItem>> {
        self.inner.repository.list_deleted(page).await
    }

    /// Drop a cached record (e.g. after an out-of-band write).
    pub fn invalidate(&self, id: Uuid) {
        self.inner.cache.remove(&id);
    }
}
