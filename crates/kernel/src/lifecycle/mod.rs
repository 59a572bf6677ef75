//! Entity lifecycle: the active/deleted state machine shared by every
//! record type, plus pagination and the generic repository.
//!
//! A record is either *Active* or *Deleted* (soft-deleted with a
//! timestamp/actor pair); physical removal is terminal and leaves no stored
//! state. The two partitions are mutually exclusive: a record is never
//! visible through the active query path while deleted, nor vice versa.

mod page;
mod repository;

pub use page::{
    DEFAULT_PAGE_LIMIT, ListQuery, MAX_PAGE_LIMIT, Page, PageMeta, PageRequest, SortOrder,
};
pub use repository::LifecycleRepository;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// Lifecycle state of a stored record.
///
/// The deleted timestamp and actor travel together; a half-set pair is
/// unrepresentable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    /// Record is live and visible through the active query path.
    #[default]
    Active,

    /// Record was soft-deleted: hidden from the active path, restorable.
    Deleted {
        at: DateTime<Utc>,
        by: Uuid,
    },
}

impl Lifecycle {
    /// Build the deleted state for the given actor at the current instant.
    pub fn deleted_by(actor: Uuid) -> Self {
        Self::Deleted {
            at: Utc::now(),
            by: actor,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Lifecycle::Deleted { .. })
    }

    /// Deletion timestamp, if soft-deleted.
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Deleted { at, .. } => Some(*at),
        }
    }

    /// Deleting actor, if soft-deleted.
    pub fn deleting_actor(&self) -> Option<Uuid> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Deleted { by, .. } => Some(*by),
        }
    }
}

/// A record type managed by [`LifecycleRepository`].
///
/// Implemented explicitly per entity type; the repository only ever touches
/// records through this trait.
pub trait LifecycleRecord:
    Clone + Send + Sync + Unpin + Serialize + DeserializeOwned + 'static
{
    fn id(&self) -> Uuid;

    fn lifecycle(&self) -> &Lifecycle;

    fn set_lifecycle(&mut self, lifecycle: Lifecycle);

    /// Stamp the audit trail after a mutation.
    fn mark_updated(&mut self, actor: Uuid, at: DateTime<Utc>);

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;
}
