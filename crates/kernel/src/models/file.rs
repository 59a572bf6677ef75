//! Stored file metadata records.
//!
//! Byte storage lives elsewhere; this subsystem only tracks the metadata
//! row that content blocks resolve against, under the same lifecycle rules
//! as every other record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::{Lifecycle, LifecycleRecord};

/// File metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Storage key within the blob store.
    pub key: String,

    /// Public URL the file is served from.
    pub url: String,

    pub content_type: String,

    /// Size in bytes.
    pub size: i64,

    pub filename: String,

    pub created_by: Uuid,

    pub updated_by: Uuid,

    #[serde(default)]
    pub lifecycle: Lifecycle,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl StoredFile {
    /// Build a new active record with audit fields stamped to `actor`.
    pub fn new(input: CreateStoredFile, actor: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            key: input.key,
            url: input.url,
            content_type: input.content_type,
            size: input.size,
            filename: input.filename,
            created_by: actor,
            updated_by: actor,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

impl LifecycleRecord for StoredFile {
    fn id(&self) -> Uuid {
        self.id
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        self.lifecycle = lifecycle;
    }

    fn mark_updated(&mut self, actor: Uuid, at: DateTime<Utc>) {
        self.updated_by = actor;
        self.updated_at = at;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Input for registering a stored file.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStoredFile {
    pub key: String,
    pub url: String,
    pub content_type: String,
    pub size: i64,
    pub filename: String,
}
