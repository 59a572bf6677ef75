//! User account records.
//!
//! Credentials and sessions are handled elsewhere; the kernel only needs
//! accounts as lifecycle-managed records and as write actors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::{Lifecycle, LifecycleRecord};

/// User account record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub username: String,

    pub display_name: String,

    pub created_by: Uuid,

    pub updated_by: Uuid,

    #[serde(default)]
    pub lifecycle: Lifecycle,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// Build a new active record with audit fields stamped to `actor`.
    pub fn new(input: CreateUserAccount, actor: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            username: input.username,
            display_name: input.display_name,
            created_by: actor,
            updated_by: actor,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

impl LifecycleRecord for UserAccount {
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

/// Input for creating a user account.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserAccount {
    pub username: String,
    pub display_name: String,
}
