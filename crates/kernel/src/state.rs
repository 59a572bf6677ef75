//! Application state shared across the embedding application.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::content::{BlockProcessor, ContentService};
use crate::db;
use crate::file::{FileLookup, RepositoryFileLookup};
use crate::lifecycle::LifecycleRepository;
use crate::models::{ContentItem, StoredFile, UserAccount};
use crate::realtime::ChangeHub;
use crate::store::{
    Collection, MemoryCollection, MemoryTransactionBackend, PgCollection, PgTransactionBackend,
};
use crate::txn::{TransactionBackend, TransactionCoordinator};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool; absent on the in-memory topology.
    db: Option<PgPool>,

    /// Content write-path service.
    content: ContentService,

    /// File metadata repository.
    files: LifecycleRepository<StoredFile>,

    /// User account repository.
    users: LifecycleRepository<UserAccount>,

    /// Change fan-out hub.
    hub: ChangeHub,
}

impl AppState {
    /// Create application state backed by PostgreSQL.
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&pool)
            .await
            .context("failed to run migrations")?;

        let contents: Arc<dyn Collection<ContentItem>> =
            Arc::new(PgCollection::new(pool.clone(), "content_item"));
        let files: Arc<dyn Collection<StoredFile>> =
            Arc::new(PgCollection::new(pool.clone(), "stored_file"));
        let users: Arc<dyn Collection<UserAccount>> =
            Arc::new(PgCollection::new(pool.clone(), "user_account"));
        let backend: Arc<dyn TransactionBackend> =
            Arc::new(PgTransactionBackend::new(pool.clone()));

        info!("PostgreSQL storage initialized");
        Ok(Self::assemble(Some(pool), contents, files, users, backend))
    }

    /// Create application state on the in-memory topology.
    ///
    /// The degraded mode: no database, no multi-write atomicity. Used by
    /// tests and database-less deployments.
    pub fn in_memory() -> Self {
        let contents: Arc<dyn Collection<ContentItem>> = Arc::new(MemoryCollection::new());
        let files: Arc<dyn Collection<StoredFile>> = Arc::new(MemoryCollection::new());
        let users: Arc<dyn Collection<UserAccount>> = Arc::new(MemoryCollection::new());
        let backend: Arc<dyn TransactionBackend> = Arc::new(MemoryTransactionBackend);

        Self::assemble(None, contents, files, users, backend)
    }

    fn assemble(
        db: Option<PgPool>,
        contents: Arc<dyn Collection<ContentItem>>,
        files: Arc<dyn Collection<StoredFile>>,
        users: Arc<dyn Collection<UserAccount>>,
        backend: Arc<dyn TransactionBackend>,
    ) -> Self {
        let files = LifecycleRepository::new(files, "file");
        let users = LifecycleRepository::new(users, "user");
        let contents = LifecycleRepository::new(contents, "content");

        let lookup: Arc<dyn FileLookup> = Arc::new(RepositoryFileLookup::new(files.clone()));
        let hub = ChangeHub::new();

        let content = ContentService::new(
            contents,
            BlockProcessor::new(lookup),
            TransactionCoordinator::new(backend),
            hub.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                db,
                content,
                files,
                users,
                hub,
            }),
        }
    }

    /// Get the content service.
    pub fn content(&self) -> &ContentService {
        &self.inner.content
    }

    /// Get the file metadata repository.
    pub fn files(&self) -> &LifecycleRepository<StoredFile> {
        &self.inner.files
    }

    /// Get the user account repository.
    pub fn users(&self) -> &LifecycleRepository<UserAccount> {
        &self.inner.users
    }

    /// Get the change hub.
    pub fn hub(&self) -> &ChangeHub {
        &self.inner.hub
    }

    /// Get the database pool, when running on PostgreSQL.
    pub fn db(&self) -> Option<&PgPool> {
        self.inner.db.as_ref()
    }

    /// Check if PostgreSQL is healthy. Always false on the in-memory
    /// topology.
    pub async fn postgres_healthy(&self) -> bool {
        match &self.inner.db {
            Some(pool) => db::check_health(pool).await,
            None => false,
        }
    }

    /// Release per-process resources: closes all subscriber connections.
    pub fn shutdown(&self) {
        self.inner.hub.drain();
    }
}
