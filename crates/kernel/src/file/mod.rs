//! File reference resolution.
//!
//! Block processing resolves indirect media references through the
//! [`FileLookup`] seam. The file-storage subsystem owns the bytes; all the
//! write path needs is the metadata of an existing, active file.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::KernelError;
use crate::lifecycle::LifecycleRepository;
use crate::models::StoredFile;

/// Resolved metadata for a referenced file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReference {
    pub id: Uuid,
    pub url: String,
    pub content_type: String,
    pub size: i64,
    pub filename: String,
}

impl From<&StoredFile> for FileReference {
    fn from(file: &StoredFile) -> Self {
        Self {
            id: file.id,
            url: file.url.clone(),
            content_type: file.content_type.clone(),
            size: file.size,
            filename: file.filename.clone(),
        }
    }
}

/// Lookup seam owned by the file-storage subsystem.
#[async_trait]
pub trait FileLookup: Send + Sync {
    /// Resolve a file id to its metadata. `None` means the file does not
    /// exist (or is not resolvable); an `Err` is a dependency failure.
    async fn fetch_by_id(&self, id: Uuid) -> anyhow::Result<Option<FileReference>>;
}

/// Lookup backed by the lifecycle repository: only active files resolve.
pub struct RepositoryFileLookup {
    files: LifecycleRepository<StoredFile>,
}

impl RepositoryFileLookup {
    pub fn new(files: LifecycleRepository<StoredFile>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl FileLookup for RepositoryFileLookup {
    async fn fetch_by_id(&self, id: Uuid) -> anyhow::Result<Option<FileReference>> {
        match self.files.find_one(id, false).await {
            Ok(file) => Ok(Some(FileReference::from(&file))),
            Err(KernelError::NotFound) => Ok(None),
            Err(error) => Err(anyhow::Error::new(error).context("file lookup failed")),
        }
    }
}

/// Fixed map of references, for tests and fixtures.
#[derive(Debug, Default)]
pub struct StaticFileLookup {
    files: HashMap<Uuid, FileReference>,
}

impl StaticFileLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reference under its own id.
    pub fn insert(&mut self, reference: FileReference) {
        self.files.insert(reference.id, reference);
    }
}

#[async_trait]
impl FileLookup for StaticFileLookup {
    async fn fetch_by_id(&self, id: Uuid) -> anyhow::Result<Option<FileReference>> {
        Ok(self.files.get(&id).cloned())
    }
}
