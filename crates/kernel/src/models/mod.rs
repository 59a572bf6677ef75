//! Stored record types.

pub mod content;
pub mod file;
pub mod user;

pub use content::{Block, BlockInput, BlockKind, ContentItem, CreateContent, UpdateContent};
pub use file::{CreateStoredFile, StoredFile};
pub use user::{CreateUserAccount, UserAccount};
