#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Tests run against the in-memory topology: the real services and
//! repositories, no database, no transaction support. This also keeps
//! the degraded (non-atomic) write path permanently exercised.

#![allow(dead_code)]

use uuid::Uuid;

use scrivano_kernel::AppState;
use scrivano_kernel::models::{BlockInput, CreateContent, CreateStoredFile, CreateUserAccount};
use scrivano_kernel::txn::TransactionContext;

/// Build a fresh in-memory application state.
///
/// Tracing output is opt-in via RUST_LOG, mirroring the server setup.
pub fn test_state() -> AppState {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    AppState::in_memory()
}

/// A text block input.
pub fn text_block(text: &str) -> BlockInput {
    BlockInput {
        block_type: "text".to_string(),
        text: Some(text.to_string()),
        ..BlockInput::default()
    }
}

/// An image block input referencing a stored file.
pub fn image_block(file_id: Uuid) -> BlockInput {
    BlockInput {
        block_type: "image".to_string(),
        file_id: Some(file_id),
        ..BlockInput::default()
    }
}

/// A minimal create input with one text block.
pub fn simple_content(title: &str) -> CreateContent {
    CreateContent {
        title: title.to_string(),
        blocks: vec![text_block("Hello")],
        ..CreateContent::default()
    }
}

/// Register a stored file and return its id.
pub async fn seed_file(state: &AppState, filename: &str, actor: Uuid) -> Uuid {
    let file = scrivano_kernel::models::StoredFile::new(
        CreateStoredFile {
            key: format!("uploads/{filename}"),
            url: format!("https://cdn.example/uploads/{filename}"),
            content_type: "image/png".to_string(),
            size: 1024,
            filename: filename.to_string(),
        },
        actor,
    );

    let created = state
        .files()
        .create(&TransactionContext::detached(), file)
        .await
        .expect("failed to seed file");

    created.id
}

/// Register a user account and return its id.
pub async fn seed_user(state: &AppState, username: &str, actor: Uuid) -> Uuid {
    let user = scrivano_kernel::models::UserAccount::new(
        CreateUserAccount {
            username: username.to_string(),
            display_name: username.to_string(),
        },
        actor,
    );

    let created = state
        .users()
        .create(&TransactionContext::detached(), user)
        .await
        .expect("failed to seed user");

    created.id
}
