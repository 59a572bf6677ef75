//! Scrivano CMS Kernel
//!
//! The write-path consistency subsystem of the Scrivano backend: block
//! validation and normalization, optionally transactional lifecycle
//! storage shared by content/file/user records, and fire-and-forget
//! fan-out of committed changes to live subscribers.

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod file;
pub mod lifecycle;
pub mod models;
pub mod realtime;
pub mod state;
pub mod store;
pub mod txn;

pub use config::Config;
pub use error::{KernelError, KernelResult};
pub use state::AppState;
