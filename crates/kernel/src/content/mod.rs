//! Content write path.
//!
//! This module provides:
//! - BlockProcessor: all-or-nothing block validation and normalization
//! - ContentService: orchestrated create/update/remove/restore/purge with
//!   optional transactional scope and committed-change broadcast

mod block_processor;
mod service;

pub use block_processor::BlockProcessor;
pub use service::{CommittedContent, ContentService};
