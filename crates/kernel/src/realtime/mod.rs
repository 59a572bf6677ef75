//! Real-time change fan-out.
//!
//! This module provides:
//! - ChangeHub: the registry of live subscriber connections
//! - ChangeEvent: named, JSON-payload committed-change events
//! - sse_response: SSE transport adapter for subscriptions

mod hub;
mod sse;

pub use hub::{ChangeEvent, ChangeHub, Subscription};
pub use sse::sse_response;
