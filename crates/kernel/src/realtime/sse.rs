//! Server-sent-events transport for hub subscriptions.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_core::Stream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::realtime::Subscription;

/// Adapt a hub subscription into an SSE response.
///
/// The subscription deregisters itself when the client disconnects and the
/// stream is dropped. Events that fail to encode are skipped, not fatal.
pub fn sse_response(
    subscription: Subscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = subscription.filter_map(|event| {
        match Event::default().event(event.name.clone()).json_data(&event.payload) {
            Ok(encoded) => Some(Ok(encoded)),
            Err(error) => {
                warn!(event = %event.name, error = %error, "failed to encode change event");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
