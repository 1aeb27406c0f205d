// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event transport trait for the per-session event stream.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::WeftError;
use crate::types::{RawEvent, SessionId};

/// Ordered stream of named events for one session.
///
/// Dropping the stream is the unsubscribe operation: implementations must
/// release the underlying connection when the stream is dropped.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RawEvent, WeftError>> + Send>>;

/// Delivers the named events of one session over a long-lived connection.
///
/// Implementations open a single connection per call. When the stream ends or
/// fails, the session driver reconnects with backoff by calling
/// [`subscribe`](EventTransport::subscribe) again and then resyncs.
#[async_trait]
pub trait EventTransport: Send + Sync + 'static {
    /// Opens the event stream for `session_id`.
    async fn subscribe(&self, session_id: &SessionId) -> Result<EventStream, WeftError>;
}
