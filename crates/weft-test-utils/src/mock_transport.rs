// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock event transport for deterministic testing.
//!
//! Every `subscribe()` opens an in-memory channel. Tests push named events
//! into the newest open stream of a session, fail it, or close it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use weft_core::{EventStream, EventTransport, RawEvent, SessionId, WeftError};

type EventSender = UnboundedSender<Result<RawEvent, WeftError>>;

#[derive(Default)]
struct TransportState {
    streams: HashMap<SessionId, EventSender>,
    subscribes: HashMap<SessionId, usize>,
    failures_left: usize,
}

/// A scriptable [`EventTransport`].
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
    notify: Arc<Notify>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an event into the session's current stream.
    /// Returns false when no stream is open.
    pub async fn push(&self, session_id: &str, event_type: &str, payload: Value) -> bool {
        self.send(session_id, Ok(RawEvent::new(event_type, payload)))
            .await
    }

    /// Delivers a stream error and then closes the stream.
    pub async fn fail_stream(&self, session_id: &str, error: WeftError) -> bool {
        let delivered = self.send(session_id, Err(error)).await;
        self.disconnect(session_id).await;
        delivered
    }

    /// Ends the session's current stream as if the server hung up.
    pub async fn disconnect(&self, session_id: &str) {
        self.state
            .lock()
            .await
            .streams
            .remove(&SessionId::from(session_id));
    }

    /// Makes the next `count` subscribe calls fail with a transport error.
    pub async fn fail_next_subscribes(&self, count: usize) {
        self.state.lock().await.failures_left = count;
    }

    /// Number of successful subscribe calls for the session.
    pub async fn subscribe_count(&self, session_id: &str) -> usize {
        self.state
            .lock()
            .await
            .subscribes
            .get(&SessionId::from(session_id))
            .copied()
            .unwrap_or(0)
    }

    /// Waits until the session has been subscribed at least `count` times.
    pub async fn wait_for_subscribes(&self, session_id: &str, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.subscribe_count(session_id).await >= count {
                return;
            }
            notified.await;
        }
    }

    async fn send(&self, session_id: &str, item: Result<RawEvent, WeftError>) -> bool {
        let state = self.state.lock().await;
        match state.streams.get(&SessionId::from(session_id)) {
            Some(sender) => sender.unbounded_send(item).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl EventTransport for MockTransport {
    async fn subscribe(&self, session_id: &SessionId) -> Result<EventStream, WeftError> {
        let mut state = self.state.lock().await;
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(WeftError::transport("mock transport refused to connect"));
        }

        let (tx, rx) = unbounded();
        state.streams.insert(session_id.clone(), tx);
        *state.subscribes.entry(session_id.clone()).or_default() += 1;
        drop(state);
        self.notify.notify_waiters();

        Ok(Box::pin(rx))
    }
}
