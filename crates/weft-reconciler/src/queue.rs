// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Projection of the server-side message queue.
//!
//! Each `queue.updated` replaces the snapshot wholesale; nothing is patched.

use std::sync::Arc;

use weft_core::QueueState;

#[derive(Debug, Clone, Default)]
pub struct QueueProjection {
    state: Arc<QueueState>,
}

impl QueueProjection {
    pub fn snapshot(&self) -> Arc<QueueState> {
        Arc::clone(&self.state)
    }

    /// Installs a new snapshot. Returns `false` when it equals the current one.
    pub fn replace(&mut self, next: QueueState) -> bool {
        if *self.state == next {
            return false;
        }
        self.state = Arc::new(next);
        true
    }

    /// The message currently being generated, if any.
    pub fn current(&self) -> Option<&str> {
        self.state.current_message_id.as_deref()
    }

    /// Queue position of a waiting message.
    pub fn position_of(&self, message_id: &str) -> Option<u32> {
        self.state
            .queued_messages
            .iter()
            .find(|q| q.message_id == message_id)
            .map(|q| q.position)
    }
}
