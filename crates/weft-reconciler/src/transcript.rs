// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Copy-on-write message collection for one session.
//!
//! The outer list and every message are behind `Arc`, so a reader holding a
//! snapshot never observes a mutation, and a mutation clones only the list of
//! pointers plus the one message it touches.

use std::sync::Arc;

use weft_core::{Message, MessageStatus, Role};

/// Shared, immutable view of a session's messages in server order.
pub type MessageList = Arc<Vec<Arc<Message>>>;

/// The canonical message collection owned by a reconciler.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: MessageList,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Cheap to clone; unchanged until the next mutation.
    pub fn snapshot(&self) -> MessageList {
        Arc::clone(&self.messages)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.id == message_id)
            .map(|m| m.as_ref())
    }

    pub fn position(&self, message_id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Message> {
        self.messages.iter().map(|m| m.as_ref())
    }

    /// Mutable access to the message at `index`, cloning shared storage first.
    ///
    /// Callers must check the index is valid and that a change will actually
    /// happen; calling this always breaks sharing with outstanding snapshots.
    pub fn message_mut(&mut self, index: usize) -> Option<&mut Message> {
        let list = Arc::make_mut(&mut self.messages);
        list.get_mut(index).map(Arc::make_mut)
    }

    /// Appends a message unless one with the same id already exists.
    pub fn insert(&mut self, message: Message) -> bool {
        if self.position(&message.id).is_some() {
            return false;
        }
        Arc::make_mut(&mut self.messages).push(Arc::new(message));
        true
    }

    /// Replaces the whole collection with an authoritative snapshot.
    pub fn replace(&mut self, mut messages: Vec<Message>) {
        for message in &mut messages {
            message.parts.sort_by(|a, b| a.render_order(b));
        }
        self.messages = Arc::new(messages.into_iter().map(Arc::new).collect());
    }

    /// Index of the last assistant message that is still generating.
    pub fn last_open_assistant(&self) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|m| m.role == Role::Assistant && m.status != MessageStatus::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assistant(id: &str, status: MessageStatus) -> Message {
        let mut message = Message::new(id, Role::Assistant);
        message.status = status;
        message
    }

    #[test]
    fn snapshot_is_unaffected_by_later_mutation() {
        let mut transcript = Transcript::new();
        transcript.insert(assistant("m1", MessageStatus::Pending));
        let before = transcript.snapshot();

        if let Some(message) = transcript.message_mut(0) {
            message.status = MessageStatus::Complete;
        }

        assert_eq!(before[0].status, MessageStatus::Pending);
        assert_eq!(transcript.get("m1").map(|m| m.status), Some(MessageStatus::Complete));
        assert!(!Arc::ptr_eq(&before, &transcript.snapshot()));
    }

    #[test]
    fn untouched_messages_stay_shared() {
        let mut transcript = Transcript::new();
        transcript.insert(assistant("m1", MessageStatus::Pending));
        transcript.insert(assistant("m2", MessageStatus::Pending));
        let before = transcript.snapshot();

        transcript.message_mut(1);

        let after = transcript.snapshot();
        assert!(Arc::ptr_eq(&before[0], &after[0]));
    }

    #[test]
    fn insert_ignores_duplicate_ids() {
        let mut transcript = Transcript::new();
        assert!(transcript.insert(assistant("m1", MessageStatus::Pending)));
        assert!(!transcript.insert(assistant("m1", MessageStatus::Complete)));
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn last_open_assistant_skips_complete_and_user_messages() {
        let mut transcript = Transcript::new();
        transcript.insert(assistant("a1", MessageStatus::Pending));
        transcript.insert(assistant("a2", MessageStatus::Complete));
        transcript.insert(Message::new("u1", Role::User));
        assert_eq!(transcript.last_open_assistant(), Some(0));
    }
}
