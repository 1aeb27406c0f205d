// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change notifications and the listener registry.

use std::fmt;

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    /// An operation is in progress; a later notice supersedes it.
    Loading,
    Success,
    Warning,
    Error,
}

/// A user-visible side effect of the payment sub-protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub link: Option<String>,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.text)?;
        if let Some(link) = &self.link {
            write!(f, " ({link})")?;
        }
        Ok(())
    }
}

/// What changed in a reconciler. Read the new state through its views.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncUpdate {
    Messages,
    Approvals,
    Topup,
    Queue,
    /// A throttled resync fired; the caller should fetch and apply it.
    ResyncRequested { seq: u64 },
    ResyncApplied { seq: u64 },
    ResyncFailed { seq: u64, error: String },
    /// A pending top-up was cancelled with this reason.
    TopupCancelled { reason: String },
    Notice(Notice),
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Box<dyn FnMut(&SyncUpdate) + Send>;

/// Registered observers, notified in registration order.
#[derive(Default)]
pub struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

impl Listeners {
    pub fn add(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn notify(&mut self, update: &SyncUpdate) {
        for (_, listener) in &mut self.entries {
            listener(update);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn removed_listener_stops_receiving() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::default();
        let sink = Arc::clone(&seen);
        let id = listeners.add(Box::new(move |u: &SyncUpdate| {
            sink.lock().unwrap().push(u.clone());
        }));

        listeners.notify(&SyncUpdate::Messages);
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.notify(&SyncUpdate::Queue);

        assert_eq!(*seen.lock().unwrap(), vec![SyncUpdate::Messages]);
    }

    #[test]
    fn notice_display_includes_link() {
        let notice = Notice::new(NoticeLevel::Success, "Paid $1.00").with_link("https://x/tx/1");
        assert_eq!(notice.to_string(), "[success] Paid $1.00 (https://x/tx/1)");
    }
}
