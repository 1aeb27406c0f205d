// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only view of a session published after every change.

use std::sync::Arc;

use weft_core::{QueueState, SessionId};
use weft_reconciler::{ApprovalList, MessageList, Reconciler, TopupState};

/// Everything a renderer needs for one session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub messages: MessageList,
    pub approvals: ApprovalList,
    pub topup: Arc<TopupState>,
    pub queue: Arc<QueueState>,
    /// The event stream is currently open.
    pub connected: bool,
    /// Sequence of the last applied authoritative resync.
    pub resync_seq: Option<u64>,
    /// The initial pending-approval fetch has finished, successfully or not.
    pub approvals_loaded: bool,
}

impl SessionSnapshot {
    pub(crate) fn capture(reconciler: &Reconciler, connected: bool, approvals_loaded: bool) -> Self {
        Self {
            session_id: reconciler.session_id().clone(),
            messages: reconciler.messages(),
            approvals: reconciler.approvals(),
            topup: reconciler.topup(),
            queue: reconciler.queue(),
            connected,
            resync_seq: reconciler.last_applied_seq(),
            approvals_loaded,
        }
    }

    /// True when `other` shares every projection with `self`.
    pub fn same_as(&self, other: &SessionSnapshot) -> bool {
        Arc::ptr_eq(&self.messages, &other.messages)
            && Arc::ptr_eq(&self.approvals, &other.approvals)
            && Arc::ptr_eq(&self.topup, &other.topup)
            && Arc::ptr_eq(&self.queue, &other.queue)
            && self.connected == other.connected
            && self.resync_seq == other.resync_seq
            && self.approvals_loaded == other.approvals_loaded
    }
}
