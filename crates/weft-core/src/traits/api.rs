// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST collaborator trait: history fetch and approval/payment commands.

use async_trait::async_trait;

use crate::error::WeftError;
use crate::types::{Message, PendingToolApproval, SessionId, TopupMethod};

/// The durable session store, reached over its REST surface.
///
/// The store is the source of truth; the reconciler is a read-through overlay.
#[async_trait]
pub trait SessionApi: Send + Sync + 'static {
    /// Fetches the full, authoritative message history of a session.
    async fn fetch_messages(&self, session_id: &SessionId) -> Result<Vec<Message>, WeftError>;

    /// Fetches the tool approvals the server is still waiting on.
    async fn pending_approvals(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<PendingToolApproval>, WeftError>;

    /// Approves (`approved = true`) or rejects a pending tool call.
    async fn resolve_tool_call(
        &self,
        session_id: &SessionId,
        call_id: &str,
        approved: bool,
    ) -> Result<(), WeftError>;

    /// Chooses the funding path for the session's pending top-up.
    async fn select_topup_method(
        &self,
        session_id: &SessionId,
        method: TopupMethod,
    ) -> Result<(), WeftError>;

    /// Abandons the session's pending top-up.
    async fn cancel_topup(
        &self,
        session_id: &SessionId,
        reason: Option<&str>,
    ) -> Result<(), WeftError>;
}
