// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caller-facing handle to a running session subscription.

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use weft_core::{SessionId, TopupMethod, WeftError};
use weft_reconciler::SyncUpdate;

use crate::command::{BulkApproval, CommandOutcome, Responder, SessionCommand};
use crate::snapshot::SessionSnapshot;

/// Cloneable handle to one session driver.
///
/// Commands resolve only after the driver has applied their local effect, so
/// a snapshot read right after `approve(..)` returns already reflects it.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
    updates: broadcast::Sender<SyncUpdate>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub(crate) fn new(
        session_id: SessionId,
        commands: mpsc::Sender<SessionCommand>,
        snapshots: watch::Receiver<SessionSnapshot>,
        updates: broadcast::Sender<SyncUpdate>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            commands,
            snapshots,
            updates,
            cancel,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that wakes on every published change.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Change notifications and notices, in the order the driver emitted them.
    pub fn updates(&self) -> broadcast::Receiver<SyncUpdate> {
        self.updates.subscribe()
    }

    pub async fn approve(&self, call_id: &str) -> Result<(), WeftError> {
        self.resolve(call_id, true).await
    }

    pub async fn reject(&self, call_id: &str) -> Result<(), WeftError> {
        self.resolve(call_id, false).await
    }

    async fn resolve(&self, call_id: &str, approved: bool) -> Result<(), WeftError> {
        self.request(|reply| SessionCommand::Resolve {
            call_id: call_id.to_string(),
            approved,
            reply,
        })
        .await
        .map(|_| ())
    }

    /// Approves every pending call, optionally only those of one message.
    /// Calls the server rejects stay pending and are listed in the result.
    pub async fn approve_all(&self, message_id: Option<&str>) -> Result<BulkApproval, WeftError> {
        let outcome = self
            .request(|reply| SessionCommand::ApproveAll {
                message_id: message_id.map(str::to_string),
                reply,
            })
            .await?;
        match outcome {
            CommandOutcome::Bulk(report) => Ok(report),
            other => Err(WeftError::Internal(format!(
                "unexpected outcome for bulk approval: {other:?}"
            ))),
        }
    }

    pub async fn select_topup_method(&self, method: TopupMethod) -> Result<(), WeftError> {
        self.request(|reply| SessionCommand::SelectTopupMethod { method, reply })
            .await
            .map(|_| ())
    }

    /// Cancels the pending top-up on the server, then locally.
    /// Returns the reason reported to listeners.
    pub async fn cancel_topup(&self, reason: Option<&str>) -> Result<String, WeftError> {
        let outcome = self
            .request(|reply| SessionCommand::CancelTopup {
                reason: reason.map(str::to_string),
                reply,
            })
            .await?;
        match outcome {
            CommandOutcome::Cancelled(reason) => Ok(reason),
            other => Err(WeftError::Internal(format!(
                "unexpected outcome for top-up cancel: {other:?}"
            ))),
        }
    }

    /// Starts an unthrottled resync. Returns once it is scheduled.
    pub async fn resync(&self) -> Result<(), WeftError> {
        self.request(|reply| SessionCommand::Resync { reply })
            .await
            .map(|_| ())
    }

    /// Stops the driver. Further commands fail with `SubscriptionClosed`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.commands.is_closed()
    }

    fn closed(&self) -> WeftError {
        WeftError::SubscriptionClosed(self.session_id.to_string())
    }

    async fn request(
        &self,
        build: impl FnOnce(Responder) -> SessionCommand,
    ) -> Result<CommandOutcome, WeftError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())?
    }
}
