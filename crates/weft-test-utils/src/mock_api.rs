// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock REST surface with scripted responses and recorded calls.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use weft_core::{Message, PendingToolApproval, SessionApi, SessionId, TopupMethod, WeftError};

/// One call made against the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    FetchMessages(String),
    PendingApprovals(String),
    Resolve {
        session_id: String,
        call_id: String,
        approved: bool,
    },
    SelectTopup {
        session_id: String,
        method: TopupMethod,
    },
    CancelTopup {
        session_id: String,
        reason: Option<String>,
    },
}

#[derive(Default)]
struct ApiState {
    messages: HashMap<SessionId, Vec<Message>>,
    pending: HashMap<SessionId, Vec<PendingToolApproval>>,
    fetch_failures: usize,
    pending_failures: usize,
    failing_calls: HashSet<String>,
    fail_topup: bool,
    fetch_delay: Option<Duration>,
    calls: Vec<ApiCall>,
}

/// A scriptable [`SessionApi`]. Unknown sessions have empty history.
#[derive(Clone, Default)]
pub struct MockSessionApi {
    state: Arc<Mutex<ApiState>>,
}

impl MockSessionApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets what the next history fetch for the session returns.
    pub async fn set_messages(&self, session_id: &str, messages: Vec<Message>) {
        self.state
            .lock()
            .await
            .messages
            .insert(SessionId::from(session_id), messages);
    }

    pub async fn set_pending(&self, session_id: &str, pending: Vec<PendingToolApproval>) {
        self.state
            .lock()
            .await
            .pending
            .insert(SessionId::from(session_id), pending);
    }

    /// The next `count` history fetches fail with a 503.
    pub async fn fail_fetches(&self, count: usize) {
        self.state.lock().await.fetch_failures = count;
    }

    /// The next `count` pending-approval fetches fail with a 503.
    pub async fn fail_pending_approvals(&self, count: usize) {
        self.state.lock().await.pending_failures = count;
    }

    /// Resolving this call id fails with a 409.
    pub async fn fail_call(&self, call_id: &str) {
        self.state.lock().await.failing_calls.insert(call_id.to_string());
    }

    /// Top-up select and cancel fail with a 500 while set.
    pub async fn fail_topup_commands(&self, fail: bool) {
        self.state.lock().await.fail_topup = fail;
    }

    /// Delays every history fetch, to hold a resync in flight.
    pub async fn set_fetch_delay(&self, delay: Option<Duration>) {
        self.state.lock().await.fetch_delay = delay;
    }

    pub async fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn fetch_count(&self, session_id: &str) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| matches!(call, ApiCall::FetchMessages(id) if id == session_id))
            .count()
    }
}

#[async_trait]
impl SessionApi for MockSessionApi {
    async fn fetch_messages(&self, session_id: &SessionId) -> Result<Vec<Message>, WeftError> {
        let (delay, result) = {
            let mut state = self.state.lock().await;
            state
                .calls
                .push(ApiCall::FetchMessages(session_id.to_string()));
            let result = if state.fetch_failures > 0 {
                state.fetch_failures -= 1;
                Err(WeftError::api("server returned 503", Some(503)))
            } else {
                Ok(state.messages.get(session_id).cloned().unwrap_or_default())
            };
            (state.fetch_delay, result)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn pending_approvals(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<PendingToolApproval>, WeftError> {
        let mut state = self.state.lock().await;
        state
            .calls
            .push(ApiCall::PendingApprovals(session_id.to_string()));
        if state.pending_failures > 0 {
            state.pending_failures -= 1;
            return Err(WeftError::api("server returned 503", Some(503)));
        }
        Ok(state.pending.get(session_id).cloned().unwrap_or_default())
    }

    async fn resolve_tool_call(
        &self,
        session_id: &SessionId,
        call_id: &str,
        approved: bool,
    ) -> Result<(), WeftError> {
        let mut state = self.state.lock().await;
        state.calls.push(ApiCall::Resolve {
            session_id: session_id.to_string(),
            call_id: call_id.to_string(),
            approved,
        });
        if state.failing_calls.contains(call_id) {
            return Err(WeftError::api("server returned 409: already resolved", Some(409)));
        }
        if let Some(pending) = state.pending.get_mut(session_id) {
            pending.retain(|approval| approval.call_id != call_id);
        }
        Ok(())
    }

    async fn select_topup_method(
        &self,
        session_id: &SessionId,
        method: TopupMethod,
    ) -> Result<(), WeftError> {
        let mut state = self.state.lock().await;
        state.calls.push(ApiCall::SelectTopup {
            session_id: session_id.to_string(),
            method,
        });
        if state.fail_topup {
            return Err(WeftError::api("server returned 500", Some(500)));
        }
        Ok(())
    }

    async fn cancel_topup(
        &self,
        session_id: &SessionId,
        reason: Option<&str>,
    ) -> Result<(), WeftError> {
        let mut state = self.state.lock().await;
        state.calls.push(ApiCall::CancelTopup {
            session_id: session_id.to_string(),
            reason: reason.map(str::to_string),
        });
        if state.fail_topup {
            return Err(WeftError::api("server returned 500", Some(500)));
        }
        Ok(())
    }
}
