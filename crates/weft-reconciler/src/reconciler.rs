// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session reconciler: the single entry point for events, resync results,
//! and locally confirmed user actions.
//!
//! A `Reconciler` owns every projection of one session (messages, approvals,
//! top-up, queue). Local mutation is an optimistic fast path; events in the
//! invalidating set also request a throttled authoritative resync, which the
//! owner performs and hands back through [`Reconciler::apply_resync`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, trace, warn};
use weft_config::{TopupConfig, WeftConfig};
use weft_core::{
    Clock, Message, MessageStatus, PendingToolApproval, QueueState, RawEvent, Role, SessionId,
    TopupMethod, WeftError,
};

use crate::approval::{ApprovalBook, ApprovalList};
use crate::delta::apply_delta;
use crate::ephemeral::{clear_ephemeral_for, remove_ephemeral, upsert_ephemeral};
use crate::event::SessionEvent;
use crate::queue::QueueProjection;
use crate::throttle::{ResyncThrottle, ThrottleDecision};
use crate::topup::TopupState;
use crate::transcript::{MessageList, Transcript};
use crate::update::{Listener, ListenerId, Listeners, Notice, NoticeLevel, SyncUpdate};

/// Tunables taken from configuration.
#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    pub resync_window: Duration,
    pub topup: TopupConfig,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self::from_config(&WeftConfig::default())
    }
}

impl ReconcilerOptions {
    pub fn from_config(config: &WeftConfig) -> Self {
        Self {
            resync_window: config.resync.window(),
            topup: config.topup.clone(),
        }
    }
}

/// Identifies one authoritative refetch. Later tickets supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResyncTicket {
    seq: u64,
}

impl ResyncTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Result of a throttled resync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncDecision {
    /// Fetch now and report back with this ticket.
    Fire(ResyncTicket),
    /// Coalesced; the current window ends at `window_ends_at`.
    Suppressed { window_ends_at: Instant },
}

/// What a single dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dispatched {
    /// The event was recognized, well formed, and the reconciler is live.
    pub handled: bool,
    /// Set when the event belongs to the invalidating set.
    pub resync: Option<ResyncDecision>,
}

pub struct Reconciler {
    session_id: SessionId,
    options: ReconcilerOptions,
    clock: Arc<dyn Clock>,
    transcript: Transcript,
    approvals: ApprovalBook,
    topup: Arc<TopupState>,
    queue: QueueProjection,
    active_assistant: Option<String>,
    throttle: ResyncThrottle,
    next_seq: u64,
    last_applied: Option<u64>,
    listeners: Listeners,
    detached: bool,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("session_id", &self.session_id)
            .field("messages", &self.transcript.len())
            .field("approvals", &self.approvals.len())
            .field("active_assistant", &self.active_assistant)
            .field("last_applied", &self.last_applied)
            .field("detached", &self.detached)
            .finish()
    }
}

impl Reconciler {
    pub fn new(session_id: SessionId, options: ReconcilerOptions, clock: Arc<dyn Clock>) -> Self {
        let throttle = ResyncThrottle::new(options.resync_window);
        Self {
            session_id,
            options,
            clock,
            transcript: Transcript::new(),
            approvals: ApprovalBook::new(),
            topup: Arc::new(TopupState::default()),
            queue: QueueProjection::default(),
            active_assistant: None,
            throttle,
            next_seq: 0,
            last_applied: None,
            listeners: Listeners::default(),
            detached: false,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn messages(&self) -> MessageList {
        self.transcript.snapshot()
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.transcript.get(message_id)
    }

    pub fn approvals(&self) -> ApprovalList {
        self.approvals.snapshot()
    }

    /// Pending call ids for one message, or for the whole session.
    pub fn pending_call_ids(&self, message_id: Option<&str>) -> Vec<String> {
        self.approvals.pending_call_ids(message_id)
    }

    pub fn topup(&self) -> Arc<TopupState> {
        Arc::clone(&self.topup)
    }

    pub fn queue(&self) -> Arc<QueueState> {
        self.queue.snapshot()
    }

    pub fn active_assistant(&self) -> Option<&str> {
        self.active_assistant.as_deref()
    }

    /// Sequence number of the last applied resync, if any.
    pub fn last_applied_seq(&self) -> Option<u64> {
        self.last_applied
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn subscribe(&mut self, listener: Listener) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Stops all further mutation. Late resync results are discarded quietly.
    pub fn detach(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        self.listeners.clear();
        self.throttle.reset(&self.session_id);
        debug!(session_id = %self.session_id, "reconciler detached");
    }

    pub fn handle_raw(&mut self, event: &RawEvent) -> Dispatched {
        self.handle(&event.event_type, &event.payload)
    }

    /// Decodes and dispatches one transport event. Never fails: unknown and
    /// malformed events are logged and dropped.
    pub fn handle(&mut self, event_type: &str, payload: &Value) -> Dispatched {
        match SessionEvent::decode(event_type, payload) {
            Ok(Some(event)) => self.apply(event),
            Ok(None) => {
                trace!(session_id = %self.session_id, event_type, "ignoring unrecognized event");
                Dispatched::default()
            }
            Err(e) => {
                debug!(session_id = %self.session_id, event_type, error = %e, "dropped malformed event");
                Dispatched::default()
            }
        }
    }

    /// Applies a decoded event.
    pub fn apply(&mut self, event: SessionEvent) -> Dispatched {
        if self.detached {
            return Dispatched::default();
        }
        let invalidates = event.invalidates();
        let now_ms = self.clock.epoch_millis();

        match event {
            SessionEvent::MessageCreated(created) => {
                if created.role == Role::Assistant {
                    self.active_assistant = Some(created.id.clone());
                }
                let mut message = Message::new(created.id, created.role);
                message.session_id = self.session_id.to_string();
                message.agent = created.agent.unwrap_or_default();
                message.provider = created.provider.unwrap_or_default();
                message.model = created.model.unwrap_or_default();
                message.created_at = created.created_at.unwrap_or(now_ms);
                if self.transcript.insert(message) {
                    self.emit(SyncUpdate::Messages);
                }
            }
            SessionEvent::MessageCompleted { id } => {
                if self.active_assistant.as_deref() == Some(id.as_str()) {
                    self.active_assistant = None;
                }
                if self.complete_message(&id, now_ms) {
                    self.emit(SyncUpdate::Messages);
                }
            }
            SessionEvent::PartDelta { kind, delta } => {
                if apply_delta(&mut self.transcript, kind, &delta, now_ms) {
                    self.emit(SyncUpdate::Messages);
                }
            }
            SessionEvent::ToolInput(call) => {
                let active = self.active_assistant.clone();
                if upsert_ephemeral(&mut self.transcript, &call, active.as_deref(), now_ms) {
                    self.emit(SyncUpdate::Messages);
                }
            }
            SessionEvent::ToolResult { call_id } => {
                if remove_ephemeral(&mut self.transcript, &call_id) {
                    self.emit(SyncUpdate::Messages);
                }
            }
            SessionEvent::StepFinished => {}
            SessionEvent::ApprovalRequired(required) => {
                if !self.has_tool_call(&required.call_id) {
                    debug!(
                        session_id = %self.session_id,
                        call_id = %required.call_id,
                        "approval arrived before its tool call"
                    );
                }
                let added = self.approvals.add(PendingToolApproval {
                    call_id: required.call_id,
                    tool_name: required.tool_name,
                    args: required.args,
                    message_id: required.message_id,
                    created_at: now_ms,
                });
                if added {
                    self.emit(SyncUpdate::Approvals);
                }
            }
            SessionEvent::ApprovalUpdated { call_id, args } => {
                if self.approvals.update_args(&call_id, args) {
                    self.emit(SyncUpdate::Approvals);
                }
            }
            SessionEvent::ApprovalResolved { call_id } => {
                if self.approvals.resolve(&call_id) {
                    self.emit(SyncUpdate::Approvals);
                }
            }
            SessionEvent::TopupRequired(required) => {
                let session_id = self.session_id.to_string();
                let defaults = self.options.topup.clone();
                self.update_topup(|state| {
                    state.require(&session_id, &required, &defaults);
                    None
                });
            }
            SessionEvent::TopupMethodSelected { method } => {
                self.update_topup(|state| state.select_method(method));
            }
            SessionEvent::TopupCancelled { reason } => {
                self.cancel_topup(reason.as_deref());
            }
            SessionEvent::PaymentRequired { amount_usd } => {
                self.update_topup(|state| state.payment_required(amount_usd));
            }
            SessionEvent::PaymentSigning => {
                self.update_topup(|state| Some(state.signing()));
            }
            SessionEvent::PaymentComplete(payment) => {
                let config = self.options.topup.clone();
                self.update_topup(|state| Some(state.complete(&payment, &config)));
            }
            SessionEvent::PaymentError { error } => {
                self.update_topup(|state| Some(state.failed(error.as_deref())));
            }
            SessionEvent::FiatCheckoutCreated => {
                self.update_topup(|state| Some(state.fiat_checkout_created()));
            }
            SessionEvent::Error {
                message_id,
                call_id,
            } => {
                let mut changed = false;
                if let Some(call_id) = call_id {
                    changed |= remove_ephemeral(&mut self.transcript, &call_id);
                }
                if let Some(message_id) = message_id {
                    changed |= clear_ephemeral_for(&mut self.transcript, &message_id);
                }
                if changed {
                    self.emit(SyncUpdate::Messages);
                }
            }
            SessionEvent::QueueUpdated(queue) => {
                if self.queue.replace(queue) {
                    self.emit(SyncUpdate::Queue);
                }
            }
        }

        Dispatched {
            handled: true,
            resync: invalidates.then(|| self.request_resync()),
        }
    }

    /// Requests an authoritative refetch, fired on the leading edge of the window.
    pub fn request_resync(&mut self) -> ResyncDecision {
        match self.throttle.request(&self.session_id, self.clock.now()) {
            ThrottleDecision::Fire => ResyncDecision::Fire(self.begin_resync()),
            ThrottleDecision::Suppressed { window_ends_at } => {
                trace!(session_id = %self.session_id, "resync coalesced");
                ResyncDecision::Suppressed { window_ends_at }
            }
        }
    }

    /// Fires the deferred trailing-edge resync. The fire opens a new throttle
    /// window, so an invalidation right after it is coalesced.
    pub fn fire_trailing(&mut self) -> ResyncTicket {
        self.throttle.claim(&self.session_id, self.clock.now());
        self.begin_resync()
    }

    /// Issues a resync ticket without consulting the throttle. Used for the
    /// initial load and for retries.
    pub fn begin_resync(&mut self) -> ResyncTicket {
        self.next_seq += 1;
        let ticket = ResyncTicket { seq: self.next_seq };
        self.emit(SyncUpdate::ResyncRequested { seq: ticket.seq });
        ticket
    }

    /// True when `ticket` is the newest one issued.
    pub fn is_latest(&self, ticket: ResyncTicket) -> bool {
        ticket.seq == self.next_seq
    }

    /// Installs an authoritative snapshot as a full replacement.
    ///
    /// Returns `false` when the reconciler is detached or a newer snapshot
    /// has already been applied.
    pub fn apply_resync(&mut self, ticket: ResyncTicket, messages: Vec<Message>) -> bool {
        if self.detached {
            trace!(session_id = %self.session_id, seq = ticket.seq, "resync for detached session discarded");
            return false;
        }
        if self.last_applied.is_some_and(|applied| applied >= ticket.seq) {
            debug!(session_id = %self.session_id, seq = ticket.seq, "stale resync discarded");
            return false;
        }
        self.transcript.replace(messages);
        self.last_applied = Some(ticket.seq);
        debug!(
            session_id = %self.session_id,
            seq = ticket.seq,
            messages = self.transcript.len(),
            "resync applied"
        );
        self.emit(SyncUpdate::Messages);
        self.emit(SyncUpdate::ResyncApplied { seq: ticket.seq });
        true
    }

    /// Records a failed refetch. Local state is left exactly as it was.
    pub fn resync_failed(&mut self, ticket: ResyncTicket, error: &WeftError) {
        if self.detached {
            return;
        }
        warn!(session_id = %self.session_id, seq = ticket.seq, error = %error, "resync failed");
        self.emit(SyncUpdate::ResyncFailed {
            seq: ticket.seq,
            error: error.to_string(),
        });
    }

    /// Replaces pending approvals with the server's list.
    pub fn replace_approvals(&mut self, approvals: Vec<PendingToolApproval>) {
        if self.detached {
            return;
        }
        self.approvals.replace_all(approvals);
        self.emit(SyncUpdate::Approvals);
    }

    /// Removes a pending approval after the server accepted its resolution.
    pub fn resolve_approval(&mut self, call_id: &str) -> bool {
        if self.detached || !self.approvals.resolve(call_id) {
            return false;
        }
        self.emit(SyncUpdate::Approvals);
        true
    }

    /// Records a funding method the server accepted.
    pub fn select_topup_method(&mut self, method: TopupMethod) {
        if self.detached {
            return;
        }
        self.update_topup(|state| state.select_method(method));
    }

    /// Clears the pending top-up and reports the reason. Safe when idle.
    pub fn cancel_topup(&mut self, reason: Option<&str>) -> String {
        let mut reported = String::new();
        if self.detached {
            return reason.unwrap_or(crate::topup::DEFAULT_CANCEL_REASON).to_string();
        }
        self.update_topup(|state| {
            reported = state.cancel(reason);
            None
        });
        self.emit(SyncUpdate::TopupCancelled {
            reason: reported.clone(),
        });
        self.emit(SyncUpdate::Notice(Notice::new(
            NoticeLevel::Warning,
            reported.clone(),
        )));
        reported
    }

    fn complete_message(&mut self, message_id: &str, now_ms: i64) -> bool {
        let Some(index) = self.transcript.position(message_id) else {
            debug!(session_id = %self.session_id, message_id, "completion for unknown message");
            return false;
        };
        let unchanged = self.transcript.get(message_id).is_some_and(|m| {
            m.status == MessageStatus::Complete && m.completed_at.is_some() && !m.has_ephemeral_parts()
        });
        if unchanged {
            return false;
        }
        match self.transcript.message_mut(index) {
            Some(message) => {
                message.status = MessageStatus::Complete;
                message.completed_at.get_or_insert(now_ms);
                message.parts.retain(|part| !part.ephemeral);
                true
            }
            None => false,
        }
    }

    fn has_tool_call(&self, call_id: &str) -> bool {
        self.transcript.iter().any(|message| {
            message
                .parts
                .iter()
                .any(|part| part.tool_call_id.as_deref() == Some(call_id))
        })
    }

    fn update_topup<F>(&mut self, f: F)
    where
        F: FnOnce(&mut TopupState) -> Option<Notice>,
    {
        let mut next = (*self.topup).clone();
        let notice = f(&mut next);
        if next != *self.topup {
            self.topup = Arc::new(next);
            self.emit(SyncUpdate::Topup);
        }
        if let Some(notice) = notice {
            self.emit(SyncUpdate::Notice(notice));
        }
    }

    fn emit(&mut self, update: SyncUpdate) {
        if !self.detached {
            self.listeners.notify(&update);
        }
    }
}
