// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-subscription driver task.
//!
//! One task owns one [`Reconciler`] and is the only place it is mutated. The
//! task multiplexes four inputs with `tokio::select!`: transport events, user
//! commands, completions of REST calls it spawned, and cancellation. Every
//! REST call runs in its own task and reports back over an internal channel,
//! so a slow fetch never stalls event delivery.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use weft_config::WeftConfig;
use weft_core::{
    Clock, EventStream, EventTransport, Message, PendingToolApproval, RawEvent, SessionApi,
    SessionId, TopupMethod, WeftError,
};
use weft_reconciler::{
    Dispatched, Reconciler, ReconcilerOptions, ResyncDecision, ResyncTicket, SyncUpdate,
};

use crate::command::{BulkApproval, CommandOutcome, Responder, SessionCommand};
use crate::handle::SessionHandle;
use crate::snapshot::SessionSnapshot;

/// Driver tunables, normally derived from [`WeftConfig`].
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub reconciler: ReconcilerOptions,
    /// Fire one deferred resync at the end of a window that suppressed requests.
    pub trailing_edge: bool,
    pub resync_retry_delay: Duration,
    pub resync_max_retries: u32,
    /// First reconnect delay; doubles per failed attempt up to `reconnect_max_delay`.
    pub reconnect_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub command_buffer: usize,
    pub update_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::from_config(&WeftConfig::default())
    }
}

impl DriverConfig {
    pub fn from_config(config: &WeftConfig) -> Self {
        Self {
            reconciler: ReconcilerOptions::from_config(config),
            trailing_edge: config.resync.trailing_edge,
            resync_retry_delay: config.resync.retry_delay(),
            resync_max_retries: config.resync.max_retries,
            reconnect_delay: config.resync.retry_delay(),
            reconnect_max_delay: Duration::from_secs(30),
            command_buffer: 64,
            update_capacity: 256,
        }
    }
}

/// Completions reported back to the driver by the tasks it spawns.
enum Internal {
    ResyncDone {
        ticket: ResyncTicket,
        attempt: u32,
        result: Result<Vec<Message>, WeftError>,
    },
    ApprovalsLoaded {
        initial: bool,
        result: Result<Vec<PendingToolApproval>, WeftError>,
    },
    /// The server accepted a resolution for this call.
    Resolved { call_id: String },
    TopupSelected { method: TopupMethod },
    TopupCancelled {
        reason: Option<String>,
        reply: Responder,
    },
    Reply {
        outcome: Result<CommandOutcome, WeftError>,
        reply: Responder,
    },
}

pub(crate) struct SessionDriver {
    session_id: SessionId,
    reconciler: Reconciler,
    transport: Arc<dyn EventTransport>,
    api: Arc<dyn SessionApi>,
    clock: Arc<dyn Clock>,
    config: DriverConfig,
    stream: Option<EventStream>,
    commands: mpsc::Receiver<SessionCommand>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    snapshots: watch::Sender<SessionSnapshot>,
    cancel: CancellationToken,
    deferred_resync: Option<Instant>,
    reconnect_at: Option<Instant>,
    reconnect_delay: Duration,
    approvals_loaded: bool,
}

impl SessionDriver {
    /// Spawns the driver for an already opened event stream.
    pub(crate) fn spawn(
        session_id: SessionId,
        stream: EventStream,
        transport: Arc<dyn EventTransport>,
        api: Arc<dyn SessionApi>,
        clock: Arc<dyn Clock>,
        config: DriverConfig,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (command_tx, commands) = mpsc::channel(config.command_buffer.max(1));
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(config.update_capacity.max(1));
        let cancel = CancellationToken::new();

        let mut reconciler = Reconciler::new(
            session_id.clone(),
            config.reconciler.clone(),
            Arc::clone(&clock),
        );
        let forward = updates.clone();
        reconciler.subscribe(Box::new(move |update: &SyncUpdate| {
            // No receivers is fine; snapshots still carry the state.
            let _ = forward.send(update.clone());
        }));

        let (snapshots, snapshot_rx) =
            watch::channel(SessionSnapshot::capture(&reconciler, true, false));

        let handle = SessionHandle::new(
            session_id.clone(),
            command_tx,
            snapshot_rx,
            updates,
            cancel.clone(),
        );

        let reconnect_delay = config.reconnect_delay;
        let driver = SessionDriver {
            session_id,
            reconciler,
            transport,
            api,
            clock,
            config,
            stream: Some(stream),
            commands,
            internal_tx,
            internal_rx,
            snapshots,
            cancel,
            deferred_resync: None,
            reconnect_at: None,
            reconnect_delay,
            approvals_loaded: false,
        };

        (handle, tokio::spawn(driver.run()))
    }

    async fn run(mut self) {
        info!(session_id = %self.session_id, "session driver started");
        self.start_resync();
        self.load_approvals(true);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!(session_id = %self.session_id, "subscription cancelled");
                    break;
                }
                Some(internal) = self.internal_rx.recv() => self.on_internal(internal),
                item = next_event(&mut self.stream), if self.stream.is_some() => match item {
                    Some(Ok(event)) => self.on_event(&event),
                    Some(Err(e)) => {
                        warn!(session_id = %self.session_id, error = %e, "event stream failed");
                        self.disconnect();
                    }
                    None => {
                        info!(session_id = %self.session_id, "event stream ended");
                        self.disconnect();
                    }
                },
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => {
                        debug!(session_id = %self.session_id, "all handles dropped");
                        break;
                    }
                },
                _ = sleep_until(self.deferred_resync), if self.deferred_resync.is_some() => {
                    // Trailing edge of a window that coalesced requests.
                    self.deferred_resync = None;
                    let ticket = self.reconciler.fire_trailing();
                    self.spawn_resync(ticket, 0, None);
                }
                _ = sleep_until(self.reconnect_at), if self.reconnect_at.is_some() => {
                    self.reconnect().await;
                }
            }
            self.publish();
        }

        self.reconciler.detach();
        self.stream = None;
        self.publish();
        info!(session_id = %self.session_id, "session driver stopped");
    }

    fn on_event(&mut self, event: &RawEvent) {
        let dispatched: Dispatched = self.reconciler.handle_raw(event);
        if let Some(decision) = dispatched.resync {
            self.on_resync_decision(decision);
        }
    }

    fn on_resync_decision(&mut self, decision: ResyncDecision) {
        match decision {
            ResyncDecision::Fire(ticket) => self.spawn_resync(ticket, 0, None),
            ResyncDecision::Suppressed { window_ends_at } => {
                if self.config.trailing_edge && self.deferred_resync.is_none() {
                    // The window is measured on the injected clock; the timer runs on tokio's.
                    let remaining = window_ends_at.saturating_duration_since(self.clock.now());
                    self.deferred_resync = Some(Instant::now() + remaining);
                }
            }
        }
    }

    /// Unthrottled resync: initial load, reconnect catch-up, explicit request.
    fn start_resync(&mut self) {
        let ticket = self.reconciler.begin_resync();
        self.spawn_resync(ticket, 0, None);
    }

    fn spawn_resync(&self, ticket: ResyncTicket, attempt: u32, delay: Option<Duration>) {
        let api = Arc::clone(&self.api);
        let tx = self.internal_tx.clone();
        let session_id = self.session_id.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return,
                }
            }
            let result = api.fetch_messages(&session_id).await;
            // The driver may be gone; the result is then simply not rendered.
            let _ = tx.send(Internal::ResyncDone {
                ticket,
                attempt,
                result,
            });
        });
    }

    fn load_approvals(&self, initial: bool) {
        let api = Arc::clone(&self.api);
        let tx = self.internal_tx.clone();
        let session_id = self.session_id.clone();
        tokio::spawn(async move {
            let result = api.pending_approvals(&session_id).await;
            let _ = tx.send(Internal::ApprovalsLoaded { initial, result });
        });
    }

    fn on_internal(&mut self, internal: Internal) {
        match internal {
            Internal::ResyncDone {
                ticket,
                attempt,
                result,
            } => match result {
                Ok(messages) => {
                    self.reconciler.apply_resync(ticket, messages);
                }
                Err(e) => {
                    self.reconciler.resync_failed(ticket, &e);
                    if !self.reconciler.is_latest(ticket) {
                        return;
                    }
                    if attempt < self.config.resync_max_retries {
                        self.spawn_resync(ticket, attempt + 1, Some(self.config.resync_retry_delay));
                    } else {
                        warn!(
                            session_id = %self.session_id,
                            seq = ticket.seq(),
                            "resync retries exhausted; state stays stale until the next resync"
                        );
                    }
                }
            },
            Internal::ApprovalsLoaded { initial, result } => {
                if initial {
                    self.approvals_loaded = true;
                }
                match result {
                    Ok(approvals) => self.reconciler.replace_approvals(approvals),
                    Err(e) => {
                        warn!(session_id = %self.session_id, error = %e, "failed to load pending approvals");
                        if initial {
                            self.reconciler.replace_approvals(Vec::new());
                        }
                    }
                }
            }
            Internal::Resolved { call_id } => {
                self.reconciler.resolve_approval(&call_id);
            }
            Internal::TopupSelected { method } => {
                self.reconciler.select_topup_method(method);
            }
            Internal::TopupCancelled { reason, reply } => {
                let reported = self.reconciler.cancel_topup(reason.as_deref());
                let _ = reply.send(Ok(CommandOutcome::Cancelled(reported)));
            }
            Internal::Reply { outcome, reply } => {
                let _ = reply.send(outcome);
            }
        }
    }

    fn on_command(&mut self, command: SessionCommand) {
        let api = Arc::clone(&self.api);
        let tx = self.internal_tx.clone();
        let session_id = self.session_id.clone();

        match command {
            SessionCommand::Resolve {
                call_id,
                approved,
                reply,
            } => {
                tokio::spawn(async move {
                    let result = api.resolve_tool_call(&session_id, &call_id, approved).await;
                    if result.is_ok() {
                        let _ = tx.send(Internal::Resolved { call_id });
                    }
                    let _ = tx.send(Internal::Reply {
                        outcome: result.map(|()| CommandOutcome::Done),
                        reply,
                    });
                });
            }
            SessionCommand::ApproveAll { message_id, reply } => {
                let call_ids = self.reconciler.pending_call_ids(message_id.as_deref());
                debug!(
                    session_id = %self.session_id,
                    count = call_ids.len(),
                    "approving pending tool calls"
                );
                tokio::spawn(async move {
                    let mut report = BulkApproval::default();
                    for call_id in call_ids {
                        match api.resolve_tool_call(&session_id, &call_id, true).await {
                            Ok(()) => {
                                let _ = tx.send(Internal::Resolved {
                                    call_id: call_id.clone(),
                                });
                                report.approved.push(call_id);
                            }
                            Err(e) => {
                                warn!(session_id = %session_id, call_id = %call_id, error = %e, "approval failed");
                                report.failed.push((call_id, e.to_string()));
                            }
                        }
                    }
                    let _ = tx.send(Internal::Reply {
                        outcome: Ok(CommandOutcome::Bulk(report)),
                        reply,
                    });
                });
            }
            SessionCommand::SelectTopupMethod { method, reply } => {
                tokio::spawn(async move {
                    let result = api.select_topup_method(&session_id, method).await;
                    if result.is_ok() {
                        let _ = tx.send(Internal::TopupSelected { method });
                    }
                    let _ = tx.send(Internal::Reply {
                        outcome: result.map(|()| CommandOutcome::Done),
                        reply,
                    });
                });
            }
            SessionCommand::CancelTopup { reason, reply } => {
                tokio::spawn(async move {
                    match api.cancel_topup(&session_id, reason.as_deref()).await {
                        Ok(()) => {
                            let _ = tx.send(Internal::TopupCancelled { reason, reply });
                        }
                        Err(e) => {
                            let _ = tx.send(Internal::Reply {
                                outcome: Err(e),
                                reply,
                            });
                        }
                    }
                });
            }
            SessionCommand::Resync { reply } => {
                self.start_resync();
                let _ = reply.send(Ok(CommandOutcome::Done));
            }
        }
    }

    fn disconnect(&mut self) {
        self.stream = None;
        self.reconnect_at = Some(Instant::now() + self.reconnect_delay);
    }

    async fn reconnect(&mut self) {
        self.reconnect_at = None;
        let result = tokio::select! {
            result = self.transport.subscribe(&self.session_id) => result,
            _ = self.cancel.cancelled() => return,
        };

        match result {
            Ok(stream) => {
                info!(session_id = %self.session_id, "event stream reconnected");
                self.stream = Some(stream);
                self.reconnect_delay = self.config.reconnect_delay;
                // Events may have been missed while disconnected.
                self.start_resync();
                self.load_approvals(false);
            }
            Err(e) => {
                self.reconnect_delay = (self.reconnect_delay * 2).min(self.config.reconnect_max_delay);
                warn!(
                    session_id = %self.session_id,
                    error = %e,
                    retry_in_ms = self.reconnect_delay.as_millis() as u64,
                    "reconnect failed"
                );
                self.reconnect_at = Some(Instant::now() + self.reconnect_delay);
            }
        }
    }

    fn publish(&self) {
        let next = SessionSnapshot::capture(
            &self.reconciler,
            self.stream.is_some(),
            self.approvals_loaded,
        );
        self.snapshots.send_if_modified(|current| {
            if current.same_as(&next) {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

async fn next_event(stream: &mut Option<EventStream>) -> Option<Result<RawEvent, WeftError>> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
