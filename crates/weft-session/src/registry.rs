// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracks one live subscription per session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use weft_core::{Clock, EventTransport, SessionApi, SessionId, SystemClock, WeftError};

use crate::driver::{DriverConfig, SessionDriver};
use crate::handle::SessionHandle;

/// How long teardown waits for a driver task to exit.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct Entry {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

/// Owns the drivers for every subscribed session.
///
/// Re-subscribing to a session tears the previous driver down first, so a
/// session never has two drivers writing to its state.
pub struct SessionRegistry {
    transport: Arc<dyn EventTransport>,
    api: Arc<dyn SessionApi>,
    clock: Arc<dyn Clock>,
    config: DriverConfig,
    sessions: Mutex<HashMap<SessionId, Entry>>,
}

impl SessionRegistry {
    pub fn new(
        transport: Arc<dyn EventTransport>,
        api: Arc<dyn SessionApi>,
        config: DriverConfig,
    ) -> Self {
        Self {
            transport,
            api,
            clock: Arc::new(SystemClock),
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the clock used for throttling and timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Opens the event stream for `session_id` and starts its driver.
    ///
    /// Fails if the transport cannot subscribe; no driver is left running
    /// for the session in that case.
    pub async fn subscribe(&self, session_id: SessionId) -> Result<SessionHandle, WeftError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(previous) = sessions.remove(&session_id) {
            info!(session_id = %session_id, "replacing existing subscription");
            teardown(&session_id, previous).await;
        }

        let stream = self.transport.subscribe(&session_id).await?;
        let (handle, task) = SessionDriver::spawn(
            session_id.clone(),
            stream,
            Arc::clone(&self.transport),
            Arc::clone(&self.api),
            Arc::clone(&self.clock),
            self.config.clone(),
        );
        sessions.insert(
            session_id,
            Entry {
                handle: handle.clone(),
                task,
            },
        );
        Ok(handle)
    }

    /// Stops the driver for `session_id`. Returns false if none was running.
    pub async fn unsubscribe(&self, session_id: &SessionId) -> bool {
        let entry = self.sessions.lock().await.remove(session_id);
        match entry {
            Some(entry) => {
                teardown(session_id, entry).await;
                true
            }
            None => false,
        }
    }

    pub async fn handle(&self, session_id: &SessionId) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .filter(|entry| !entry.task.is_finished())
            .map(|entry| entry.handle.clone())
    }

    pub async fn active_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions
            .lock()
            .await
            .iter()
            .filter(|(_, entry)| !entry.task.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Stops every driver.
    pub async fn shutdown(&self) {
        let entries: Vec<(SessionId, Entry)> = self.sessions.lock().await.drain().collect();
        if entries.is_empty() {
            return;
        }
        info!(count = entries.len(), "stopping session drivers");
        for (session_id, entry) in entries {
            teardown(&session_id, entry).await;
        }
    }
}

async fn teardown(session_id: &SessionId, entry: Entry) {
    entry.handle.cancel();
    match tokio::time::timeout(TEARDOWN_TIMEOUT, entry.task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(session_id = %session_id, error = %e, "session driver panicked"),
        Err(_) => warn!(session_id = %session_id, "session driver did not stop in time"),
    }
}
