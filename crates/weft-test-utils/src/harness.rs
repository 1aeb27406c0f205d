// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end subscription tests.
//!
//! `TestHarness` wires a [`SessionRegistry`] to a [`MockTransport`], a
//! [`MockSessionApi`] and a [`ManualClock`], with short retry delays so
//! failure paths run quickly.

use std::sync::Arc;
use std::time::Duration;

use weft_config::WeftConfig;
use weft_core::{SessionId, WeftError};
use weft_session::{DriverConfig, SessionHandle, SessionRegistry, SessionSnapshot};

use crate::clock::ManualClock;
use crate::mock_api::MockSessionApi;
use crate::mock_transport::MockTransport;

/// How long [`TestHarness::wait_for`] waits by default.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: DriverConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = DriverConfig::from_config(&WeftConfig::default());
        config.resync_retry_delay = Duration::from_millis(10);
        config.reconnect_delay = Duration::from_millis(10);
        config.reconnect_max_delay = Duration::from_millis(40);
        Self { config }
    }

    /// Derives driver settings from a full configuration, keeping the
    /// harness's short retry delays.
    pub fn with_config(mut self, config: &WeftConfig) -> Self {
        let retry = self.config.resync_retry_delay;
        let reconnect = self.config.reconnect_delay;
        let reconnect_max = self.config.reconnect_max_delay;
        self.config = DriverConfig::from_config(config);
        self.config.resync_retry_delay = retry;
        self.config.reconnect_delay = reconnect;
        self.config.reconnect_max_delay = reconnect_max;
        self
    }

    pub fn with_trailing_edge(mut self, enabled: bool) -> Self {
        self.config.trailing_edge = enabled;
        self
    }

    pub fn with_resync_window(mut self, window: Duration) -> Self {
        self.config.reconciler.resync_window = window;
        self
    }

    pub fn with_resync_retries(mut self, retries: u32) -> Self {
        self.config.resync_max_retries = retries;
        self
    }

    pub fn build(self) -> TestHarness {
        let transport = Arc::new(MockTransport::new());
        let api = Arc::new(MockSessionApi::new());
        let clock = Arc::new(ManualClock::new());
        let registry = SessionRegistry::new(transport.clone(), api.clone(), self.config)
            .with_clock(clock.clone());

        TestHarness {
            transport,
            api,
            clock,
            registry,
        }
    }
}

/// A complete subscription stack backed by mocks.
pub struct TestHarness {
    pub transport: Arc<MockTransport>,
    pub api: Arc<MockSessionApi>,
    pub clock: Arc<ManualClock>,
    pub registry: SessionRegistry,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub async fn subscribe(&self, session_id: &str) -> Result<SessionHandle, WeftError> {
        self.registry.subscribe(SessionId::from(session_id)).await
    }

    /// Subscribes and waits for the initial history and approval loads.
    pub async fn subscribe_loaded(&self, session_id: &str) -> Result<SessionHandle, WeftError> {
        let handle = self.subscribe(session_id).await?;
        Self::wait_for(&handle, |s| s.resync_seq.is_some() && s.approvals_loaded).await?;
        Ok(handle)
    }

    /// Waits until a published snapshot satisfies `predicate`.
    pub async fn wait_for(
        handle: &SessionHandle,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, WeftError> {
        Self::wait_for_within(handle, DEFAULT_WAIT, predicate).await
    }

    pub async fn wait_for_within(
        handle: &SessionHandle,
        timeout: Duration,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, WeftError> {
        let mut rx = handle.watch();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|s| predicate(s))).await;
        match waited {
            Ok(Ok(snapshot)) => Ok(snapshot.clone()),
            Ok(Err(_)) => Err(WeftError::SubscriptionClosed(handle.session_id().to_string())),
            Err(_) => Err(WeftError::Timeout { duration: timeout }),
        }
    }
}
