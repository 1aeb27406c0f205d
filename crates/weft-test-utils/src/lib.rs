// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Weft integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic tests without a running session server.
//!
//! # Components
//!
//! - [`MockTransport`] - Scriptable event stream per session
//! - [`MockSessionApi`] - Scripted REST responses with call capture
//! - [`ManualClock`] - Clock that moves only when advanced
//! - [`TestHarness`] - Registry wired to all of the above

pub mod clock;
pub mod harness;
pub mod mock_api;
pub mod mock_transport;

pub use clock::ManualClock;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_api::{ApiCall, MockSessionApi};
pub use mock_transport::MockTransport;
