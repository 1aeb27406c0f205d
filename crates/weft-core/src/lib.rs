// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Weft session sync engine.
//!
//! This crate provides the data model (messages, parts, approvals, top-ups,
//! queue snapshots), the shared error type, and the collaborator traits the
//! reconciler is wired against. Transports and API clients implement the
//! traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::WeftError;
pub use types::{
    Message, MessagePart, MessageStatus, PartType, PendingToolApproval, PendingTopupApproval,
    QueueState, QueuedMessage, RawEvent, Role, SessionId, TopupMethod,
};

pub use traits::{Clock, EventStream, EventTransport, SessionApi, SystemClock};
