// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming session reconciliation engine.
//!
//! Consumes the named events of one session and incrementally maintains a
//! render-ready transcript plus the approval, top-up, and queue projections.
//! Everything here is synchronous: the caller feeds events and resync results
//! in, and reads snapshots or listens for [`SyncUpdate`] notifications.
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use weft_core::{SessionId, SystemClock};
//! use weft_reconciler::{Reconciler, ReconcilerOptions};
//!
//! let mut reconciler = Reconciler::new(
//!     SessionId::from("s1"),
//!     ReconcilerOptions::default(),
//!     Arc::new(SystemClock),
//! );
//! reconciler.handle("message.created", &json!({"id": "m1", "role": "assistant"}));
//! reconciler.handle(
//!     "message.part.delta",
//!     &json!({"messageId": "m1", "partId": "p1", "delta": "Hello"}),
//! );
//! assert_eq!(reconciler.messages()[0].parts[0].text(), "Hello");
//! ```

pub mod approval;
pub mod delta;
pub mod ephemeral;
pub mod event;
pub mod queue;
pub mod reconciler;
pub mod throttle;
pub mod topup;
pub mod transcript;
pub mod update;

pub use approval::{ApprovalBook, ApprovalList};
pub use event::{DeltaKind, SessionEvent};
pub use reconciler::{Dispatched, Reconciler, ReconcilerOptions, ResyncDecision, ResyncTicket};
pub use throttle::{ResyncThrottle, ThrottleDecision};
pub use topup::{PaymentPhase, TopupState};
pub use transcript::{MessageList, Transcript};
pub use update::{Listener, ListenerId, Notice, NoticeLevel, SyncUpdate};
