// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User commands sent to a session driver.

use tokio::sync::oneshot;
use weft_core::{TopupMethod, WeftError};

/// Result of a bulk approval: which calls the server accepted and which failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkApproval {
    pub approved: Vec<String>,
    /// `(call_id, error message)` for every call that stayed pending.
    pub failed: Vec<(String, String)>,
}

impl BulkApproval {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What a successful command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Done,
    Bulk(BulkApproval),
    /// The top-up was cancelled; carries the reported reason.
    Cancelled(String),
}

pub(crate) type Responder = oneshot::Sender<Result<CommandOutcome, WeftError>>;

#[derive(Debug)]
pub(crate) enum SessionCommand {
    Resolve {
        call_id: String,
        approved: bool,
        reply: Responder,
    },
    ApproveAll {
        message_id: Option<String>,
        reply: Responder,
    },
    SelectTopupMethod {
        method: TopupMethod,
        reply: Responder,
    },
    CancelTopup {
        reason: Option<String>,
        reply: Responder,
    },
    Resync {
        reply: Responder,
    },
}
