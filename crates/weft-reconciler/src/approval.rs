// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending tool approvals for one session.
//!
//! Per call: `none -> pending -> resolved`. Entries keep insertion order so
//! a bulk approval walks them the way they were raised.

use std::sync::Arc;

use serde_json::Value;
use weft_core::PendingToolApproval;

/// Shared, immutable view of the pending approvals.
pub type ApprovalList = Arc<Vec<PendingToolApproval>>;

#[derive(Debug, Clone, Default)]
pub struct ApprovalBook {
    entries: ApprovalList,
}

impl ApprovalBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ApprovalList {
        Arc::clone(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, call_id: &str) -> Option<&PendingToolApproval> {
        self.entries.iter().find(|a| a.call_id == call_id)
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.get(call_id).is_some()
    }

    /// Adds a pending entry. A duplicate delivery for the same call is a no-op.
    pub fn add(&mut self, approval: PendingToolApproval) -> bool {
        if self.contains(&approval.call_id) {
            return false;
        }
        Arc::make_mut(&mut self.entries).push(approval);
        true
    }

    /// Replaces the arguments of a still-pending call.
    pub fn update_args(&mut self, call_id: &str, args: Option<Value>) -> bool {
        let Some(index) = self.entries.iter().position(|a| a.call_id == call_id) else {
            return false;
        };
        if self.entries[index].args == args {
            return false;
        }
        Arc::make_mut(&mut self.entries)[index].args = args;
        true
    }

    /// Removes the entry for a resolved call.
    pub fn resolve(&mut self, call_id: &str) -> bool {
        let Some(index) = self.entries.iter().position(|a| a.call_id == call_id) else {
            return false;
        };
        Arc::make_mut(&mut self.entries).remove(index);
        true
    }

    /// Replaces the whole set, keeping the first entry of any duplicated call.
    pub fn replace_all(&mut self, approvals: Vec<PendingToolApproval>) {
        let mut deduped: Vec<PendingToolApproval> = Vec::with_capacity(approvals.len());
        for approval in approvals {
            if !deduped.iter().any(|a| a.call_id == approval.call_id) {
                deduped.push(approval);
            }
        }
        self.entries = Arc::new(deduped);
    }

    /// Call ids pending for `message_id`, or every pending call id when `None`.
    pub fn pending_call_ids(&self, message_id: Option<&str>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|a| message_id.is_none_or(|id| a.message_id == id))
            .map(|a| a.call_id.clone())
            .collect()
    }
}
