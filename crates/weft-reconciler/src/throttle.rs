// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leading-edge resync throttle.
//!
//! The first request in a window fires immediately; requests inside the same
//! window are suppressed. Time is passed in by the caller so tests can drive
//! it from a manual clock.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use weft_core::SessionId;

/// Outcome of a resync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Fetch now.
    Fire,
    /// Coalesced into the refetch already fired; the window closes at `window_ends_at`.
    Suppressed { window_ends_at: Instant },
}

#[derive(Debug, Clone)]
pub struct ResyncThrottle {
    window: Duration,
    last_fired: HashMap<SessionId, Instant>,
}

impl ResyncThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn request(&mut self, session_id: &SessionId, now: Instant) -> ThrottleDecision {
        if let Some(last) = self.last_fired.get(session_id) {
            let window_ends_at = *last + self.window;
            if now < window_ends_at {
                return ThrottleDecision::Suppressed { window_ends_at };
            }
        }
        self.last_fired.insert(session_id.clone(), now);
        ThrottleDecision::Fire
    }

    /// Opens a new window at `now` unconditionally.
    pub fn claim(&mut self, session_id: &SessionId, now: Instant) {
        self.last_fired.insert(session_id.clone(), now);
    }

    /// Forgets a session's window, e.g. when its subscription ends.
    pub fn reset(&mut self, session_id: &SessionId) {
        self.last_fired.remove(session_id);
    }
}
