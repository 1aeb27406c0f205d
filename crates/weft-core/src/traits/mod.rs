// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! The engine talks to the outside world through exactly three seams: the
//! event transport, the REST session API, and a clock. Async seams use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod api;
pub mod clock;
pub mod transport;

pub use api::SessionApi;
pub use clock::{Clock, SystemClock};
pub use transport::{EventStream, EventTransport};
