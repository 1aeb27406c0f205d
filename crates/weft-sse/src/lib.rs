// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Network collaborators for the Weft session sync engine.
//!
//! [`SseTransport`] implements `EventTransport` over the server's
//! Server-Sent Events endpoint; [`HttpSessionApi`] implements `SessionApi`
//! over its REST surface. Both are configured from `[server]`.

pub mod client;
pub mod sse;
pub mod transport;

pub use client::HttpSessionApi;
pub use sse::{decode_frame, parse_event_stream};
pub use transport::SseTransport;
