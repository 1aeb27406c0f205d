// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Async subscription layer for Weft sessions.
//!
//! [`SessionRegistry::subscribe`] opens a session's event stream and spawns a
//! driver task that owns the session's reconciler. Callers interact through
//! a [`SessionHandle`]: read [`SessionSnapshot`]s, listen for updates, and
//! issue approval and top-up commands.

pub mod command;
pub mod driver;
pub mod handle;
pub mod registry;
pub mod shutdown;
pub mod snapshot;

pub use command::{BulkApproval, CommandOutcome};
pub use driver::DriverConfig;
pub use handle::SessionHandle;
pub use registry::SessionRegistry;
pub use shutdown::install_signal_handler;
pub use snapshot::SessionSnapshot;
