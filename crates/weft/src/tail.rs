// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `weft tail` and `weft history`.

use std::io;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};
use weft_config::WeftConfig;
use weft_core::{SessionApi, SessionId, WeftError};
use weft_reconciler::SyncUpdate;
use weft_session::{DriverConfig, SessionRegistry, SessionSnapshot, install_signal_handler};
use weft_sse::{HttpSessionApi, SseTransport};

use crate::render::Renderer;

fn api(config: &WeftConfig) -> Result<HttpSessionApi, WeftError> {
    Ok(HttpSessionApi::from_config(&config.server)?.with_retry_delay(config.resync.retry_delay()))
}

fn output_error(e: io::Error) -> WeftError {
    WeftError::Internal(format!("failed to write output: {e}"))
}

/// Follows a session until interrupted or the subscription closes.
pub async fn run_tail(config: &WeftConfig, session_id: SessionId) -> Result<(), WeftError> {
    let transport = Arc::new(SseTransport::from_config(&config.server)?);
    let registry = SessionRegistry::new(
        transport,
        Arc::new(api(config)?),
        DriverConfig::from_config(config),
    );
    let shutdown = install_signal_handler();

    let handle = registry.subscribe(session_id.clone()).await?;
    info!(session_id = %session_id, base_url = %config.server.base_url, "following session");

    let mut snapshots = handle.watch();
    let mut updates = handle.updates();
    let mut renderer = Renderer::new(io::stdout());

    let initial = snapshots.borrow_and_update().clone();
    renderer.render(&initial).map_err(output_error)?;

    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if let Err(e) = renderer.render(&snapshot) {
                    break Err(output_error(e));
                }
            }
            update = updates.recv() => match update {
                Ok(SyncUpdate::Notice(notice)) => {
                    if let Err(e) = renderer.notice(&notice) {
                        break Err(output_error(e));
                    }
                }
                Ok(SyncUpdate::ResyncFailed { seq, error }) => {
                    debug!(seq, error = %error, "resync failed; showing last known state");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "update listener lagged"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    registry.shutdown().await;
    result
}

/// Prints a session's stored history once.
pub async fn run_history(config: &WeftConfig, session_id: SessionId) -> Result<(), WeftError> {
    let messages = api(config)?.fetch_messages(&session_id).await?;
    let snapshot = SessionSnapshot {
        session_id,
        messages: Arc::new(messages.into_iter().map(Arc::new).collect()),
        approvals: Arc::default(),
        topup: Arc::default(),
        queue: Arc::default(),
        connected: false,
        resync_seq: None,
        approvals_loaded: false,
    };
    let mut renderer = Renderer::new(io::stdout());
    renderer.render(&snapshot).map_err(output_error)?;
    println!();
    Ok(())
}
