// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE implementation of [`EventTransport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderValue};
use tracing::{debug, info};
use url::Url;
use weft_config::ServerConfig;
use weft_core::{EventStream, EventTransport, SessionId, WeftError};

use crate::client::{endpoint, parse_base_url};
use crate::sse::parse_event_stream;

/// Opens `GET /v1/sessions/{id}/stream` and frames it as SSE.
///
/// The stream client has no total request timeout, only a connect timeout,
/// since the response body stays open for the life of the subscription.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl SseTransport {
    pub fn from_config(config: &ServerConfig) -> Result<Self, WeftError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| WeftError::Transport {
                message: format!("failed to build stream client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: parse_base_url(&config.base_url)?,
        })
    }

    pub fn stream_url(&self, session_id: &SessionId) -> Result<Url, WeftError> {
        endpoint(&self.base_url, &["v1", "sessions", session_id.as_str(), "stream"])
    }
}

#[async_trait]
impl EventTransport for SseTransport {
    async fn subscribe(&self, session_id: &SessionId) -> Result<EventStream, WeftError> {
        let url = self.stream_url(session_id)?;
        debug!(session_id = %session_id, url = %url, "opening event stream");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .send()
            .await
            .map_err(|e| WeftError::Transport {
                message: format!("failed to open event stream: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(WeftError::SessionNotFound(session_id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeftError::transport(format!(
                "event stream returned {status}: {body}"
            )));
        }

        info!(session_id = %session_id, "event stream connected");
        Ok(parse_event_stream(response))
    }
}
