// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the session server's REST surface.
//!
//! Provides [`HttpSessionApi`], which builds endpoint URLs, maps HTTP failures
//! onto [`WeftError`], and retries transient errors (429, 500, 502, 503).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;
use weft_config::ServerConfig;
use weft_core::{Message, PendingToolApproval, SessionApi, SessionId, TopupMethod, WeftError};

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// REST client implementing [`SessionApi`].
#[derive(Debug, Clone)]
pub struct HttpSessionApi {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Deserialize)]
struct PendingApprovalsResponse {
    #[serde(default)]
    pending: Vec<PendingToolApproval>,
}

impl HttpSessionApi {
    pub fn from_config(config: &ServerConfig) -> Result<Self, WeftError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| WeftError::Api {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: parse_base_url(&config.base_url)?,
            timeout: config.request_timeout(),
            max_retries: config.max_retries,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Overrides the pause between retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, WeftError> {
        let response = self.send(Method::GET, url, None).await?;
        let body = response.text().await.map_err(|e| WeftError::Api {
            message: format!("failed to read response body: {e}"),
            status: None,
            source: Some(Box::new(e)),
        })?;
        serde_json::from_str(&body).map_err(|e| WeftError::Api {
            message: format!("failed to parse response: {e}"),
            status: None,
            source: Some(Box::new(e)),
        })
    }

    async fn post(&self, url: Url, body: Value) -> Result<(), WeftError> {
        self.send(Method::POST, url, Some(body)).await.map(|_| ())
    }

    /// Sends a request, retrying transient failures up to `max_retries` times.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<reqwest::Response, WeftError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, url = %url, "retrying request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let mut request = self.client.request(method.clone(), url.clone());
            if let Some(body) = &body {
                request = request.json(body);
            }
            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    WeftError::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    WeftError::Api {
                        message: format!("HTTP request failed: {e}"),
                        status: None,
                        source: Some(Box::new(e)),
                    }
                }
            })?;

            let status = response.status();
            debug!(status = %status, attempt, url = %url, "response received");

            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(WeftError::api(
                    format!("server returned {status}: {body}"),
                    Some(status.as_u16()),
                ));
                continue;
            }

            return Err(WeftError::api(
                format!("server returned {status}: {}", error_message(&body)),
                Some(status.as_u16()),
            ));
        }

        Err(last_error.unwrap_or_else(|| WeftError::api("request failed after retries", None)))
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn fetch_messages(&self, session_id: &SessionId) -> Result<Vec<Message>, WeftError> {
        let url = endpoint(&self.base_url, &["v1", "sessions", session_id.as_str(), "messages"])?;
        self.get(url).await.map_err(|e| not_found_as_session(e, session_id))
    }

    async fn pending_approvals(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<PendingToolApproval>, WeftError> {
        let url = endpoint(
            &self.base_url,
            &["v1", "sessions", session_id.as_str(), "approval", "pending"],
        )?;
        let response: PendingApprovalsResponse = self.get(url).await?;
        Ok(response.pending)
    }

    async fn resolve_tool_call(
        &self,
        session_id: &SessionId,
        call_id: &str,
        approved: bool,
    ) -> Result<(), WeftError> {
        let url = endpoint(&self.base_url, &["v1", "sessions", session_id.as_str(), "approval"])?;
        self.post(url, json!({ "callId": call_id, "approved": approved }))
            .await
    }

    async fn select_topup_method(
        &self,
        session_id: &SessionId,
        method: TopupMethod,
    ) -> Result<(), WeftError> {
        let url = endpoint(&self.base_url, &["v1", "setu", "topup", "select"])?;
        self.post(
            url,
            json!({ "sessionId": session_id.as_str(), "method": method.to_string() }),
        )
        .await
    }

    async fn cancel_topup(
        &self,
        session_id: &SessionId,
        reason: Option<&str>,
    ) -> Result<(), WeftError> {
        let url = endpoint(&self.base_url, &["v1", "setu", "topup", "cancel"])?;
        let mut body = json!({ "sessionId": session_id.as_str() });
        if let Some(reason) = reason {
            body["reason"] = Value::String(reason.to_string());
        }
        self.post(url, body).await
    }
}

/// Parses a configured base URL so later segments append instead of replacing.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, WeftError> {
    let mut url =
        Url::parse(raw).map_err(|e| WeftError::Config(format!("invalid base_url `{raw}`: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(WeftError::Config(format!("base_url `{raw}` cannot be a base")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Appends percent-encoded path segments to `base`.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, WeftError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| WeftError::Config(format!("base_url `{base}` cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

/// Pulls a human-readable message out of an error body.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    let message = match value.get("error") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => obj.get("message").and_then(Value::as_str).map(str::to_string),
        _ => value.get("message").and_then(Value::as_str).map(str::to_string),
    };
    message.unwrap_or_else(|| body.to_string())
}

fn not_found_as_session(err: WeftError, session_id: &SessionId) -> WeftError {
    match err {
        WeftError::Api {
            status: Some(404), ..
        } => WeftError::SessionNotFound(session_id.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = parse_base_url("http://localhost:9100/api").unwrap();
        let joined = endpoint(&url, &["v1", "sessions", "s1", "messages"]).unwrap();
        assert_eq!(joined.as_str(), "http://localhost:9100/api/v1/sessions/s1/messages");
    }

    #[test]
    fn session_ids_are_percent_encoded() {
        let url = parse_base_url("http://localhost:9100").unwrap();
        let joined = endpoint(&url, &["v1", "sessions", "a/b c"]).unwrap();
        assert_eq!(joined.as_str(), "http://localhost:9100/v1/sessions/a%2Fb%20c");
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        assert!(matches!(parse_base_url("not a url"), Err(WeftError::Config(_))));
    }

    #[test]
    fn error_message_reads_common_shapes() {
        assert_eq!(error_message(r#"{"error":"nope"}"#), "nope");
        assert_eq!(error_message(r#"{"error":{"message":"deep"}}"#), "deep");
        assert_eq!(error_message("plain"), "plain");
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient_error(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_error(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_error(StatusCode::BAD_REQUEST));
        assert!(!is_transient_error(StatusCode::NOT_FOUND));
    }
}
