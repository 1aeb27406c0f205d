// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events framing for the session stream.
//!
//! Each SSE frame becomes a [`RawEvent`]: the `event:` field names it and the
//! `data:` field carries its JSON payload. Frames without an event name are
//! accepted when their data is an envelope `{"type": .., "payload": ..}`.

use eventsource_stream::Eventsource;
use futures::stream::StreamExt;
use serde_json::Value;
use tracing::debug;
use weft_core::{EventStream, RawEvent, WeftError};

/// Frame names that only keep the connection alive.
const KEEPALIVE_EVENTS: &[&str] = &["ping", "keepalive", "heartbeat"];

/// Turns a streaming response body into an [`EventStream`].
pub fn parse_event_stream(response: reqwest::Response) -> EventStream {
    let events = response.bytes_stream().eventsource();

    let mapped = events.filter_map(|result| async move {
        match result {
            Ok(event) => decode_frame(&event.event, &event.data).map(Ok),
            Err(e) => Some(Err(WeftError::Transport {
                message: format!("SSE stream error: {e}"),
                source: None,
            })),
        }
    });

    Box::pin(mapped)
}

/// Decodes one SSE frame. Returns `None` for keep-alives and unnamed frames
/// that are not envelopes.
pub fn decode_frame(name: &str, data: &str) -> Option<RawEvent> {
    if KEEPALIVE_EVENTS.contains(&name) {
        return None;
    }

    let payload = if data.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(data).unwrap_or_else(|e| {
            debug!(event_type = name, error = %e, "non-JSON event data");
            Value::String(data.to_string())
        })
    };

    if !name.is_empty() && name != "message" {
        return Some(RawEvent::new(name, payload));
    }

    let Value::Object(mut envelope) = payload else {
        return None;
    };
    let Some(Value::String(event_type)) = envelope.remove("type") else {
        return None;
    };
    let payload = match envelope.remove("payload") {
        Some(inner) => inner,
        None => Value::Object(envelope),
    };
    Some(RawEvent::new(event_type, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    async fn mock_sse_response(sse_text: &str) -> reqwest::Response {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_text.to_string()),
            )
            .mount(&server)
            .await;

        reqwest::get(&server.uri()).await.unwrap()
    }

    #[test]
    fn named_frame_keeps_its_payload() {
        let event = decode_frame("tool.result", r#"{"callId":"c1"}"#).unwrap();
        assert_eq!(event.event_type, "tool.result");
        assert_eq!(event.payload, json!({"callId": "c1"}));
    }

    #[test]
    fn empty_data_is_null_payload() {
        let event = decode_frame("finish-step", "").unwrap();
        assert_eq!(event.payload, Value::Null);
    }

    #[test]
    fn unnamed_envelope_is_unwrapped() {
        let event = decode_frame("message", r#"{"type":"queue.updated","payload":{"queueLength":2}}"#)
            .unwrap();
        assert_eq!(event.event_type, "queue.updated");
        assert_eq!(event.payload, json!({"queueLength": 2}));
    }

    #[test]
    fn keepalives_and_bare_data_are_skipped() {
        assert_eq!(decode_frame("ping", "{}"), None);
        assert_eq!(decode_frame("message", "hello"), None);
        assert_eq!(decode_frame("", r#"{"no":"type"}"#), None);
    }

    #[tokio::test]
    async fn stream_yields_frames_in_order() {
        let sse = concat!(
            "event: message.created\ndata: {\"id\":\"m1\",\"role\":\"assistant\"}\n\n",
            "event: ping\ndata: {}\n\n",
            "event: message.part.delta\ndata: {\"messageId\":\"m1\",\"partId\":\"p1\",\"delta\":\"Hi\"}\n\n",
        );
        let response = mock_sse_response(sse).await;
        let mut stream = parse_event_stream(response);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.event_type, "message.created");
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.event_type, "message.part.delta");
        assert_eq!(second.payload["delta"], "Hi");
        assert!(stream.next().await.is_none());
    }
}
