// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire-level tests for the HTTP session API and the SSE transport.

use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use weft_config::ServerConfig;
use weft_core::{EventTransport, SessionApi, SessionId, TopupMethod, WeftError};
use weft_sse::{HttpSessionApi, SseTransport};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn server_config(uri: &str) -> ServerConfig {
    ServerConfig {
        base_url: uri.to_string(),
        request_timeout_secs: 5,
        max_retries: 1,
    }
}

fn api(server: &MockServer) -> HttpSessionApi {
    HttpSessionApi::from_config(&server_config(&server.uri()))
        .unwrap()
        .with_retry_delay(Duration::from_millis(10))
}

#[tokio::test]
async fn fetch_messages_parses_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sessions/s1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "m1", "role": "user", "status": "complete", "parts": []},
            {"id": "m2", "role": "assistant", "parts": [
                {"id": "p1", "messageId": "m2", "index": 0, "type": "text", "content": "{\"text\":\"hi\"}"}
            ]}
        ])))
        .mount(&server)
        .await;

    let messages = api(&server).fetch_messages(&SessionId::from("s1")).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].parts[0].text(), "hi");
}

#[tokio::test]
async fn fetch_messages_retries_once_on_503() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sessions/s1/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/sessions/s1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let messages = api(&server).fetch_messages(&SessionId::from("s1")).await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn exhausted_retries_report_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sessions/s1/messages"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({"error": "upstream down"})))
        .expect(2)
        .mount(&server)
        .await;

    let err = api(&server)
        .fetch_messages(&SessionId::from("s1"))
        .await
        .unwrap_err();
    match err {
        WeftError::Api { status, message, .. } => {
            assert_eq!(status, Some(502));
            assert!(message.contains("upstream down"), "got: {message}");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_session_maps_to_session_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sessions/gone/messages"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = api(&server)
        .fetch_messages(&SessionId::from("gone"))
        .await
        .unwrap_err();
    assert!(matches!(err, WeftError::SessionNotFound(ref id) if id == "gone"));
}

#[tokio::test]
async fn pending_approvals_unwraps_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sessions/s1/approval/pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "pending": [{"callId": "c1", "toolName": "bash", "messageId": "m1", "createdAt": 5}]
        })))
        .mount(&server)
        .await;

    let pending = api(&server)
        .pending_approvals(&SessionId::from("s1"))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].call_id, "c1");
}

#[tokio::test]
async fn commands_post_expected_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/s1/approval"))
        .and(body_json(json!({"callId": "c1", "approved": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/setu/topup/select"))
        .and(body_json(json!({"sessionId": "s1", "method": "fiat"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/setu/topup/cancel"))
        .and(body_json(json!({"sessionId": "s1", "reason": "user declined"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = api(&server);
    let session = SessionId::from("s1");
    api.resolve_tool_call(&session, "c1", false).await.unwrap();
    api.select_topup_method(&session, TopupMethod::Fiat).await.unwrap();
    api.cancel_topup(&session, Some("user declined")).await.unwrap();
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/s1/approval"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"error": {"message": "already resolved"}})))
        .expect(1)
        .mount(&server)
        .await;

    let err = api(&server)
        .resolve_tool_call(&SessionId::from("s1"), "c1", true)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already resolved"), "got: {err}");
}

#[tokio::test]
async fn transport_streams_session_events() {
    let server = MockServer::start().await;
    let body = concat!(
        "event: message.created\ndata: {\"id\":\"m1\",\"role\":\"assistant\"}\n\n",
        "event: tool.result\ndata: {\"callId\":\"c1\"}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/v1/sessions/s1/stream"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let transport = SseTransport::from_config(&server_config(&server.uri())).unwrap();
    let events: Vec<_> = transport
        .subscribe(&SessionId::from("s1"))
        .await
        .unwrap()
        .collect()
        .await;

    let types: Vec<String> = events
        .into_iter()
        .map(|e| e.unwrap().event_type)
        .collect();
    assert_eq!(types, vec!["message.created", "tool.result"]);
}

#[tokio::test]
async fn transport_reports_missing_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sessions/nope/stream"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport = SseTransport::from_config(&server_config(&server.uri())).unwrap();
    let result = transport.subscribe(&SessionId::from("nope")).await;
    assert!(matches!(result, Err(WeftError::SessionNotFound(_))));
}
