// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription driver behavior against mock transport and REST surfaces.

use std::time::Duration;

use serde_json::json;
use weft_core::{Message, PendingToolApproval, Role, SessionId, TopupMethod, WeftError};
use weft_reconciler::{PaymentPhase, SyncUpdate};
use weft_session::SessionSnapshot;
use weft_test_utils::{ApiCall, TestHarness};

fn approval(call_id: &str, message_id: &str) -> PendingToolApproval {
    PendingToolApproval {
        call_id: call_id.into(),
        tool_name: "bash".into(),
        args: Some(json!({"cmd": "ls"})),
        message_id: message_id.into(),
        created_at: 1,
    }
}

fn text_of(snapshot: &SessionSnapshot, message_id: &str) -> Option<String> {
    snapshot
        .messages
        .iter()
        .find(|m| m.id == message_id)
        .and_then(|m| m.parts.first())
        .map(|p| p.text())
}

fn call_ids(snapshot: &SessionSnapshot) -> Vec<String> {
    snapshot.approvals.iter().map(|a| a.call_id.clone()).collect()
}

#[tokio::test]
async fn initial_load_hydrates_history_and_approvals() {
    let harness = TestHarness::builder().build();
    harness
        .api
        .set_messages("s1", vec![Message::new("m0", Role::User)])
        .await;
    harness.api.set_pending("s1", vec![approval("c1", "m0")]).await;

    let handle = harness.subscribe_loaded("s1").await.unwrap();
    let snapshot = TestHarness::wait_for(&handle, |s| s.approvals.len() == 1)
        .await
        .unwrap();

    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].id, "m0");
    assert!(snapshot.connected);
    assert_eq!(harness.api.fetch_count("s1").await, 1);
}

#[tokio::test]
async fn streamed_deltas_render_in_order() {
    let harness = TestHarness::builder().build();
    let handle = harness.subscribe_loaded("s1").await.unwrap();

    let t = &harness.transport;
    t.push("s1", "message.created", json!({"id": "m1", "role": "assistant"}))
        .await;
    t.push(
        "s1",
        "message.part.delta",
        json!({"messageId": "m1", "partId": "p1", "delta": "Hello"}),
    )
    .await;
    t.push(
        "s1",
        "message.part.delta",
        json!({"messageId": "m1", "partId": "p1", "delta": " world"}),
    )
    .await;

    let snapshot = TestHarness::wait_for(&handle, |s| {
        text_of(s, "m1").as_deref() == Some("Hello world")
    })
    .await
    .unwrap();
    assert_eq!(snapshot.messages.len(), 1);
    // Deltas alone never refetch.
    assert_eq!(harness.api.fetch_count("s1").await, 1);
}

#[tokio::test]
async fn invalidating_event_replaces_transcript_from_server() {
    let harness = TestHarness::builder().build();
    let handle = harness.subscribe_loaded("s1").await.unwrap();
    let first_seq = handle.snapshot().resync_seq;

    let mut done = Message::new("m1", Role::Assistant);
    done.session_id = "s1".into();
    harness.api.set_messages("s1", vec![done]).await;
    harness
        .transport
        .push("s1", "message.completed", json!({"id": "m1"}))
        .await;

    let snapshot = TestHarness::wait_for(&handle, |s| s.resync_seq > first_seq)
        .await
        .unwrap();
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].id, "m1");
    assert_eq!(harness.api.fetch_count("s1").await, 2);
}

#[tokio::test]
async fn burst_of_invalidations_coalesces_until_window_passes() {
    let harness = TestHarness::builder()
        .with_resync_window(Duration::from_millis(500))
        .build();
    let handle = harness.subscribe_loaded("s1").await.unwrap();
    let first_seq = handle.snapshot().resync_seq;

    let t = &harness.transport;
    t.push("s1", "tool.result", json!({"callId": "c1"})).await;
    let after_first = TestHarness::wait_for(&handle, |s| s.resync_seq > first_seq)
        .await
        .unwrap()
        .resync_seq;

    t.push("s1", "tool.result", json!({"callId": "c2"})).await;
    t.push("s1", "finish-step", json!({})).await;
    // Events are processed in order; once this lands the two above were decided.
    t.push("s1", "queue.updated", json!({"queueLength": 1})).await;
    TestHarness::wait_for(&handle, |s| s.queue.queue_length == 1)
        .await
        .unwrap();
    assert_eq!(harness.api.fetch_count("s1").await, 2);

    harness.clock.advance(Duration::from_millis(501));
    t.push("s1", "tool.result", json!({"callId": "c3"})).await;
    TestHarness::wait_for(&handle, |s| s.resync_seq > after_first)
        .await
        .unwrap();
    assert_eq!(harness.api.fetch_count("s1").await, 3);
}

#[tokio::test]
async fn trailing_edge_fires_one_deferred_resync() {
    let harness = TestHarness::builder()
        .with_trailing_edge(true)
        .with_resync_window(Duration::from_millis(50))
        .build();
    let handle = harness.subscribe_loaded("s1").await.unwrap();
    let first_seq = handle.snapshot().resync_seq;

    let t = &harness.transport;
    t.push("s1", "message.completed", json!({"id": "m1"})).await;
    let second = TestHarness::wait_for(&handle, |s| s.resync_seq > first_seq)
        .await
        .unwrap()
        .resync_seq;

    t.push("s1", "message.completed", json!({"id": "m1"})).await;
    t.push("s1", "message.completed", json!({"id": "m1"})).await;
    TestHarness::wait_for(&handle, |s| s.resync_seq > second)
        .await
        .unwrap();
    assert_eq!(harness.api.fetch_count("s1").await, 3);
}

#[tokio::test]
async fn trailing_fire_claims_the_next_window() {
    let window = Duration::from_millis(200);
    let harness = TestHarness::builder()
        .with_trailing_edge(true)
        .with_resync_window(window)
        .build();
    let handle = harness.subscribe_loaded("s1").await.unwrap();
    let first_seq = handle.snapshot().resync_seq;

    let t = &harness.transport;
    t.push("s1", "tool.result", json!({"callId": "c1"})).await;
    let leading = TestHarness::wait_for(&handle, |s| s.resync_seq > first_seq)
        .await
        .unwrap()
        .resync_seq;

    t.push("s1", "tool.result", json!({"callId": "c2"})).await;
    t.push("s1", "queue.updated", json!({"queueLength": 1})).await;
    TestHarness::wait_for(&handle, |s| s.queue.queue_length == 1)
        .await
        .unwrap();
    harness.clock.advance(window);
    let trailing = TestHarness::wait_for(&handle, |s| s.resync_seq > leading)
        .await
        .unwrap()
        .resync_seq;
    assert_eq!(harness.api.fetch_count("s1").await, 3);

    // Inside the window the trailing fire opened: coalesced, not fetched.
    harness.clock.advance(Duration::from_millis(25));
    t.push("s1", "tool.result", json!({"callId": "c3"})).await;
    t.push("s1", "queue.updated", json!({"queueLength": 2})).await;
    TestHarness::wait_for(&handle, |s| s.queue.queue_length == 2)
        .await
        .unwrap();
    assert_eq!(harness.api.fetch_count("s1").await, 3);

    TestHarness::wait_for(&handle, |s| s.resync_seq > trailing)
        .await
        .unwrap();
    assert_eq!(harness.api.fetch_count("s1").await, 4);
}

#[tokio::test]
async fn trailing_timer_measures_remaining_window_from_injected_clock() {
    let harness = TestHarness::builder()
        .with_trailing_edge(true)
        .with_resync_window(Duration::from_millis(100))
        .build();
    let handle = harness.subscribe_loaded("s1").await.unwrap();
    let first_seq = handle.snapshot().resync_seq;

    // Injected time far ahead of tokio's clock.
    harness.clock.advance(Duration::from_secs(60));
    let t = &harness.transport;
    t.push("s1", "tool.result", json!({"callId": "c1"})).await;
    let leading = TestHarness::wait_for(&handle, |s| s.resync_seq > first_seq)
        .await
        .unwrap()
        .resync_seq;

    t.push("s1", "tool.result", json!({"callId": "c2"})).await;
    TestHarness::wait_for_within(&handle, Duration::from_secs(2), |s| {
        s.resync_seq > leading
    })
    .await
    .unwrap();
    assert_eq!(harness.api.fetch_count("s1").await, 3);
}

#[tokio::test]
async fn failed_resync_is_retried() {
    let harness = TestHarness::builder().build();
    harness.api.fail_fetches(1).await;
    harness
        .api
        .set_messages("s1", vec![Message::new("m0", Role::User)])
        .await;

    let handle = harness.subscribe_loaded("s1").await.unwrap();
    assert_eq!(handle.snapshot().messages.len(), 1);
    assert_eq!(harness.api.fetch_count("s1").await, 2);
}

#[tokio::test]
async fn exhausted_retries_leave_state_until_next_resync() {
    let harness = TestHarness::builder().with_resync_retries(1).build();
    harness.api.fail_fetches(10).await;

    let handle = harness.subscribe("s1").await.unwrap();
    let waited = TestHarness::wait_for_within(&handle, Duration::from_millis(300), |s| {
        s.resync_seq.is_some()
    })
    .await;
    assert!(matches!(waited, Err(WeftError::Timeout { .. })));
    assert_eq!(harness.api.fetch_count("s1").await, 2);

    harness.api.fail_fetches(0).await;
    handle.resync().await.unwrap();
    TestHarness::wait_for(&handle, |s| s.resync_seq.is_some())
        .await
        .unwrap();
}

#[tokio::test]
async fn stale_resync_result_is_discarded() {
    let harness = TestHarness::builder().build();
    harness
        .api
        .set_messages("s1", vec![Message::new("old", Role::User)])
        .await;
    harness
        .api
        .set_fetch_delay(Some(Duration::from_millis(200)))
        .await;

    let handle = harness.subscribe("s1").await.unwrap();
    while harness.api.fetch_count("s1").await == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    harness.api.set_fetch_delay(None).await;
    harness
        .api
        .set_messages("s1", vec![Message::new("new", Role::User)])
        .await;
    handle.resync().await.unwrap();

    let snapshot = TestHarness::wait_for(&handle, |s| s.resync_seq.is_some())
        .await
        .unwrap();
    assert_eq!(snapshot.messages[0].id, "new");

    tokio::time::sleep(Duration::from_millis(350)).await;
    let later = handle.snapshot();
    assert_eq!(later.messages[0].id, "new");
    assert_eq!(later.resync_seq, snapshot.resync_seq);
}

#[tokio::test]
async fn approval_events_and_commands_update_pending_set() {
    let harness = TestHarness::builder().build();
    let handle = harness.subscribe_loaded("s1").await.unwrap();

    harness
        .transport
        .push(
            "s1",
            "tool.approval.required",
            json!({"callId": "c1", "toolName": "bash", "messageId": "m1"}),
        )
        .await;
    TestHarness::wait_for(&handle, |s| s.approvals.len() == 1)
        .await
        .unwrap();

    handle.approve("c1").await.unwrap();
    assert!(handle.snapshot().approvals.is_empty());
    assert!(harness.api.calls().await.contains(&ApiCall::Resolve {
        session_id: "s1".into(),
        call_id: "c1".into(),
        approved: true,
    }));
}

#[tokio::test]
async fn rejected_resolution_keeps_call_pending() {
    let harness = TestHarness::builder().build();
    harness.api.set_pending("s1", vec![approval("c1", "m1")]).await;
    harness.api.fail_call("c1").await;
    let handle = harness.subscribe_loaded("s1").await.unwrap();
    TestHarness::wait_for(&handle, |s| s.approvals.len() == 1)
        .await
        .unwrap();

    let err = handle.reject("c1").await.unwrap_err();
    assert!(matches!(err, WeftError::Api { status: Some(409), .. }));
    assert_eq!(call_ids(&handle.snapshot()), vec!["c1"]);
}

#[tokio::test]
async fn approve_all_reports_partial_failure() {
    let harness = TestHarness::builder().build();
    harness
        .api
        .set_pending(
            "s1",
            vec![approval("c1", "m1"), approval("c2", "m1"), approval("c3", "m2")],
        )
        .await;
    harness.api.fail_call("c2").await;
    let handle = harness.subscribe_loaded("s1").await.unwrap();
    TestHarness::wait_for(&handle, |s| s.approvals.len() == 3)
        .await
        .unwrap();

    let report = handle.approve_all(Some("m1")).await.unwrap();
    assert_eq!(report.approved, vec!["c1"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "c2");
    assert!(!report.is_complete());
    assert_eq!(call_ids(&handle.snapshot()), vec!["c2", "c3"]);
}

#[tokio::test]
async fn failed_approval_load_yields_empty_set() {
    let harness = TestHarness::builder().build();
    harness.api.set_pending("s1", vec![approval("c1", "m1")]).await;
    harness.api.fail_pending_approvals(1).await;

    let handle = harness.subscribe_loaded("s1").await.unwrap();
    assert!(handle.snapshot().approvals.is_empty());
    let loads = harness
        .api
        .calls()
        .await
        .into_iter()
        .filter(|c| matches!(c, ApiCall::PendingApprovals(_)))
        .count();
    assert_eq!(loads, 1);
}

#[tokio::test]
async fn topup_select_and_cancel_round_trip() {
    let harness = TestHarness::builder().build();
    let handle = harness.subscribe_loaded("s1").await.unwrap();

    harness
        .transport
        .push(
            "s1",
            "setu.topup.required",
            json!({"amountUsd": 0.5, "currentBalance": 0.1, "messageId": "m1"}),
        )
        .await;
    TestHarness::wait_for(&handle, |s| s.topup.pending.is_some())
        .await
        .unwrap();

    handle.select_topup_method(TopupMethod::Crypto).await.unwrap();
    let topup = handle.snapshot().topup;
    assert_eq!(topup.method, Some(TopupMethod::Crypto));
    assert_eq!(topup.phase, PaymentPhase::Processing);

    let mut updates = handle.updates();
    let reason = handle.cancel_topup(None).await.unwrap();
    assert_eq!(reason, "Request cancelled");
    assert!(handle.snapshot().topup.pending.is_none());

    let cancelled = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let Ok(SyncUpdate::TopupCancelled { reason }) = updates.recv().await {
                return reason;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(cancelled, "Request cancelled");
}

#[tokio::test]
async fn failed_topup_cancel_keeps_local_state() {
    let harness = TestHarness::builder().build();
    let handle = harness.subscribe_loaded("s1").await.unwrap();
    harness
        .transport
        .push("s1", "setu.topup.required", json!({"amountUsd": 1.0}))
        .await;
    TestHarness::wait_for(&handle, |s| s.topup.pending.is_some())
        .await
        .unwrap();

    harness.api.fail_topup_commands(true).await;
    assert!(handle.cancel_topup(Some("changed my mind")).await.is_err());
    assert!(handle.snapshot().topup.pending.is_some());
    assert!(harness.api.calls().await.contains(&ApiCall::CancelTopup {
        session_id: "s1".into(),
        reason: Some("changed my mind".into()),
    }));
}

#[tokio::test]
async fn dropped_stream_reconnects_and_resyncs() {
    let harness = TestHarness::builder().build();
    let handle = harness.subscribe_loaded("s1").await.unwrap();
    let first_seq = handle.snapshot().resync_seq;

    harness.transport.fail_next_subscribes(2).await;
    harness.transport.disconnect("s1").await;

    tokio::time::timeout(
        Duration::from_secs(5),
        harness.transport.wait_for_subscribes("s1", 2),
    )
    .await
    .unwrap();
    let snapshot = TestHarness::wait_for(&handle, |s| s.connected && s.resync_seq > first_seq)
        .await
        .unwrap();
    assert!(snapshot.connected);

    // The new stream is live.
    harness
        .transport
        .push("s1", "queue.updated", json!({"queueLength": 3}))
        .await;
    TestHarness::wait_for(&handle, |s| s.queue.queue_length == 3)
        .await
        .unwrap();
}

#[tokio::test]
async fn resubscribe_replaces_previous_driver() {
    let harness = TestHarness::builder().build();
    let first = harness.subscribe_loaded("s1").await.unwrap();
    let second = harness.subscribe_loaded("s1").await.unwrap();

    assert!(first.is_closed());
    assert!(matches!(
        first.resync().await,
        Err(WeftError::SubscriptionClosed(_))
    ));
    assert!(!second.is_closed());
    assert_eq!(
        harness.registry.active_sessions().await,
        vec![SessionId::from("s1")]
    );
}

#[tokio::test]
async fn sessions_are_isolated() {
    let harness = TestHarness::builder().build();
    let a = harness.subscribe_loaded("a").await.unwrap();
    let b = harness.subscribe_loaded("b").await.unwrap();

    harness
        .transport
        .push("a", "message.created", json!({"id": "m1", "role": "assistant"}))
        .await;
    TestHarness::wait_for(&a, |s| s.messages.len() == 1)
        .await
        .unwrap();
    assert!(b.snapshot().messages.is_empty());
}

#[tokio::test]
async fn subscribe_failure_leaves_no_driver() {
    let harness = TestHarness::builder().build();
    harness.transport.fail_next_subscribes(1).await;

    let err = harness.subscribe("s1").await.unwrap_err();
    assert!(matches!(err, WeftError::Transport { .. }));
    assert!(harness.registry.handle(&SessionId::from("s1")).await.is_none());
}

#[tokio::test]
async fn unsubscribe_and_cancel_close_the_handle() {
    let harness = TestHarness::builder().build();
    let a = harness.subscribe_loaded("a").await.unwrap();
    let b = harness.subscribe_loaded("b").await.unwrap();

    assert!(harness.registry.unsubscribe(&SessionId::from("a")).await);
    assert!(!harness.registry.unsubscribe(&SessionId::from("a")).await);
    assert!(matches!(
        a.approve("c1").await,
        Err(WeftError::SubscriptionClosed(_))
    ));

    b.cancel();
    assert!(matches!(
        b.resync().await,
        Err(WeftError::SubscriptionClosed(_))
    ));

    harness.registry.shutdown().await;
    assert!(harness.registry.active_sessions().await.is_empty());
}
