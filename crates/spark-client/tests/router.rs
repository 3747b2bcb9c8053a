mod support;

use serde_json::json;

use spark_client::CoreUpdate;
use spark_shared::protocol::INBOUND_EVENTS;

use support::*;

#[tokio::test]
async fn test_attach_detach_is_symmetric() {
    let h = Harness::new(ack_everything());
    assert_eq!(h.transport.subscription_count(), 0);

    let mut router = h.core.event_router();
    assert!(router.attach(&h.core));
    assert_eq!(h.transport.subscription_count(), INBOUND_EVENTS.len());

    // A second attach does not register twice.
    assert!(!router.attach(&h.core));
    assert_eq!(h.transport.subscription_count(), INBOUND_EVENTS.len());
    assert_eq!(h.transport.subscriptions_for("new-message"), 1);

    router.detach();
    assert_eq!(h.transport.subscription_count(), 0);
    router.detach();

    // Re-attaching after a detach works.
    assert!(router.attach(&h.core));
    drop(router);
    assert_eq!(h.transport.subscription_count(), 0);
}

#[tokio::test]
async fn test_inbound_message_flows_through_router() {
    let h = Harness::new(ack_everything());
    let mut updates = h.core.subscribe();
    let mut router = h.core.event_router();
    router.attach(&h.core);

    let delivered = h.transport.deliver(
        "new-message",
        json!({
            "_id": "00000000000000000000abcd",
            "sender": BOB,
            "recipient": ALICE,
            "type": "text",
            "content": "hi alice",
            "createdAt": "2024-05-01T10:00:00Z"
        }),
    );
    assert_eq!(delivered, 1);

    let update = next_update(&mut updates, |u| matches!(u, CoreUpdate::MessagesChanged { .. })).await;
    assert_eq!(update, CoreUpdate::MessagesChanged { counterparty: user(BOB) });
    eventually(|| h.core.conversations().len() == 1).await;
    assert_eq!(h.core.unread_count(BOB), Some(1));
}

#[tokio::test]
async fn test_events_apply_in_arrival_order() {
    let h = Harness::new(ack_everything());
    let mut router = h.core.event_router();
    router.attach(&h.core);

    h.transport.deliver("user-offline", json!({ "userId": BOB }));
    h.transport.deliver("user-online", json!({ "userId": BOB }));

    eventually(|| h.core.presence(BOB) == Some(true)).await;
}

#[tokio::test]
async fn test_malformed_events_are_dropped() {
    let h = Harness::new(ack_everything());
    let mut router = h.core.event_router();
    router.attach(&h.core);

    h.transport.deliver("new-message", json!({ "sender": "nobody" }));
    h.transport.deliver("incoming-call", json!("garbage"));
    h.transport.deliver("user-online", json!({ "userId": CAROL }));

    eventually(|| h.core.presence(CAROL) == Some(true)).await;
    assert!(h.core.messages(BOB).unwrap().is_empty());
    assert_eq!(h.core.call().status, spark_client::CallStatus::Idle);
}

#[tokio::test]
async fn test_detached_router_stops_routing() {
    let h = Harness::new(ack_everything());
    let mut router = h.core.event_router();
    router.attach(&h.core);
    router.detach();

    assert_eq!(h.transport.deliver("user-online", json!({ "userId": BOB })), 0);
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(h.core.presence(BOB), None);
}
