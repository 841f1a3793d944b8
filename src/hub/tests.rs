use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::{BroadcastHub, ChatMessage, MessageKind};
use crate::bus::LocalBus;
use crate::test_support::{CountingBus, DownBus, inbox, next_message as next};
use crate::utils::ChatError;

#[tokio::test]
async fn handlers_of_one_room_share_one_subscription() {
    let bus = CountingBus::new();
    let hub = BroadcastHub::new(bus.clone());

    for i in 0..3 {
        let (handler, _rx) = inbox();
        hub.subscribe("42", format!("h{i}"), handler).await.unwrap();
    }

    assert_eq!(bus.subscribe_calls(), 1);
    assert_eq!(bus.inner.subscriber_count("chat:room:42"), 1);
    assert_eq!(hub.handler_count("42").await, 3);

    assert!(hub.unsubscribe("42", "h0").await);
    assert!(hub.unsubscribe("42", "h1").await);
    assert!(hub.is_subscribed("42").await);
    assert_eq!(bus.inner.subscriber_count("chat:room:42"), 1);

    assert!(hub.unsubscribe("42", "h2").await);
    assert!(!hub.is_subscribed("42").await);
    assert_eq!(hub.subscription_count().await, 0);
    assert_eq!(bus.inner.subscriber_count("chat:room:42"), 0);
}

#[tokio::test]
async fn unsubscribing_unknown_handler_is_a_no_op() {
    let hub = BroadcastHub::new(Arc::new(LocalBus::default()));
    assert!(!hub.unsubscribe("42", "ghost").await);

    let (handler, _rx) = inbox();
    hub.subscribe("42", "h0", handler).await.unwrap();
    assert!(!hub.unsubscribe("42", "ghost").await);
    assert!(hub.is_subscribed("42").await);
}

#[tokio::test]
async fn published_messages_reach_every_local_handler() {
    let hub = BroadcastHub::new(Arc::new(LocalBus::default()));
    let (first, mut first_rx) = inbox();
    let (second, mut second_rx) = inbox();
    let (other_room, mut other_rx) = inbox();

    hub.subscribe("42", "a", first).await.unwrap();
    hub.subscribe("42", "b", second).await.unwrap();
    hub.subscribe("7", "c", other_room).await.unwrap();

    hub.publish(&ChatMessage::talk("42", "s1", "hello")).await.unwrap();

    assert_eq!(next(&mut first_rx).await.payload, "hello");
    assert_eq!(next(&mut second_rx).await.payload, "hello");
    assert!(other_rx.try_recv().is_err());
}

#[tokio::test]
async fn delivery_preserves_publish_order() {
    let hub = BroadcastHub::new(Arc::new(LocalBus::default()));
    let (handler, mut rx) = inbox();
    hub.subscribe("42", "a", handler).await.unwrap();

    for i in 0..20 {
        hub.publish(&ChatMessage::talk("42", "s1", format!("m{i}")))
            .await
            .unwrap();
    }

    for i in 0..20 {
        assert_eq!(next(&mut rx).await.payload, format!("m{i}"));
    }
}

#[tokio::test]
async fn failed_bus_subscribe_registers_nothing() {
    let hub = BroadcastHub::new(Arc::new(DownBus));
    let (handler, _rx) = inbox();

    let err = hub.subscribe("42", "a", handler).await.unwrap_err();
    assert!(matches!(err, ChatError::BusUnavailable(_)));
    assert!(!hub.is_subscribed("42").await);
    assert_eq!(hub.handler_count("42").await, 0);
}

#[tokio::test]
async fn failed_publish_is_reported() {
    let hub = BroadcastHub::new(Arc::new(DownBus));
    let err = hub
        .publish(&ChatMessage::talk("42", "s1", "lost"))
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn close_room_drops_all_handlers() {
    let bus = Arc::new(LocalBus::default());
    let hub = BroadcastHub::new(bus.clone());
    let (a, _a_rx) = inbox();
    let (b, _b_rx) = inbox();
    hub.subscribe("42", "a", a).await.unwrap();
    hub.subscribe("42", "b", b).await.unwrap();

    assert_eq!(hub.close_room("42").await, 2);
    assert_eq!(hub.close_room("42").await, 0);
    assert!(!hub.has_handler("42", "a").await);
    assert_eq!(bus.subscriber_count("chat:room:42"), 0);
}

#[tokio::test]
async fn closures_can_be_handlers() {
    let hub = BroadcastHub::new(Arc::new(LocalBus::default()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handler = move |room_id: &str, message: &ChatMessage| {
        let _ = tx.send((room_id.to_string(), message.kind));
    };

    hub.subscribe("9", "closure", Arc::new(handler)).await.unwrap();
    hub.publish(&ChatMessage::new("9", "s1", MessageKind::Enter, ""))
        .await
        .unwrap();

    let (room_id, kind) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(room_id, "9");
    assert_eq!(kind, MessageKind::Enter);
}

#[test]
fn chat_message_wire_format() {
    let message = ChatMessage::talk("42", "s1", "hi");
    let json: serde_json::Value = serde_json::to_value(&message).unwrap();
    assert_eq!(json["kind"], "talk");
    assert_eq!(json["room_id"], "42");
    assert!(!message.message_id.is_empty());
}

#[tokio::test]
async fn cleanup_handler_leaves_every_room() {
    let bus = Arc::new(LocalBus::default());
    let hub = BroadcastHub::new(bus.clone());
    let (a, _a_rx) = inbox();
    let (b, _b_rx) = inbox();
    hub.subscribe("1", "a", a.clone()).await.unwrap();
    hub.subscribe("2", "a", a).await.unwrap();
    hub.subscribe("2", "b", b).await.unwrap();

    let mut left = hub.cleanup_handler("a").await;
    left.sort();
    assert_eq!(left, vec!["1".to_string(), "2".to_string()]);

    assert!(!hub.is_subscribed("1").await);
    assert_eq!(bus.subscriber_count("chat:room:1"), 0);
    assert!(hub.has_handler("2", "b").await);
    assert!(hub.cleanup_handler("a").await.is_empty());
}
