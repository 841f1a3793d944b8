use futures::StreamExt;

use super::{LocalBus, MessageBus};

#[tokio::test]
async fn local_bus_delivers_in_publish_order() {
    let bus = LocalBus::new(16);
    let mut stream = bus.subscribe("chat:room:1").await.unwrap();

    for i in 0..5 {
        bus.publish("chat:room:1", format!("m{i}")).await.unwrap();
    }

    for i in 0..5 {
        assert_eq!(stream.next().await.unwrap(), format!("m{i}"));
    }
}

#[tokio::test]
async fn local_bus_keeps_topics_apart() {
    let bus = LocalBus::default();
    let mut one = bus.subscribe("chat:room:1").await.unwrap();
    let mut two = bus.subscribe("chat:room:2").await.unwrap();

    bus.publish("chat:room:2", "for two".into()).await.unwrap();
    bus.publish("chat:room:1", "for one".into()).await.unwrap();

    assert_eq!(one.next().await.unwrap(), "for one");
    assert_eq!(two.next().await.unwrap(), "for two");
}

#[tokio::test]
async fn dropping_the_stream_closes_the_subscription() {
    let bus = LocalBus::default();
    let first = bus.subscribe("chat:room:1").await.unwrap();
    let second = bus.subscribe("chat:room:1").await.unwrap();
    assert_eq!(bus.subscriber_count("chat:room:1"), 2);

    drop(first);
    assert_eq!(bus.subscriber_count("chat:room:1"), 1);
    drop(second);
    assert_eq!(bus.subscriber_count("chat:room:1"), 0);
}

#[tokio::test]
async fn idle_topics_are_removed() {
    let bus = LocalBus::default();
    let first = bus.subscribe("chat:room:1").await.unwrap();
    let second = bus.subscribe("chat:room:1").await.unwrap();
    let other = bus.subscribe("chat:room:2").await.unwrap();
    assert_eq!(bus.topic_count(), 2);

    drop(first);
    assert_eq!(bus.topic_count(), 2);
    drop(second);
    assert_eq!(bus.topic_count(), 1);
    drop(other);
    assert_eq!(bus.topic_count(), 0);

    // A later subscription recreates the topic.
    let mut again = bus.subscribe("chat:room:1").await.unwrap();
    bus.publish("chat:room:1", "back".into()).await.unwrap();
    assert_eq!(again.next().await.unwrap(), "back");
}

#[tokio::test]
async fn publish_without_subscribers_is_not_an_error() {
    let bus = LocalBus::default();
    bus.publish("chat:room:404", "nobody".into()).await.unwrap();
    assert_eq!(bus.subscriber_count("chat:room:404"), 0);
}

#[tokio::test]
async fn lagging_subscriber_skips_overflow() {
    let bus = LocalBus::new(2);
    let mut stream = bus.subscribe("chat:room:1").await.unwrap();

    for i in 0..4 {
        bus.publish("chat:room:1", format!("m{i}")).await.unwrap();
    }

    assert_eq!(stream.next().await.unwrap(), "m2");
    assert_eq!(stream.next().await.unwrap(), "m3");
}
