//! Multi-session scenarios across the whole service stack.

use std::sync::Arc;

use tempfile::tempdir;

use crate::bus::LocalBus;
use crate::content::MemoryCatalog;
use crate::hub::{BroadcastHub, MessageKind};
use crate::rooms::ChatService;
use crate::store::{MemoryRoomStore, RoomStore, SledRoomStore};
use crate::test_support::{day, inbox, next_message, summary};

fn catalog(ids: &[u64]) -> Arc<MemoryCatalog> {
    let catalog = Arc::new(MemoryCatalog::new());
    for &id in ids {
        catalog.insert(summary(id, day(id as u32)));
    }
    catalog
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn integration_interleaved_sessions_keep_counts_consistent() {
    let store = Arc::new(MemoryRoomStore::new());
    let hub = Arc::new(BroadcastHub::new(Arc::new(LocalBus::default())));
    let service = ChatService::new(store.clone(), hub.clone(), catalog(&[1, 2, 3]));

    // One anchor per room keeps every room open while the workers move.
    let mut anchors = Vec::new();
    for content_id in 1..=3u64 {
        let (handler, rx) = inbox();
        let session = format!("anchor-{content_id}");
        service.enter(&session, content_id, handler).await.unwrap();
        anchors.push((session, rx));
    }

    let mut workers = Vec::new();
    for i in 0..8u64 {
        let service = service.clone();
        workers.push(tokio::spawn(async move {
            let session = format!("worker-{i}");
            let (handler, _rx) = inbox();
            service.enter(&session, i % 3 + 1, handler).await.unwrap();
            service.send_message(&session, &format!("hi from {i}")).await.unwrap();
            service.exit(&session).await.unwrap().unwrap();

            let (handler, _rx) = inbox();
            service.enter(&session, (i + 1) % 3 + 1, handler).await.unwrap();
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }

    assert_eq!(store.get_count("1").await.unwrap(), 3);
    assert_eq!(store.get_count("2").await.unwrap(), 4);
    assert_eq!(store.get_count("3").await.unwrap(), 4);
    for room in ["1", "2", "3"] {
        let occupancy = store.get_count(room).await.unwrap() as usize;
        assert_eq!(hub.handler_count(room).await, occupancy);
    }

    // Each anchor saw the talk of the workers that started in its room.
    for ((_, rx), expected) in anchors.iter_mut().zip([3, 3, 2]) {
        let mut talks = 0;
        while talks < expected {
            if next_message(rx).await.kind == MessageKind::Talk {
                talks += 1;
            }
        }
    }

    let page = service.list_rooms(0, 10).await.unwrap();
    let listed: Vec<_> = page
        .rooms
        .iter()
        .map(|r| (r.room_id.as_str(), r.occupancy))
        .collect();
    assert_eq!(listed, vec![("3", 4), ("2", 4), ("1", 3)]);

    let mut sessions: Vec<String> = anchors.into_iter().map(|(s, _)| s).collect();
    sessions.extend((0..8).map(|i| format!("worker-{i}")));
    let mut exits = Vec::new();
    for session in sessions {
        let service = service.clone();
        exits.push(tokio::spawn(async move { service.exit(&session).await.unwrap() }));
    }
    for exit in exits {
        assert!(exit.await.unwrap().is_some());
    }

    assert!(store.list_room_ids().await.unwrap().is_empty());
    assert_eq!(hub.subscription_count().await, 0);
}

#[tokio::test]
async fn integration_two_processes_share_sled_store_and_bus() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SledRoomStore::open(dir.path().to_str().unwrap()).unwrap());
    let bus = Arc::new(LocalBus::default());
    let content = catalog(&[7]);

    let hub_a = Arc::new(BroadcastHub::new(bus.clone()));
    let hub_b = Arc::new(BroadcastHub::new(bus.clone()));
    let process_a = ChatService::new(store.clone(), hub_a.clone(), content.clone());
    let process_b = ChatService::new(store.clone(), hub_b.clone(), content);

    let (alice, mut alice_rx) = inbox();
    let (bob, _bob_rx) = inbox();
    assert_eq!(process_a.enter("alice", 7, alice).await.unwrap().occupancy, 1);
    assert_eq!(process_b.enter("bob", 7, bob).await.unwrap().occupancy, 2);
    assert!(process_a.is_chat_active(7).await.unwrap());

    process_b.send_message("bob", "across processes").await.unwrap();
    let talk = loop {
        let message = next_message(&mut alice_rx).await;
        if message.kind == MessageKind::Talk {
            break message;
        }
    };
    assert_eq!(talk.sender, "bob");
    assert_eq!(talk.payload, "across processes");

    // Leaving through one process is visible to the other.
    let left = process_a.exit("alice").await.unwrap().unwrap();
    assert_eq!(left.occupancy, 1);
    assert_eq!(process_b.occupancy("7").await.unwrap(), 1);
    assert_eq!(hub_a.subscription_count().await, 0);
    assert!(hub_b.is_subscribed("7").await);

    process_b.exit("bob").await.unwrap().unwrap();
    assert!(!process_a.is_chat_active(7).await.unwrap());
    assert_eq!(hub_b.subscription_count().await, 0);
    assert!(store.list_room_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn integration_admin_close_evicts_local_handlers() {
    let store = Arc::new(MemoryRoomStore::new());
    let hub = Arc::new(BroadcastHub::new(Arc::new(LocalBus::default())));
    let service = ChatService::new(store.clone(), hub.clone(), catalog(&[5]));

    for session in ["s1", "s2"] {
        let (handler, _rx) = inbox();
        service.enter(session, 5, handler).await.unwrap();
    }
    service.close_room("5").await.unwrap();

    assert!(!service.is_chat_active(5).await.unwrap());
    assert_eq!(hub.handler_count("5").await, 0);
    assert_eq!(store.get_count("5").await.unwrap(), 0);

    // Memberships survive the close; leaving afterwards stays at zero.
    let left = service.leave("s1").await.unwrap().unwrap();
    assert_eq!(left.occupancy, 0);
}
