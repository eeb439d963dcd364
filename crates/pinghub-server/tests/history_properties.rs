//! Property-based tests for room history.
//!
//! Verifies the ordering and limit laws that every history reply must
//! satisfy, for arbitrary insertion orders and timestamps.

use pinghub_proto::{MessageBody, MessageId, RoomId, UserId};
use pinghub_server::{MessageStore, NewMessage, Store};
use pinghub_server::{MemoryStore, StoreError};
use proptest::prelude::*;

fn new_message(i: usize) -> NewMessage {
    NewMessage {
        room: RoomId::Global,
        user_id: UserId::from("u1"),
        username: "alice".to_string(),
        body: MessageBody::Text { text: format!("m{i}") },
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// History is always ascending by timestamp, regardless of insertion
    /// order.
    #[test]
    fn prop_history_is_ascending(
        timestamps in prop::collection::vec(0u64..1_000_000, 0..40),
        limit in 1usize..60
    ) {
        let messages = MessageStore::new(MemoryStore::new());
        for (i, ts) in timestamps.iter().enumerate() {
            messages.create(new_message(i), MessageId::from_u128(i as u128), *ts)?;
        }

        let history = messages.list_by_room(RoomId::Global, limit, None)?;

        prop_assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    /// History never exceeds the limit, and under the limit it is complete.
    #[test]
    fn prop_history_respects_limit(
        timestamps in prop::collection::vec(0u64..1_000_000, 0..40),
        limit in 1usize..60
    ) {
        let messages = MessageStore::new(MemoryStore::new());
        for (i, ts) in timestamps.iter().enumerate() {
            messages.create(new_message(i), MessageId::from_u128(i as u128), *ts)?;
        }

        let history = messages.list_by_room(RoomId::Global, limit, None)?;

        prop_assert_eq!(history.len(), timestamps.len().min(limit));
    }

    /// When the limit truncates, it is always the oldest messages that are
    /// dropped: every kept timestamp is >= every dropped one.
    #[test]
    fn prop_limit_drops_oldest_first(
        timestamps in prop::collection::vec(0u64..1_000_000, 5..40),
        limit in 1usize..5
    ) {
        let store = MemoryStore::new();
        let messages = MessageStore::new(store.clone());
        for (i, ts) in timestamps.iter().enumerate() {
            messages.create(new_message(i), MessageId::from_u128(i as u128), *ts)?;
        }

        let kept = messages.list_by_room(RoomId::Global, limit, None)?;
        let all = messages.list_by_room(RoomId::Global, timestamps.len(), None)?;

        let kept_ids: Vec<MessageId> = kept.iter().map(|m| m.id).collect();
        let min_kept = kept.iter().map(|m| m.timestamp).min().unwrap_or(0);

        for dropped in all.iter().filter(|m| !kept_ids.contains(&m.id)) {
            prop_assert!(dropped.timestamp <= min_kept);
        }
    }

    /// The `since` filter never returns anything older than the cutoff.
    #[test]
    fn prop_since_filters_older_messages(
        timestamps in prop::collection::vec(0u64..1_000_000, 0..40),
        since in 0u64..1_000_000
    ) {
        let messages = MessageStore::new(MemoryStore::new());
        for (i, ts) in timestamps.iter().enumerate() {
            messages.create(new_message(i), MessageId::from_u128(i as u128), *ts)?;
        }

        let history =
            messages.list_by_room(RoomId::Global, timestamps.len().max(1), Some(since))?;

        prop_assert!(history.iter().all(|m| m.timestamp >= since));
    }
}

/// The two storage backends agree on history for the same inputs.
#[test]
fn memory_and_redb_agree_on_history() -> Result<(), StoreError> {
    let dir = tempfile::tempdir().unwrap();
    let redb = pinghub_server::RedbStore::open(dir.path().join("agree.redb"))?;
    let memory = MemoryStore::new();

    let timestamps = [500u64, 100, 900, 100, 300];
    for (i, ts) in timestamps.iter().enumerate() {
        for store in [&redb as &dyn AnyStore, &memory as &dyn AnyStore] {
            store.put(i, *ts)?;
        }
    }

    let from_redb = MessageStore::new(redb).list_by_room(RoomId::Global, 3, None).unwrap();
    let from_memory = MessageStore::new(memory).list_by_room(RoomId::Global, 3, None).unwrap();

    let redb_ids: Vec<MessageId> = from_redb.iter().map(|m| m.id).collect();
    let memory_ids: Vec<MessageId> = from_memory.iter().map(|m| m.id).collect();
    assert_eq!(redb_ids, memory_ids);
    Ok(())
}

/// Object-safe shim so the agreement test can drive both backends through
/// one loop.
trait AnyStore {
    fn put(&self, i: usize, ts: u64) -> Result<(), StoreError>;
}

impl<S: Store> AnyStore for S {
    fn put(&self, i: usize, ts: u64) -> Result<(), StoreError> {
        let message = pinghub_proto::Message {
            id: MessageId::from_u128(i as u128),
            user_id: UserId::from("u1"),
            username: "alice".to_string(),
            room: RoomId::Global,
            body: MessageBody::Text { text: format!("m{i}") },
            timestamp: ts,
            metadata: pinghub_proto::MessageMetadata::new(ts),
        };
        self.insert_message(&message)
    }
}
