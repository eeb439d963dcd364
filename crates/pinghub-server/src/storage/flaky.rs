//! Fault-injecting store wrapper.
//!
//! Wraps a real backend and fails operations at a configured rate, so tests
//! can exercise the path where a storage call fails mid-event. The RNG is a
//! seeded LCG: a given seed replays the exact same failure pattern.

use std::sync::{Arc, Mutex};

use pinghub_proto::{Group, GroupId, Message, MessageId, RoomId, UserId};

use super::{Store, StoreError};

/// Store wrapper that randomly injects failures.
///
/// Delegates to the inner backend; each operation first rolls against the
/// failure rate and returns [`StoreError::Io`] when the roll fails, leaving
/// the inner store untouched. Clones share the RNG and rate, so a single
/// failure sequence spans every handle.
#[derive(Clone)]
pub struct FlakyStore<S: Store> {
    inner: S,
    state: Arc<Mutex<FlakyState>>,
}

struct FlakyState {
    failure_rate: f64,
    rng: Lcg,
}

/// Minimal linear congruential generator, enough for reproducible fault
/// scheduling without pulling an RNG crate into non-test code.
struct Lcg {
    state: u64,
}

impl Lcg {
    const A: u64 = 1_664_525;
    const C: u64 = 1_013_904_223;
    const M: u64 = 1 << 32;

    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0).
    fn next(&mut self) -> f64 {
        self.state = Self::A.wrapping_mul(self.state).wrapping_add(Self::C) % Self::M;
        (self.state as f64) / (Self::M as f64)
    }
}

impl<S: Store> FlakyStore<S> {
    /// Wrap `inner` with the given failure rate (0.0 never fails, 1.0
    /// always fails) and a fixed default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in `[0.0, 1.0]`.
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x9E37_79B9_7F4A_7C15)
    }

    /// Wrap `inner` with an explicit seed for a reproducible failure
    /// sequence.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in `[0.0, 1.0]`.
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be in [0.0, 1.0], got {failure_rate}"
        );

        Self {
            inner,
            state: Arc::new(Mutex::new(FlakyState { failure_rate, rng: Lcg::new(seed) })),
        }
    }

    /// The wrapped backend, for asserting what survived the faults.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Change the failure rate on a live store, e.g. to model recovery.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in `[0.0, 1.0]` or the state mutex
    /// is poisoned.
    #[allow(clippy::expect_used)]
    pub fn set_failure_rate(&self, failure_rate: f64) {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be in [0.0, 1.0], got {failure_rate}"
        );
        self.state.lock().expect("Mutex poisoned").failure_rate = failure_rate;
    }

    #[allow(clippy::expect_used)]
    fn gate(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("Mutex poisoned");
        let rate = state.failure_rate;
        if state.rng.next() < rate {
            return Err(StoreError::Io("injected storage fault".to_string()));
        }
        Ok(())
    }
}

impl<S: Store> Store for FlakyStore<S> {
    fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        self.gate()?;
        self.inner.insert_message(message)
    }

    fn message(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        self.gate()?;
        self.inner.message(id)
    }

    fn update_message<F>(&self, id: MessageId, mutate: F) -> Result<Option<Message>, StoreError>
    where
        F: FnOnce(&mut Message),
    {
        self.gate()?;
        self.inner.update_message(id, mutate)
    }

    fn delete_message(&self, id: MessageId) -> Result<bool, StoreError> {
        self.gate()?;
        self.inner.delete_message(id)
    }

    fn messages_by_room_desc(
        &self,
        room: RoomId,
        limit: usize,
        since: Option<u64>,
    ) -> Result<Vec<Message>, StoreError> {
        self.gate()?;
        self.inner.messages_by_room_desc(room, limit, since)
    }

    fn pinned_messages(&self, room: RoomId, limit: usize) -> Result<Vec<Message>, StoreError> {
        self.gate()?;
        self.inner.pinned_messages(room, limit)
    }

    fn count_messages(&self, room: RoomId) -> Result<usize, StoreError> {
        self.gate()?;
        self.inner.count_messages(room)
    }

    fn insert_group(&self, group: &Group) -> Result<(), StoreError> {
        self.gate()?;
        self.inner.insert_group(group)
    }

    fn group(&self, id: GroupId) -> Result<Option<Group>, StoreError> {
        self.gate()?;
        self.inner.group(id)
    }

    fn update_group<F>(&self, id: GroupId, mutate: F) -> Result<Option<Group>, StoreError>
    where
        F: FnOnce(&mut Group),
    {
        self.gate()?;
        self.inner.update_group(id, mutate)
    }

    fn groups_for_member(&self, user: &UserId) -> Result<Vec<Group>, StoreError> {
        self.gate()?;
        self.inner.groups_for_member(user)
    }
}

#[cfg(test)]
mod tests {
    use pinghub_proto::{MessageBody, MessageMetadata};

    use super::*;
    use crate::storage::MemoryStore;

    fn message(id: u128) -> Message {
        Message {
            id: MessageId::from_u128(id),
            user_id: UserId::from("u1"),
            username: "alice".to_string(),
            room: RoomId::Global,
            body: MessageBody::Text { text: "hi".to_string() },
            timestamp: 100,
            metadata: MessageMetadata::new(100),
        }
    }

    #[test]
    fn rate_zero_never_fails() {
        let store = FlakyStore::new(MemoryStore::new(), 0.0);

        for i in 0..50 {
            store.insert_message(&message(i)).unwrap();
        }
        assert_eq!(store.inner().count_messages(RoomId::Global).unwrap(), 50);
    }

    #[test]
    fn rate_one_always_fails_and_writes_nothing() {
        let store = FlakyStore::new(MemoryStore::new(), 1.0);

        for i in 0..10 {
            assert!(matches!(store.insert_message(&message(i)), Err(StoreError::Io(_))));
        }
        assert_eq!(store.inner().count_messages(RoomId::Global).unwrap(), 0);
    }

    #[test]
    fn same_seed_replays_the_same_failure_pattern() {
        let a = FlakyStore::with_seed(MemoryStore::new(), 0.5, 42);
        let b = FlakyStore::with_seed(MemoryStore::new(), 0.5, 42);

        for i in 0..32 {
            assert_eq!(
                a.insert_message(&message(i)).is_ok(),
                b.insert_message(&message(i)).is_ok()
            );
        }
    }

    #[test]
    fn recovery_lets_writes_through_again() {
        let store = FlakyStore::new(MemoryStore::new(), 1.0);
        assert!(store.insert_message(&message(1)).is_err());

        store.set_failure_rate(0.0);
        store.insert_message(&message(1)).unwrap();
        assert_eq!(store.inner().count_messages(RoomId::Global).unwrap(), 1);
    }
}
