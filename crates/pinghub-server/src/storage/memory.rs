//! In-memory store backend.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use pinghub_proto::{Group, GroupId, Message, MessageId, RoomId, UserId};

use super::{Store, StoreError, apply_message_update, sort_desc};

/// In-memory store for tests and ephemeral runs.
///
/// Uses `HashMap` behind `Arc<Mutex<>>` so clones share state and mutations
/// are atomic per call. Thread-safe through the Mutex, but uses
/// `lock().expect()` which will panic if the mutex is poisoned - acceptable
/// here because no store call panics while holding the lock.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

struct MemoryStoreInner {
    messages: HashMap<MessageId, Message>,
    groups: HashMap<GroupId, Group>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                messages: HashMap::new(),
                groups: HashMap::new(),
            })),
        }
    }

    /// Total number of messages across all rooms.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn total_message_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").messages.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    #[allow(clippy::expect_used)]
    fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        self.inner.lock().expect("Mutex poisoned").messages.insert(message.id, message.clone());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn message(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        Ok(self.inner.lock().expect("Mutex poisoned").messages.get(&id).cloned())
    }

    #[allow(clippy::expect_used)]
    fn update_message<F>(&self, id: MessageId, mutate: F) -> Result<Option<Message>, StoreError>
    where
        F: FnOnce(&mut Message),
    {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        let Some(message) = inner.messages.get_mut(&id) else {
            return Ok(None);
        };

        apply_message_update(message, mutate);
        Ok(Some(message.clone()))
    }

    #[allow(clippy::expect_used)]
    fn delete_message(&self, id: MessageId) -> Result<bool, StoreError> {
        Ok(self.inner.lock().expect("Mutex poisoned").messages.remove(&id).is_some())
    }

    #[allow(clippy::expect_used)]
    fn messages_by_room_desc(
        &self,
        room: RoomId,
        limit: usize,
        since: Option<u64>,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");

        let mut messages: Vec<Message> = inner
            .messages
            .values()
            .filter(|m| m.room == room)
            .filter(|m| since.is_none_or(|s| m.timestamp >= s))
            .cloned()
            .collect();

        sort_desc(&mut messages);
        messages.truncate(limit);
        Ok(messages)
    }

    #[allow(clippy::expect_used)]
    fn pinned_messages(&self, room: RoomId, limit: usize) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");

        let mut messages: Vec<Message> = inner
            .messages
            .values()
            .filter(|m| m.room == room && m.metadata.pinned)
            .cloned()
            .collect();

        messages.sort_by(|a, b| {
            b.metadata.pinned_at.cmp(&a.metadata.pinned_at).then_with(|| b.id.cmp(&a.id))
        });
        messages.truncate(limit);
        Ok(messages)
    }

    #[allow(clippy::expect_used)]
    fn count_messages(&self, room: RoomId) -> Result<usize, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.messages.values().filter(|m| m.room == room).count())
    }

    #[allow(clippy::expect_used)]
    fn insert_group(&self, group: &Group) -> Result<(), StoreError> {
        self.inner.lock().expect("Mutex poisoned").groups.insert(group.group_id, group.clone());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn group(&self, id: GroupId) -> Result<Option<Group>, StoreError> {
        Ok(self.inner.lock().expect("Mutex poisoned").groups.get(&id).cloned())
    }

    #[allow(clippy::expect_used)]
    fn update_group<F>(&self, id: GroupId, mutate: F) -> Result<Option<Group>, StoreError>
    where
        F: FnOnce(&mut Group),
    {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        let Some(group) = inner.groups.get_mut(&id) else {
            return Ok(None);
        };

        mutate(group);
        group.group_id = id;
        Ok(Some(group.clone()))
    }

    #[allow(clippy::expect_used)]
    fn groups_for_member(&self, user: &UserId) -> Result<Vec<Group>, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.groups.values().filter(|g| g.is_member(user)).cloned().collect())
    }
}
