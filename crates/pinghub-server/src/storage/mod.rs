//! Storage abstraction for messages and groups.
//!
//! Trait-based abstraction over the durable document store. The trait is
//! synchronous (no async) to keep the routing logic sans-IO; backends are
//! expected to complete calls quickly.

mod flaky;
mod memory;
mod redb;

use pinghub_proto::{Group, GroupId, Message, MessageId, RoomId, UserId};
use thiserror::Error;

pub use self::{flaky::FlakyStore, memory::MemoryStore, redb::RedbStore};

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// I/O error (file system, database).
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization or deserialization of a stored document failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored data violates the schema (short key, missing index target).
    #[error("corrupt store: {0}")]
    Corrupt(String),
}

/// Document store for messages and groups.
///
/// Must be Clone (shared across the router and runtime), Send + Sync, and
/// synchronous. Implementations share internal state via Arc, so clones
/// access the same underlying store.
///
/// `update_message` / `update_group` are atomic per-document
/// read-modify-write operations and return the document *after* the
/// mutation. Concurrent mutations of the same document serialize inside the
/// store; the last write wins field-by-field through the closure.
pub trait Store: Clone + Send + Sync + 'static {
    /// Persist a new message document.
    fn insert_message(&self, message: &Message) -> Result<(), StoreError>;

    /// Load a message by id. `None` if absent.
    fn message(&self, id: MessageId) -> Result<Option<Message>, StoreError>;

    /// Atomically mutate a message and return the post-mutation document.
    ///
    /// `id`, `room`, and `timestamp` are immutable: any change the closure
    /// makes to them is discarded. Returns `None` if the message does not
    /// exist (the closure is not called).
    fn update_message<F>(&self, id: MessageId, mutate: F) -> Result<Option<Message>, StoreError>
    where
        F: FnOnce(&mut Message);

    /// Delete a message. Returns whether a document was removed.
    fn delete_message(&self, id: MessageId) -> Result<bool, StoreError>;

    /// Messages in a room, newest first, at most `limit`.
    ///
    /// With `since`, only messages with `timestamp >= since` are returned.
    fn messages_by_room_desc(
        &self,
        room: RoomId,
        limit: usize,
        since: Option<u64>,
    ) -> Result<Vec<Message>, StoreError>;

    /// Pinned messages in a room, most recently pinned first, at most
    /// `limit`.
    fn pinned_messages(&self, room: RoomId, limit: usize) -> Result<Vec<Message>, StoreError>;

    /// Number of messages stored for a room.
    fn count_messages(&self, room: RoomId) -> Result<usize, StoreError>;

    /// Persist a new group document.
    fn insert_group(&self, group: &Group) -> Result<(), StoreError>;

    /// Load a group by id. `None` if absent.
    fn group(&self, id: GroupId) -> Result<Option<Group>, StoreError>;

    /// Atomically mutate a group and return the post-mutation document.
    ///
    /// Returns `None` if the group does not exist (the closure is not
    /// called).
    fn update_group<F>(&self, id: GroupId, mutate: F) -> Result<Option<Group>, StoreError>
    where
        F: FnOnce(&mut Group);

    /// All groups that have `user` as a member. Order is not guaranteed.
    fn groups_for_member(&self, user: &UserId) -> Result<Vec<Group>, StoreError>;
}

/// Apply a message mutation while preserving the immutable fields.
///
/// Shared by all backends so the immutability guarantee cannot drift
/// between implementations.
pub(crate) fn apply_message_update<F: FnOnce(&mut Message)>(message: &mut Message, mutate: F) {
    let id = message.id;
    let room = message.room;
    let timestamp = message.timestamp;

    mutate(message);

    message.id = id;
    message.room = room;
    message.timestamp = timestamp;
}

/// Sort newest first with the id as a stable tie-break for equal
/// timestamps.
pub(crate) fn sort_desc(messages: &mut [Message]) {
    messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
}
