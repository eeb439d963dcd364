//! Message operations over the document store.
//!
//! Owns the message lifecycle: creation with server-assigned identity and
//! timestamp, history reads, reaction upserts, and the single-slot pin.
//! Every mutation goes through the store's atomic per-document update, so
//! concurrent mutations of the same message serialize as last-write-wins
//! without any locking here.

use pinghub_proto::{Message, MessageBody, MessageId, MessageMetadata, RoomId, UserId};

use crate::{server_error::EventError, storage::Store};

/// Inputs for a new message. Identity fields come from the session, never
/// from the client payload.
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Target room.
    pub room: RoomId,
    /// Author's user id.
    pub user_id: UserId,
    /// Author's display name at send time.
    pub username: String,
    /// Text or file content.
    pub body: MessageBody,
}

/// Message operations, generic over the storage backend.
#[derive(Debug, Clone)]
pub struct MessageStore<S: Store> {
    store: S,
}

impl<S: Store> MessageStore<S> {
    /// Wrap a storage backend.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create and persist a message.
    ///
    /// The caller supplies the server-issued `id` and wall-clock `now`;
    /// both become immutable. Text messages must carry non-blank text
    /// (file captions may be empty).
    pub fn create(
        &self,
        new: NewMessage,
        id: MessageId,
        now: u64,
    ) -> Result<Message, EventError> {
        if let MessageBody::Text { text } = &new.body {
            if text.trim().is_empty() {
                return Err(EventError::Validation("message text is empty".to_string()));
            }
        }

        let message = Message {
            id,
            user_id: new.user_id,
            username: new.username,
            room: new.room,
            body: new.body,
            timestamp: now,
            metadata: MessageMetadata::new(now),
        };

        self.store.insert_message(&message)?;
        Ok(message)
    }

    /// Load a message by id.
    pub fn get(&self, id: MessageId) -> Result<Message, EventError> {
        self.store.message(id)?.ok_or_else(|| EventError::NotFound("message".to_string()))
    }

    /// Room history, oldest first, at most `limit` of the newest messages.
    ///
    /// With `since`, only messages at or after that timestamp qualify.
    pub fn list_by_room(
        &self,
        room: RoomId,
        limit: usize,
        since: Option<u64>,
    ) -> Result<Vec<Message>, EventError> {
        let mut messages = self.store.messages_by_room_desc(room, limit, since)?;
        messages.reverse();
        Ok(messages)
    }

    /// Add or replace `user`'s reaction. Idempotent for the same symbol.
    pub fn set_reaction(
        &self,
        id: MessageId,
        user: &UserId,
        reaction: &str,
        now: u64,
    ) -> Result<Message, EventError> {
        let user = user.clone();
        let reaction = reaction.to_string();

        self.store
            .update_message(id, |message| {
                message.metadata.reactions.insert(user, reaction);
                message.metadata.last_updated = now;
            })?
            .ok_or_else(|| EventError::NotFound("message".to_string()))
    }

    /// Remove `user`'s reaction. A no-op when none is present.
    pub fn clear_reaction(
        &self,
        id: MessageId,
        user: &UserId,
        now: u64,
    ) -> Result<Message, EventError> {
        let user = user.clone();

        self.store
            .update_message(id, |message| {
                if message.metadata.reactions.remove(&user).is_some() {
                    message.metadata.last_updated = now;
                }
            })?
            .ok_or_else(|| EventError::NotFound("message".to_string()))
    }

    /// Pin a message. Re-pinning overwrites the attribution.
    pub fn pin(
        &self,
        id: MessageId,
        pinned_by: &UserId,
        now: u64,
    ) -> Result<Message, EventError> {
        let pinned_by = pinned_by.clone();

        self.store
            .update_message(id, |message| {
                message.metadata.pinned = true;
                message.metadata.pinned_by = Some(pinned_by);
                message.metadata.pinned_at = Some(now);
                message.metadata.last_updated = now;
            })?
            .ok_or_else(|| EventError::NotFound("message".to_string()))
    }

    /// Unpin a message, clearing the attribution. Idempotent.
    pub fn unpin(&self, id: MessageId, now: u64) -> Result<Message, EventError> {
        self.store
            .update_message(id, |message| {
                message.metadata.pinned = false;
                message.metadata.pinned_by = None;
                message.metadata.pinned_at = None;
                message.metadata.last_updated = now;
            })?
            .ok_or_else(|| EventError::NotFound("message".to_string()))
    }

    /// Pinned messages of a room, most recently pinned first.
    pub fn list_pinned(&self, room: RoomId, limit: usize) -> Result<Vec<Message>, EventError> {
        Ok(self.store.pinned_messages(room, limit)?)
    }

    /// Delete a message.
    pub fn delete(&self, id: MessageId) -> Result<(), EventError> {
        if self.store.delete_message(id)? {
            Ok(())
        } else {
            Err(EventError::NotFound("message".to_string()))
        }
    }

    /// Number of messages stored for a room.
    pub fn count_in_room(&self, room: RoomId) -> Result<usize, EventError> {
        Ok(self.store.count_messages(room)?)
    }
}

#[cfg(test)]
mod tests {
    use pinghub_proto::FileReference;

    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> MessageStore<MemoryStore> {
        MessageStore::new(MemoryStore::new())
    }

    fn text(s: &str) -> NewMessage {
        NewMessage {
            room: RoomId::Global,
            user_id: UserId::from("u1"),
            username: "alice".to_string(),
            body: MessageBody::Text { text: s.to_string() },
        }
    }

    #[test]
    fn create_assigns_identity_and_timestamp() {
        let messages = store();
        let id = MessageId::from_u128(1);

        let created = messages.create(text("hello"), id, 1_000).unwrap();
        assert_eq!(created.id, id);
        assert_eq!(created.timestamp, 1_000);
        assert_eq!(created.metadata.last_updated, 1_000);
        assert!(!created.metadata.pinned);
    }

    #[test]
    fn blank_text_is_rejected() {
        let messages = store();
        let err = messages.create(text("   "), MessageId::from_u128(1), 0).unwrap_err();
        assert!(matches!(err, EventError::Validation(_)));
        assert_eq!(messages.count_in_room(RoomId::Global).unwrap(), 0);
    }

    #[test]
    fn file_message_allows_empty_caption() {
        let messages = store();
        let new = NewMessage {
            room: RoomId::Global,
            user_id: UserId::from("u1"),
            username: "alice".to_string(),
            body: MessageBody::File {
                file: FileReference {
                    filename: "a.png".to_string(),
                    url: "/files/a.png".to_string(),
                    size: 10,
                    mimetype: "image/png".to_string(),
                    expires_at: None,
                },
                text: String::new(),
            },
        };

        assert!(messages.create(new, MessageId::from_u128(1), 0).is_ok());
    }

    #[test]
    fn history_is_oldest_first_keeping_newest() {
        let messages = store();
        for i in 0..5u64 {
            messages.create(text(&format!("m{i}")), MessageId::from_u128(i.into()), i).unwrap();
        }

        let history = messages.list_by_room(RoomId::Global, 3, None).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].timestamp, 2);
        assert_eq!(history[2].timestamp, 4);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn set_reaction_is_idempotent() {
        let messages = store();
        let id = MessageId::from_u128(1);
        messages.create(text("hi"), id, 0).unwrap();

        let first = messages.set_reaction(id, &UserId::from("u2"), "👍", 10).unwrap();
        let second = messages.set_reaction(id, &UserId::from("u2"), "👍", 20).unwrap();

        assert_eq!(first.metadata.reactions, second.metadata.reactions);
        assert_eq!(second.metadata.reactions.len(), 1);
    }

    #[test]
    fn new_reaction_replaces_previous_for_same_user() {
        let messages = store();
        let id = MessageId::from_u128(1);
        messages.create(text("hi"), id, 0).unwrap();

        messages.set_reaction(id, &UserId::from("u2"), "👍", 10).unwrap();
        let updated = messages.set_reaction(id, &UserId::from("u2"), "🎉", 20).unwrap();

        assert_eq!(
            updated.metadata.reactions.get(&UserId::from("u2")).map(String::as_str),
            Some("🎉")
        );
        assert_eq!(updated.metadata.reactions.len(), 1);
    }

    #[test]
    fn clear_reaction_without_one_is_a_noop() {
        let messages = store();
        let id = MessageId::from_u128(1);
        messages.create(text("hi"), id, 0).unwrap();

        let cleared = messages.clear_reaction(id, &UserId::from("u2"), 10).unwrap();
        assert!(cleared.metadata.reactions.is_empty());
        // last_updated untouched by the no-op.
        assert_eq!(cleared.metadata.last_updated, 0);
    }

    #[test]
    fn pin_round_trip_and_overwrite() {
        let messages = store();
        let id = MessageId::from_u128(1);
        messages.create(text("hi"), id, 0).unwrap();

        let pinned = messages.pin(id, &UserId::from("u2"), 10).unwrap();
        assert!(pinned.metadata.pinned);
        assert_eq!(pinned.metadata.pinned_by, Some(UserId::from("u2")));
        assert_eq!(pinned.metadata.pinned_at, Some(10));

        // Re-pin overwrites attribution.
        let repinned = messages.pin(id, &UserId::from("u3"), 20).unwrap();
        assert_eq!(repinned.metadata.pinned_by, Some(UserId::from("u3")));
        assert_eq!(repinned.metadata.pinned_at, Some(20));

        let unpinned = messages.unpin(id, 30).unwrap();
        assert!(!unpinned.metadata.pinned);
        assert_eq!(unpinned.metadata.pinned_by, None);
        assert_eq!(unpinned.metadata.pinned_at, None);
    }

    #[test]
    fn room_and_timestamp_survive_all_mutations() {
        let messages = store();
        let id = MessageId::from_u128(1);
        let created = messages.create(text("hi"), id, 1_000).unwrap();

        messages.set_reaction(id, &UserId::from("u2"), "👍", 2_000).unwrap();
        messages.pin(id, &UserId::from("u2"), 3_000).unwrap();
        let after = messages.unpin(id, 4_000).unwrap();

        assert_eq!(after.room, created.room);
        assert_eq!(after.timestamp, created.timestamp);
        assert_eq!(after.id, created.id);
    }

    #[test]
    fn mutations_on_missing_message_are_not_found() {
        let messages = store();
        let id = MessageId::from_u128(404);

        assert!(matches!(
            messages.set_reaction(id, &UserId::from("u1"), "👍", 0),
            Err(EventError::NotFound(_))
        ));
        assert!(matches!(messages.pin(id, &UserId::from("u1"), 0), Err(EventError::NotFound(_))));
        assert!(matches!(messages.delete(id), Err(EventError::NotFound(_))));
    }
}
