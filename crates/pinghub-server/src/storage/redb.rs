//! Redb-backed durable store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. All
//! documents survive server restarts. Documents are CBOR-encoded; a
//! secondary (room, timestamp, id) index supports bounded newest-first room
//! scans without touching unrelated rooms.

use std::{path::Path, sync::Arc};

use pinghub_proto::{Group, GroupId, Message, MessageId, RoomId, UserId};
use redb::{Database, ReadableTable, TableDefinition};

use super::{Store, StoreError, apply_message_update};

/// Table: messages
/// Key: message id as big-endian bytes [16 bytes]
/// Value: CBOR-encoded Message
const MESSAGES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("messages");

/// Table: messages_by_room
/// Key: room prefix + timestamp (8 bytes BE) + message id (16 bytes BE)
/// Value: empty. The key alone carries the index entry; lexicographic order
/// equals (room, timestamp, id) order.
const MESSAGES_BY_ROOM: TableDefinition<&[u8], &[u8]> = TableDefinition::new("messages_by_room");

/// Table: groups
/// Key: group id as big-endian bytes [16 bytes]
/// Value: CBOR-encoded Group
const GROUPS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("groups");

/// Durable store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(|e| StoreError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(MESSAGES).map_err(|e| StoreError::Io(e.to_string()))?;
            let _ = txn.open_table(MESSAGES_BY_ROOM).map_err(|e| StoreError::Io(e.to_string()))?;
            let _ = txn.open_table(GROUPS).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Store for RedbStore {
    fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;

        {
            let mut table = txn.open_table(MESSAGES).map_err(|e| StoreError::Io(e.to_string()))?;

            let mut bytes = Vec::new();
            ciborium::into_writer(message, &mut bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            let key = encode_id_key(message.id.as_u128());
            table
                .insert(key.as_slice(), bytes.as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?;

            let mut index = txn
                .open_table(MESSAGES_BY_ROOM)
                .map_err(|e| StoreError::Io(e.to_string()))?;

            let index_key = room_index_key(message.room, message.timestamp, message.id);
            index
                .insert(index_key.as_slice(), [].as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }

        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(())
    }

    fn message(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;
        let table = txn.open_table(MESSAGES).map_err(|e| StoreError::Io(e.to_string()))?;

        let key = encode_id_key(id.as_u128());
        match table.get(key.as_slice()).map_err(|e| StoreError::Io(e.to_string()))? {
            Some(value) => {
                let message: Message = ciborium::from_reader(value.value())
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(message))
            },
            None => Ok(None),
        }
    }

    fn update_message<F>(&self, id: MessageId, mutate: F) -> Result<Option<Message>, StoreError>
    where
        F: FnOnce(&mut Message),
    {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;

        let updated = {
            let mut table = txn.open_table(MESSAGES).map_err(|e| StoreError::Io(e.to_string()))?;

            let key = encode_id_key(id.as_u128());
            let existing = match table
                .get(key.as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?
            {
                Some(value) => {
                    let message: Message = ciborium::from_reader(value.value())
                        .map_err(|e| StoreError::Serialization(e.to_string()))?;
                    Some(message)
                },
                None => None,
            };

            match existing {
                Some(mut message) => {
                    apply_message_update(&mut message, mutate);

                    // Immutable fields are restored before the write, so the
                    // (room, timestamp, id) index entry never needs rewriting.
                    let mut bytes = Vec::new();
                    ciborium::into_writer(&message, &mut bytes)
                        .map_err(|e| StoreError::Serialization(e.to_string()))?;

                    table
                        .insert(key.as_slice(), bytes.as_slice())
                        .map_err(|e| StoreError::Io(e.to_string()))?;

                    Some(message)
                },
                None => None,
            }
        };

        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(updated)
    }

    fn delete_message(&self, id: MessageId) -> Result<bool, StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;

        let removed = {
            let mut table = txn.open_table(MESSAGES).map_err(|e| StoreError::Io(e.to_string()))?;

            let key = encode_id_key(id.as_u128());
            let old = table
                .remove(key.as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?;

            match old {
                Some(value) => {
                    let message: Message = ciborium::from_reader(value.value())
                        .map_err(|e| StoreError::Serialization(e.to_string()))?;

                    let mut index = txn
                        .open_table(MESSAGES_BY_ROOM)
                        .map_err(|e| StoreError::Io(e.to_string()))?;
                    let index_key = room_index_key(message.room, message.timestamp, message.id);
                    index
                        .remove(index_key.as_slice())
                        .map_err(|e| StoreError::Io(e.to_string()))?;

                    true
                },
                None => false,
            }
        };

        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(removed)
    }

    fn messages_by_room_desc(
        &self,
        room: RoomId,
        limit: usize,
        since: Option<u64>,
    ) -> Result<Vec<Message>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;

        let index = txn.open_table(MESSAGES_BY_ROOM).map_err(|e| StoreError::Io(e.to_string()))?;
        let table = txn.open_table(MESSAGES).map_err(|e| StoreError::Io(e.to_string()))?;

        let (start, end) = room_scan_bounds(room, since);
        let results = index
            .range(start.as_slice()..=end.as_slice())
            .map_err(|e| StoreError::Io(e.to_string()))?;

        let mut messages = Vec::with_capacity(limit.min(64));
        for result in results.rev() {
            if messages.len() >= limit {
                break;
            }

            let (key, _) = result.map_err(|e| StoreError::Io(e.to_string()))?;
            let id = decode_index_message_id(key.value())?;

            let doc_key = encode_id_key(id);
            let value = table
                .get(doc_key.as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?
                .ok_or_else(|| {
                    StoreError::Corrupt(format!("index references missing message {id:032x}"))
                })?;

            let message: Message = ciborium::from_reader(value.value())
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            messages.push(message);
        }

        Ok(messages)
    }

    fn pinned_messages(&self, room: RoomId, limit: usize) -> Result<Vec<Message>, StoreError> {
        // Pin time does not correlate with creation time, so the whole room
        // is scanned and sorted by pinned_at.
        let mut pinned: Vec<Message> = self
            .messages_by_room_desc(room, usize::MAX, None)?
            .into_iter()
            .filter(|m| m.metadata.pinned)
            .collect();

        pinned.sort_by(|a, b| {
            b.metadata.pinned_at.cmp(&a.metadata.pinned_at).then_with(|| b.id.cmp(&a.id))
        });
        pinned.truncate(limit);
        Ok(pinned)
    }

    fn count_messages(&self, room: RoomId) -> Result<usize, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;
        let index = txn.open_table(MESSAGES_BY_ROOM).map_err(|e| StoreError::Io(e.to_string()))?;

        let (start, end) = room_scan_bounds(room, None);
        let results = index
            .range(start.as_slice()..=end.as_slice())
            .map_err(|e| StoreError::Io(e.to_string()))?;

        let mut count = 0;
        for result in results {
            result.map_err(|e| StoreError::Io(e.to_string()))?;
            count += 1;
        }
        Ok(count)
    }

    fn insert_group(&self, group: &Group) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;

        {
            let mut table = txn.open_table(GROUPS).map_err(|e| StoreError::Io(e.to_string()))?;

            let mut bytes = Vec::new();
            ciborium::into_writer(group, &mut bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            let key = encode_id_key(group.group_id.as_u128());
            table
                .insert(key.as_slice(), bytes.as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }

        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(())
    }

    fn group(&self, id: GroupId) -> Result<Option<Group>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;
        let table = txn.open_table(GROUPS).map_err(|e| StoreError::Io(e.to_string()))?;

        let key = encode_id_key(id.as_u128());
        match table.get(key.as_slice()).map_err(|e| StoreError::Io(e.to_string()))? {
            Some(value) => {
                let group: Group = ciborium::from_reader(value.value())
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(group))
            },
            None => Ok(None),
        }
    }

    fn update_group<F>(&self, id: GroupId, mutate: F) -> Result<Option<Group>, StoreError>
    where
        F: FnOnce(&mut Group),
    {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;

        let updated = {
            let mut table = txn.open_table(GROUPS).map_err(|e| StoreError::Io(e.to_string()))?;

            let key = encode_id_key(id.as_u128());
            let existing = match table
                .get(key.as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?
            {
                Some(value) => {
                    let group: Group = ciborium::from_reader(value.value())
                        .map_err(|e| StoreError::Serialization(e.to_string()))?;
                    Some(group)
                },
                None => None,
            };

            match existing {
                Some(mut group) => {
                    mutate(&mut group);
                    group.group_id = id;

                    let mut bytes = Vec::new();
                    ciborium::into_writer(&group, &mut bytes)
                        .map_err(|e| StoreError::Serialization(e.to_string()))?;

                    table
                        .insert(key.as_slice(), bytes.as_slice())
                        .map_err(|e| StoreError::Io(e.to_string()))?;

                    Some(group)
                },
                None => None,
            }
        };

        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(updated)
    }

    fn groups_for_member(&self, user: &UserId) -> Result<Vec<Group>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;
        let table = txn.open_table(GROUPS).map_err(|e| StoreError::Io(e.to_string()))?;

        let mut groups = Vec::new();
        for result in table.iter().map_err(|e| StoreError::Io(e.to_string()))? {
            let (_, value) = result.map_err(|e| StoreError::Io(e.to_string()))?;
            let group: Group = ciborium::from_reader(value.value())
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if group.is_member(user) {
                groups.push(group);
            }
        }

        Ok(groups)
    }
}

/// Encode a 128-bit identifier as a 16-byte big-endian key.
fn encode_id_key(id: u128) -> [u8; 16] {
    id.to_be_bytes()
}

/// Room discriminator prefix for the room index.
///
/// The global room gets tag 0; group rooms tag 1 followed by the group id.
/// Distinct prefixes keep room ranges disjoint under lexicographic order.
fn room_prefix(room: RoomId) -> Vec<u8> {
    match room {
        RoomId::Global => vec![0u8],
        RoomId::Group(id) => {
            let mut prefix = Vec::with_capacity(17);
            prefix.push(1u8);
            prefix.extend_from_slice(&id.as_u128().to_be_bytes());
            prefix
        },
    }
}

/// Encode a (room, timestamp, id) index key.
fn room_index_key(room: RoomId, timestamp: u64, id: MessageId) -> Vec<u8> {
    let mut key = room_prefix(room);
    key.extend_from_slice(&timestamp.to_be_bytes());
    key.extend_from_slice(&id.as_u128().to_be_bytes());
    key
}

/// Inclusive scan bounds covering a room's index entries, optionally
/// starting at `since`.
fn room_scan_bounds(room: RoomId, since: Option<u64>) -> (Vec<u8>, Vec<u8>) {
    let mut start = room_prefix(room);
    start.extend_from_slice(&since.unwrap_or(0).to_be_bytes());
    start.extend_from_slice(&[0u8; 16]);

    let mut end = room_prefix(room);
    end.extend_from_slice(&u64::MAX.to_be_bytes());
    end.extend_from_slice(&[0xFFu8; 16]);

    (start, end)
}

/// Extract the message id from an index key (its trailing 16 bytes).
fn decode_index_message_id(key: &[u8]) -> Result<u128, StoreError> {
    let Some(tail) = key.len().checked_sub(16).and_then(|at| key.get(at..)) else {
        return Err(StoreError::Corrupt("room index key too short".to_string()));
    };

    let mut buf = [0u8; 16];
    buf.copy_from_slice(tail);
    Ok(u128::from_be_bytes(buf))
}
