//! Session registry for identity binding and room fan-out.
//!
//! The registry maintains bidirectional mappings: room → sessions (for
//! broadcast) and session → rooms (for cleanup on disconnect). This enables
//! O(1) lookups in both directions.
//!
//! Presence is per connection: the same identity may be bound on several
//! sessions at once and each one is tracked separately. Binding is the only
//! identity operation - once a session is bound it stays bound until close,
//! and rebinding to a different identity is rejected.

use std::collections::{HashMap, HashSet};

use pinghub_proto::{RoomId, UserId};

/// Identity asserted at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque user identifier.
    pub user_id: UserId,
    /// Display name for presence and message attribution.
    pub username: String,
}

/// Information about a registered session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Bound identity, `None` until `login`.
    pub identity: Option<Identity>,
    /// Wall-clock Unix milliseconds when the connection opened.
    pub connected_at: u64,
    /// Wall-clock Unix milliseconds of the last event from this session.
    pub last_seen: u64,
}

impl SessionInfo {
    /// A fresh unbound session.
    pub fn new(connected_at: u64) -> Self {
        Self { identity: None, connected_at, last_seen: connected_at }
    }
}

/// Error binding an identity to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// Session is not registered.
    UnknownSession,
    /// Session is already bound to a different identity.
    AlreadyBound {
        /// The identity currently bound.
        current: UserId,
    },
}

/// Registry of live sessions and their room subscriptions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Session ID → session info
    sessions: HashMap<u64, SessionInfo>,
    /// Room → set of subscribed session IDs
    room_subscriptions: HashMap<RoomId, HashSet<u64>>,
    /// Session ID → set of subscribed rooms
    session_rooms: HashMap<u64, HashSet<RoomId>>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. Returns `false` if the id already exists.
    pub fn open(&mut self, session_id: u64, connected_at: u64) -> bool {
        if self.sessions.contains_key(&session_id) {
            return false;
        }

        self.sessions.insert(session_id, SessionInfo::new(connected_at));
        self.session_rooms.insert(session_id, HashSet::new());
        true
    }

    /// Bind an identity to a session.
    ///
    /// Idempotent for the same user id (the username is refreshed); binding
    /// a different identity to an already-bound session fails.
    pub fn bind(&mut self, session_id: u64, identity: Identity) -> Result<(), BindError> {
        let info = self.sessions.get_mut(&session_id).ok_or(BindError::UnknownSession)?;

        if let Some(current) = &info.identity {
            if current.user_id != identity.user_id {
                return Err(BindError::AlreadyBound { current: current.user_id.clone() });
            }
        }

        info.identity = Some(identity);
        Ok(())
    }

    /// Unregister a session and remove all its room subscriptions.
    ///
    /// Returns the session info and the rooms it was in, for presence
    /// updates and cleanup.
    pub fn close(&mut self, session_id: u64) -> Option<(SessionInfo, HashSet<RoomId>)> {
        let info = self.sessions.remove(&session_id)?;
        let rooms = self.session_rooms.remove(&session_id).unwrap_or_default();

        for room in &rooms {
            if let Some(subscribers) = self.room_subscriptions.get_mut(room) {
                subscribers.remove(&session_id);
                if subscribers.is_empty() {
                    self.room_subscriptions.remove(room);
                }
            }
        }

        Some((info, rooms))
    }

    /// Session metadata. `None` if the session doesn't exist.
    pub fn session(&self, session_id: u64) -> Option<&SessionInfo> {
        self.sessions.get(&session_id)
    }

    /// Check if a session is registered.
    pub fn has_session(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Record activity from a session.
    pub fn touch(&mut self, session_id: u64, now: u64) {
        if let Some(info) = self.sessions.get_mut(&session_id) {
            info.last_seen = now;
        }
    }

    /// Subscribe a session to a room's fan-out set.
    ///
    /// Returns `false` if the session is not registered.
    pub fn subscribe(&mut self, session_id: u64, room: RoomId) -> bool {
        if !self.sessions.contains_key(&session_id) {
            return false;
        }

        self.room_subscriptions.entry(room).or_default().insert(session_id);
        self.session_rooms.entry(session_id).or_default().insert(room);
        true
    }

    /// Unsubscribe a session from a room.
    ///
    /// Returns `true` if the session was subscribed and is now unsubscribed.
    pub fn unsubscribe(&mut self, session_id: u64, room: RoomId) -> bool {
        let removed_from_room =
            self.room_subscriptions.get_mut(&room).is_some_and(|s| s.remove(&session_id));

        let removed_from_session =
            self.session_rooms.get_mut(&session_id).is_some_and(|r| r.remove(&room));

        if self.room_subscriptions.get(&room).is_some_and(HashSet::is_empty) {
            self.room_subscriptions.remove(&room);
        }

        removed_from_room && removed_from_session
    }

    /// Check if a session is subscribed to a room.
    pub fn is_subscribed(&self, session_id: u64, room: RoomId) -> bool {
        self.room_subscriptions.get(&room).is_some_and(|s| s.contains(&session_id))
    }

    /// All sessions subscribed to a room.
    pub fn sessions_in_room(&self, room: RoomId) -> impl Iterator<Item = u64> + '_ {
        self.room_subscriptions.get(&room).into_iter().flat_map(|s| s.iter().copied())
    }

    /// All rooms a session is subscribed to.
    pub fn rooms_for_session(&self, session_id: u64) -> impl Iterator<Item = RoomId> + '_ {
        self.session_rooms.get(&session_id).into_iter().flat_map(|r| r.iter().copied())
    }

    /// All sessions with a bound identity, deliberately not deduplicated:
    /// one identity on two connections yields two entries.
    pub fn bound_sessions(&self) -> impl Iterator<Item = (u64, &SessionInfo)> + '_ {
        self.sessions.iter().filter(|(_, info)| info.identity.is_some()).map(|(id, info)| (*id, info))
    }

    /// Total number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of sessions subscribed to a room.
    pub fn room_session_count(&self, room: RoomId) -> usize {
        self.room_subscriptions.get(&room).map_or(0, HashSet::len)
    }
}
