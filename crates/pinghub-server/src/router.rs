//! Room router.
//!
//! Action-based driver in the sans-IO style: the runtime feeds it
//! [`RouterEvent`]s and executes the [`RouterAction`]s it returns. All
//! session, room, and message semantics live here; the runtime only moves
//! bytes and forwards log actions to `tracing`.
//!
//! Domain failures never escape as `Err`: they become a scoped `error`
//! event to the requester plus a warn log. `Err` is reserved for
//! process-level faults (events about sessions the runtime never
//! registered).

use std::collections::{HashMap, HashSet};

use pinghub_proto::{
    ClientEvent, ErrorData, FileReference, GroupSelector, Message, MessageBody, MessageId,
    MessageKind, RoomId, RoomSelector, ServerEvent, UserEventData, UserId, WelcomeData,
};

use crate::{
    env::Environment,
    group_directory::GroupDirectory,
    message_store::{MessageStore, NewMessage},
    policy::NewcomerPolicy,
    presence,
    registry::{BindError, Identity, SessionRegistry},
    server_error::{EventError, RouterError},
    storage::Store,
};

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Messages returned by a full history request.
    pub history_limit: usize,
    /// Newcomer digest tunables.
    pub newcomer: NewcomerPolicy,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { max_connections: 10_000, history_limit: 50, newcomer: NewcomerPolicy::default() }
    }
}

/// Events the router processes, produced by the runtime.
#[derive(Debug, Clone)]
pub enum RouterEvent {
    /// A new connection was accepted.
    ConnectionOpened {
        /// Unique connection ID assigned by the runtime.
        session_id: u64,
    },

    /// A named event arrived from a connection.
    EventReceived {
        /// Connection that sent the event.
        session_id: u64,
        /// The decoded event.
        event: ClientEvent,
    },

    /// A connection was closed (by peer or error).
    ConnectionClosed {
        /// Connection that was closed.
        session_id: u64,
        /// Reason for closure.
        reason: String,
    },
}

/// Actions the router produces, executed by the runtime.
#[derive(Debug, Clone)]
pub enum RouterAction {
    /// Send an event to one session.
    SendToSession {
        /// Target session.
        session_id: u64,
        /// Event to send.
        event: ServerEvent,
    },

    /// Send an event to every live connection.
    BroadcastAll {
        /// Event to broadcast.
        event: ServerEvent,
        /// Optional session to skip.
        exclude: Option<u64>,
    },

    /// Send an event to the sessions subscribed to a room.
    BroadcastRoom {
        /// Target room.
        room: RoomId,
        /// Event to broadcast.
        event: ServerEvent,
        /// Optional session to skip.
        exclude: Option<u64>,
    },

    /// Close a connection.
    CloseConnection {
        /// Session to close.
        session_id: u64,
        /// Reason for closure.
        reason: String,
    },

    /// Log a message.
    Log {
        /// Log level.
        level: LogLevel,
        /// Message to log.
        message: String,
    },
}

/// Log levels for router actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information.
    Debug,
    /// Informational message.
    Info,
    /// Warning.
    Warn,
    /// Error.
    Error,
}

/// Action-based room router.
///
/// Owns the session registry, the message store, the group directory, and
/// the first-seen ledger that drives the newcomer digest.
pub struct Router<E, S>
where
    E: Environment,
    S: Store,
{
    registry: SessionRegistry,
    messages: MessageStore<S>,
    groups: GroupDirectory<S>,
    store: S,
    /// Identity → wall-clock millis of its first login.
    first_seen: HashMap<UserId, u64>,
    env: E,
    config: RouterConfig,
}

impl<E, S> Router<E, S>
where
    E: Environment,
    S: Store,
{
    /// Create a new router.
    pub fn new(env: E, store: S, config: RouterConfig) -> Self {
        Self {
            registry: SessionRegistry::new(),
            messages: MessageStore::new(store.clone()),
            groups: GroupDirectory::new(store.clone()),
            store,
            first_seen: HashMap::new(),
            env,
            config,
        }
    }

    /// Process a router event and return actions to execute.
    ///
    /// This is the single entry point; events from one connection must be
    /// fed in arrival order.
    pub fn process_event(&mut self, event: RouterEvent) -> Result<Vec<RouterAction>, RouterError> {
        match event {
            RouterEvent::ConnectionOpened { session_id } => self.handle_opened(session_id),
            RouterEvent::EventReceived { session_id, event } => {
                if !self.registry.has_session(session_id) {
                    return Err(RouterError::SessionNotFound(session_id));
                }
                self.registry.touch(session_id, self.env.wall_clock_millis());

                match self.handle_client_event(session_id, event) {
                    Ok(actions) => Ok(actions),
                    Err(err) => Ok(self.scoped_error(session_id, &err)),
                }
            },
            RouterEvent::ConnectionClosed { session_id, reason } => {
                Ok(self.handle_closed(session_id, &reason))
            },
        }
    }

    fn handle_opened(&mut self, session_id: u64) -> Result<Vec<RouterAction>, RouterError> {
        let now = self.env.wall_clock_millis();

        if self.registry.session_count() >= self.config.max_connections {
            return Ok(vec![RouterAction::CloseConnection {
                session_id,
                reason: "max connections exceeded".to_string(),
            }]);
        }

        self.registry.open(session_id, now);

        let snapshot = presence::snapshot(&self.registry);
        Ok(vec![
            RouterAction::SendToSession {
                session_id,
                event: ServerEvent::Welcome(WelcomeData {
                    message: "Welcome to PingHub".to_string(),
                    timestamp: now,
                }),
            },
            RouterAction::SendToSession {
                session_id,
                event: ServerEvent::UsersUpdate(snapshot.clone()),
            },
            RouterAction::BroadcastAll {
                event: ServerEvent::UsersUpdate(snapshot),
                exclude: Some(session_id),
            },
            RouterAction::Log {
                level: LogLevel::Debug,
                message: format!("connection {session_id} accepted"),
            },
        ])
    }

    fn handle_closed(&mut self, session_id: u64, reason: &str) -> Vec<RouterAction> {
        let now = self.env.wall_clock_millis();
        let mut actions = Vec::new();

        if let Some((info, rooms)) = self.registry.close(session_id) {
            if let Some(identity) = info.identity {
                actions.push(RouterAction::BroadcastAll {
                    event: ServerEvent::UserLeft(UserEventData {
                        username: identity.username.clone(),
                        timestamp: now,
                    }),
                    exclude: None,
                });
                actions.push(RouterAction::BroadcastAll {
                    event: ServerEvent::UsersUpdate(presence::snapshot(&self.registry)),
                    exclude: None,
                });
            }

            actions.push(RouterAction::Log {
                level: LogLevel::Info,
                message: format!(
                    "connection {session_id} closed: {reason}, was in {} rooms",
                    rooms.len()
                ),
            });
        }

        actions
    }

    fn handle_client_event(
        &mut self,
        session_id: u64,
        event: ClientEvent,
    ) -> Result<Vec<RouterAction>, EventError> {
        match event {
            ClientEvent::Login(data) => self.handle_login(session_id, data.id, data.username),
            ClientEvent::MessageSend(data) => {
                let identity = self.identity(session_id)?;
                let room = data.room.unwrap_or(RoomId::Global);
                self.authorize_room(session_id, room)?;

                let body = build_body(data.kind, data.file, data.text)?;
                let message = self.persist_message(room, &identity, body)?;

                Ok(vec![room_broadcast(room, ServerEvent::MessageNew(message), None)])
            },
            ClientEvent::MessagesGet(selector) => {
                let room = selector.map_or(RoomId::Global, RoomSelector::room);
                self.authorize_room(session_id, room)?;

                let history = if room.is_global() && self.requester_is_newcomer(session_id) {
                    let pinned =
                        self.messages.list_pinned(room, self.config.newcomer.pinned_limit)?;
                    let recent = self.messages.list_by_room(
                        room,
                        self.config.newcomer.recent_limit,
                        None,
                    )?;
                    self.config.newcomer.digest(pinned, recent)
                } else {
                    self.messages.list_by_room(room, self.config.history_limit, None)?
                };

                Ok(vec![RouterAction::SendToSession {
                    session_id,
                    event: ServerEvent::MessagesHistory(history),
                }])
            },
            ClientEvent::GroupMessageSend(data) => {
                let identity = self.identity(session_id)?;
                let room = RoomId::Group(data.group_id);
                self.authorize_room(session_id, room)?;

                let body = build_body(data.kind, data.file, data.text)?;
                let message = self.persist_message(room, &identity, body)?;

                Ok(vec![RouterAction::BroadcastRoom {
                    room,
                    event: ServerEvent::GroupMessageNew(message),
                    exclude: None,
                }])
            },
            ClientEvent::GroupMessagesGet(selector) => {
                let room = RoomId::Group(selector.group_id());
                self.authorize_room(session_id, room)?;

                let history = self.messages.list_by_room(room, self.config.history_limit, None)?;
                Ok(vec![RouterAction::SendToSession {
                    session_id,
                    event: ServerEvent::GroupMessagesHistory(history),
                }])
            },
            ClientEvent::Typing(data) => {
                let room = data.room.unwrap_or(RoomId::Global);
                Ok(vec![room_broadcast(
                    room,
                    ServerEvent::UserTyping(data),
                    Some(session_id),
                )])
            },
            ClientEvent::React(data) => {
                let identity = self.identity(session_id)?;
                let room = self.message_room(data.message_id, session_id)?;

                let now = self.env.wall_clock_millis();
                let updated = self.messages.set_reaction(
                    data.message_id,
                    &identity.user_id,
                    &data.reaction,
                    now,
                )?;

                Ok(vec![room_broadcast(room, ServerEvent::MessageUpdated(updated), None)])
            },
            ClientEvent::RemoveReaction(data) => {
                let identity = self.identity(session_id)?;
                let room = self.message_room(data.message_id, session_id)?;

                let now = self.env.wall_clock_millis();
                let updated =
                    self.messages.clear_reaction(data.message_id, &identity.user_id, now)?;

                Ok(vec![room_broadcast(room, ServerEvent::MessageUpdated(updated), None)])
            },
            ClientEvent::Pin(data) => {
                let identity = self.identity(session_id)?;
                let room = self.message_room(data.message_id, session_id)?;

                let now = self.env.wall_clock_millis();
                let pinned = self.messages.pin(data.message_id, &identity.user_id, now)?;

                Ok(vec![room_broadcast(room, ServerEvent::MessagePinned(pinned), None)])
            },
            ClientEvent::Unpin(data) => {
                self.identity(session_id)?;
                let room = self.message_room(data.message_id, session_id)?;

                let now = self.env.wall_clock_millis();
                let unpinned = self.messages.unpin(data.message_id, now)?;

                Ok(vec![room_broadcast(room, ServerEvent::MessageUnpinned(unpinned), None)])
            },
            ClientEvent::PinnedMessagesGet(selector) => {
                let room = selector.map_or(RoomId::Global, RoomSelector::room);
                self.authorize_room(session_id, room)?;

                let pinned = self.messages.list_pinned(room, self.config.history_limit)?;
                Ok(vec![RouterAction::SendToSession {
                    session_id,
                    event: ServerEvent::PinnedMessagesList(pinned),
                }])
            },
            ClientEvent::RoomSubscribe(selector) => {
                let room = selector.room();
                self.authorize_room(session_id, room)?;

                self.registry.subscribe(session_id, room);
                Ok(vec![RouterAction::Log {
                    level: LogLevel::Debug,
                    message: format!("session {session_id} subscribed to room {room}"),
                }])
            },
            ClientEvent::RoomUnsubscribe(selector) => {
                let room = selector.room();
                self.registry.unsubscribe(session_id, room);
                Ok(vec![RouterAction::Log {
                    level: LogLevel::Debug,
                    message: format!("session {session_id} unsubscribed from room {room}"),
                }])
            },
            ClientEvent::GroupCreate(data) => {
                let identity = self.identity(session_id)?;
                let id = pinghub_proto::GroupId::from_u128(self.env.random_u128());
                let now = self.env.wall_clock_millis();

                let group = self.groups.create(&data, &identity.user_id, id, now)?;
                self.registry.subscribe(session_id, RoomId::Group(id));

                Ok(vec![
                    RouterAction::SendToSession {
                        session_id,
                        event: ServerEvent::GroupCreated(group),
                    },
                    RouterAction::Log {
                        level: LogLevel::Info,
                        message: format!("group {id} created by {}", identity.user_id),
                    },
                ])
            },
            ClientEvent::GroupJoin(selector) => self.handle_group_join(session_id, selector),
            ClientEvent::GroupLeave(selector) => self.handle_group_leave(session_id, selector),
        }
    }

    fn handle_login(
        &mut self,
        session_id: u64,
        user_id: UserId,
        username: String,
    ) -> Result<Vec<RouterAction>, EventError> {
        let now = self.env.wall_clock_millis();
        let identity = Identity { user_id: user_id.clone(), username: username.clone() };

        match self.registry.bind(session_id, identity) {
            Ok(()) => {},
            Err(BindError::UnknownSession) => {
                return Err(EventError::NotFound("session".to_string()));
            },
            Err(BindError::AlreadyBound { current }) => {
                return Err(EventError::Validation(format!(
                    "session is already bound to {current}"
                )));
            },
        }

        self.prune_first_seen(now);
        self.first_seen.entry(user_id.clone()).or_insert(now);

        Ok(vec![
            RouterAction::BroadcastAll {
                event: ServerEvent::UserJoined(UserEventData { username, timestamp: now }),
                exclude: None,
            },
            RouterAction::BroadcastAll {
                event: ServerEvent::UsersUpdate(presence::snapshot(&self.registry)),
                exclude: None,
            },
            RouterAction::Log {
                level: LogLevel::Info,
                message: format!("session {session_id} logged in as {user_id}"),
            },
        ])
    }

    fn handle_group_join(
        &mut self,
        session_id: u64,
        selector: GroupSelector,
    ) -> Result<Vec<RouterAction>, EventError> {
        let identity = self.identity(session_id)?;
        let id = selector.group_id();

        let group = self.groups.get(id)?;
        if group.is_private && !group.is_member(&identity.user_id) {
            return Err(EventError::AuthorizationDenied(
                "cannot join a private group".to_string(),
            ));
        }

        let updated = self.groups.add_member(id, &identity.user_id)?;
        Ok(vec![RouterAction::SendToSession {
            session_id,
            event: ServerEvent::GroupUpdated(updated),
        }])
    }

    fn handle_group_leave(
        &mut self,
        session_id: u64,
        selector: GroupSelector,
    ) -> Result<Vec<RouterAction>, EventError> {
        let identity = self.identity(session_id)?;
        let id = selector.group_id();

        let updated = self.groups.remove_member(id, &identity.user_id)?;
        self.registry.unsubscribe(session_id, RoomId::Group(id));

        Ok(vec![RouterAction::SendToSession {
            session_id,
            event: ServerEvent::GroupUpdated(updated),
        }])
    }

    /// The session's bound identity, or the login-required error.
    fn identity(&self, session_id: u64) -> Result<Identity, EventError> {
        self.registry
            .session(session_id)
            .and_then(|info| info.identity.clone())
            .ok_or(EventError::AuthorizationRequired)
    }

    /// The single room-scope gate: every room-scoped read or write passes
    /// through here. Global is open; group rooms require current
    /// membership of the session's bound identity.
    fn authorize_room(&self, session_id: u64, room: RoomId) -> Result<(), EventError> {
        let Some(group_id) = room.as_group() else {
            return Ok(());
        };

        let identity = self.identity(session_id)?;
        if self.groups.is_member(group_id, &identity.user_id)? {
            Ok(())
        } else {
            Err(EventError::AuthorizationDenied("not a member of this group".to_string()))
        }
    }

    /// Look up a message's room and authorize the requester for it.
    fn message_room(&self, id: MessageId, session_id: u64) -> Result<RoomId, EventError> {
        let room = self.messages.get(id)?.room;
        self.authorize_room(session_id, room)?;
        Ok(room)
    }

    fn persist_message(
        &mut self,
        room: RoomId,
        identity: &Identity,
        body: MessageBody,
    ) -> Result<Message, EventError> {
        let id = MessageId::from_u128(self.env.random_u128());
        let now = self.env.wall_clock_millis();

        self.messages.create(
            NewMessage {
                room,
                user_id: identity.user_id.clone(),
                username: identity.username.clone(),
                body,
            },
            id,
            now,
        )
    }

    /// Drop first-seen entries that are past the newcomer window and whose
    /// identity has no live session, so the ledger stays bounded by the
    /// connected population plus one window of departures. A departed
    /// veteran who returns later re-enters as a newcomer, the same as after
    /// a restart.
    fn prune_first_seen(&mut self, now: u64) {
        let window = self.config.newcomer.window_millis;
        let bound: HashSet<UserId> = self
            .registry
            .bound_sessions()
            .filter_map(|(_, info)| info.identity.as_ref().map(|i| i.user_id.clone()))
            .collect();

        self.first_seen
            .retain(|user, first| now.saturating_sub(*first) < window || bound.contains(user));
    }

    #[cfg(test)]
    fn first_seen_len(&self) -> usize {
        self.first_seen.len()
    }

    fn requester_is_newcomer(&self, session_id: u64) -> bool {
        let now = self.env.wall_clock_millis();
        let first_seen = self
            .registry
            .session(session_id)
            .and_then(|info| info.identity.as_ref())
            .and_then(|identity| self.first_seen.get(&identity.user_id).copied());

        self.config.newcomer.is_newcomer(first_seen, now)
    }

    fn scoped_error(&self, session_id: u64, err: &EventError) -> Vec<RouterAction> {
        vec![
            RouterAction::SendToSession {
                session_id,
                event: ServerEvent::Error(ErrorData::new(err.to_string())),
            },
            RouterAction::Log {
                level: LogLevel::Warn,
                message: format!("event from session {session_id} rejected: {err}"),
            },
        ]
    }

    /// Sessions subscribed to a room, for runtime broadcast execution.
    pub fn sessions_in_room(&self, room: RoomId) -> Vec<u64> {
        self.registry.sessions_in_room(room).collect()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.registry.session_count()
    }

    /// Storage backend, for persistence assertions in tests and startup
    /// checks in the runtime.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<E, S> std::fmt::Debug for Router<E, S>
where
    E: Environment,
    S: Store,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("session_count", &self.registry.session_count()).finish()
    }
}

/// Scope a broadcast to a room: the global room reaches every connection,
/// group rooms reach their subscribers.
fn room_broadcast(room: RoomId, event: ServerEvent, exclude: Option<u64>) -> RouterAction {
    if room.is_global() {
        RouterAction::BroadcastAll { event, exclude }
    } else {
        RouterAction::BroadcastRoom { room, event, exclude }
    }
}

/// Resolve the client's declared kind and optional file reference into a
/// message body, rejecting the inconsistent combinations.
fn build_body(
    kind: Option<MessageKind>,
    file: Option<FileReference>,
    text: String,
) -> Result<MessageBody, EventError> {
    match (kind, file) {
        (Some(MessageKind::File) | None, Some(file)) => Ok(MessageBody::File { file, text }),
        (Some(MessageKind::File), None) => {
            Err(EventError::Validation("file message requires a file reference".to_string()))
        },
        (Some(MessageKind::Text), Some(_)) => {
            Err(EventError::Validation("text message cannot carry a file".to_string()))
        },
        (Some(MessageKind::Text) | None, None) => Ok(MessageBody::Text { text }),
    }
}

#[cfg(test)]
mod tests {
    use pinghub_proto::LoginData;

    use super::*;
    use crate::storage::MemoryStore;

    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    #[derive(Clone)]
    struct TestEnv {
        now: Arc<AtomicU64>,
    }

    impl TestEnv {
        fn at(now: u64) -> Self {
            Self { now: Arc::new(AtomicU64::new(now)) }
        }

        fn advance(&self, millis: u64) {
            self.now.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl Environment for TestEnv {
        fn wall_clock_millis(&self) -> u64 {
            self.now.load(Ordering::SeqCst)
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            use rand::RngCore;
            rand::thread_rng().fill_bytes(buffer);
        }
    }

    fn router() -> Router<TestEnv, MemoryStore> {
        Router::new(TestEnv::at(1_000_000), MemoryStore::new(), RouterConfig::default())
    }

    fn login(user: &str) -> ClientEvent {
        ClientEvent::Login(LoginData { id: UserId::from(user), username: user.to_string() })
    }

    #[test]
    fn open_sends_welcome_and_presence() {
        let mut router = router();

        let actions =
            router.process_event(RouterEvent::ConnectionOpened { session_id: 1 }).unwrap();

        assert_eq!(router.session_count(), 1);
        assert!(matches!(
            actions[0],
            RouterAction::SendToSession { session_id: 1, event: ServerEvent::Welcome(_) }
        ));
        assert!(matches!(
            actions[1],
            RouterAction::SendToSession { session_id: 1, event: ServerEvent::UsersUpdate(_) }
        ));
    }

    #[test]
    fn open_rejects_when_max_connections_exceeded() {
        let mut router = Router::new(
            TestEnv::at(0),
            MemoryStore::new(),
            RouterConfig { max_connections: 2, ..Default::default() },
        );

        router.process_event(RouterEvent::ConnectionOpened { session_id: 1 }).unwrap();
        router.process_event(RouterEvent::ConnectionOpened { session_id: 2 }).unwrap();

        let actions =
            router.process_event(RouterEvent::ConnectionOpened { session_id: 3 }).unwrap();

        assert_eq!(router.session_count(), 2);
        assert!(matches!(actions[0], RouterAction::CloseConnection { session_id: 3, .. }));
    }

    #[test]
    fn event_for_unknown_session_is_a_router_error() {
        let mut router = router();

        let result = router
            .process_event(RouterEvent::EventReceived { session_id: 99, event: login("u1") });

        assert!(matches!(result, Err(RouterError::SessionNotFound(99))));
    }

    #[test]
    fn close_of_bound_session_announces_departure() {
        let mut router = router();
        router.process_event(RouterEvent::ConnectionOpened { session_id: 1 }).unwrap();
        router
            .process_event(RouterEvent::EventReceived { session_id: 1, event: login("u1") })
            .unwrap();

        let actions = router
            .process_event(RouterEvent::ConnectionClosed {
                session_id: 1,
                reason: "client disconnect".to_string(),
            })
            .unwrap();

        assert_eq!(router.session_count(), 0);
        assert!(matches!(
            actions[0],
            RouterAction::BroadcastAll { event: ServerEvent::UserLeft(_), .. }
        ));
        assert!(matches!(
            actions[1],
            RouterAction::BroadcastAll { event: ServerEvent::UsersUpdate(_), .. }
        ));
    }

    #[test]
    fn close_of_unbound_session_is_silent() {
        let mut router = router();
        router.process_event(RouterEvent::ConnectionOpened { session_id: 1 }).unwrap();

        let actions = router
            .process_event(RouterEvent::ConnectionClosed {
                session_id: 1,
                reason: "gone".to_string(),
            })
            .unwrap();

        assert!(actions.iter().all(|a| matches!(a, RouterAction::Log { .. })));
    }

    #[test]
    fn login_prunes_expired_entries_of_departed_identities() {
        let env = TestEnv::at(1_000_000);
        let mut router =
            Router::new(env.clone(), MemoryStore::new(), RouterConfig::default());

        router.process_event(RouterEvent::ConnectionOpened { session_id: 1 }).unwrap();
        router
            .process_event(RouterEvent::EventReceived { session_id: 1, event: login("u1") })
            .unwrap();
        router
            .process_event(RouterEvent::ConnectionClosed {
                session_id: 1,
                reason: "gone".to_string(),
            })
            .unwrap();
        assert_eq!(router.first_seen_len(), 1);

        env.advance(120_000);
        router.process_event(RouterEvent::ConnectionOpened { session_id: 2 }).unwrap();
        router
            .process_event(RouterEvent::EventReceived { session_id: 2, event: login("u2") })
            .unwrap();

        assert_eq!(router.first_seen_len(), 1);
    }

    #[test]
    fn connected_veterans_keep_their_first_seen_entry() {
        let env = TestEnv::at(1_000_000);
        let mut router =
            Router::new(env.clone(), MemoryStore::new(), RouterConfig::default());

        router.process_event(RouterEvent::ConnectionOpened { session_id: 1 }).unwrap();
        router
            .process_event(RouterEvent::EventReceived { session_id: 1, event: login("u1") })
            .unwrap();

        env.advance(120_000);
        router.process_event(RouterEvent::ConnectionOpened { session_id: 2 }).unwrap();
        router
            .process_event(RouterEvent::EventReceived { session_id: 2, event: login("u2") })
            .unwrap();

        assert_eq!(router.first_seen_len(), 2);
    }

    #[test]
    fn body_resolution_rejects_inconsistent_shapes() {
        assert!(matches!(
            build_body(Some(MessageKind::File), None, String::new()),
            Err(EventError::Validation(_))
        ));

        let file = FileReference {
            filename: "a".to_string(),
            url: "/a".to_string(),
            size: 1,
            mimetype: "text/plain".to_string(),
            expires_at: None,
        };
        assert!(matches!(
            build_body(Some(MessageKind::Text), Some(file.clone()), String::new()),
            Err(EventError::Validation(_))
        ));

        // Bare file reference implies a file message.
        assert!(matches!(
            build_body(None, Some(file), String::new()),
            Ok(MessageBody::File { .. })
        ));
    }
}
