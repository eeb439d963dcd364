//! Named events, both directions.
//!
//! Each frame is one JSON object `{"event": <name>, "data": <payload>}`.
//! Client payloads are lenient where clients have historically been sloppy:
//! room and group selectors accept both a bare string and a keyed object,
//! and client-asserted identity fields are accepted but never trusted (the
//! session-bound identity is authoritative).

use serde::{Deserialize, Serialize};

use crate::{
    group::Group,
    ids::{GroupId, MessageId, UserId},
    message::{FileReference, Message, MessageKind},
    room::RoomId,
};

/// Payload of `login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginData {
    /// Asserted user identifier.
    pub id: UserId,
    /// Display name for presence and message attribution.
    pub username: String,
}

/// Payload of `message:send` (global room).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendData {
    /// Client-asserted author id. Ignored; the session identity wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Author display name, denormalized into the stored document.
    pub username: String,
    /// Message text, or the caption for a file message.
    #[serde(default)]
    pub text: String,
    /// Target room. Absent means the global room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomId>,
    /// Declared message kind. Defaults to text when absent.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    /// File reference, required when `type` is `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileReference>,
}

/// Payload of `group:message:send`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessageSendData {
    /// Target group.
    pub group_id: GroupId,
    /// Client-asserted author id. Ignored; the session identity wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Author display name.
    pub username: String,
    /// Message text, or the caption for a file message.
    #[serde(default)]
    pub text: String,
    /// Declared message kind. Defaults to text when absent.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    /// File reference, required when `type` is `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileReference>,
}

/// Payload of `typing` (inbound) and `user:typing` (outbound).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingData {
    /// Display name of the typing user.
    pub username: String,
    /// Whether the user started (`true`) or stopped (`false`) typing.
    pub is_typing: bool,
    /// Scope of the indicator. Absent means the global room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomId>,
}

/// Payload of `message:react`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactData {
    /// Target message.
    pub message_id: MessageId,
    /// Client-asserted reactor id. Ignored; the session identity wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Reaction symbol. Replaces the user's previous reaction if any.
    pub reaction: String,
}

/// Payload of `message:remove-reaction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveReactionData {
    /// Target message.
    pub message_id: MessageId,
    /// Client-asserted reactor id. Ignored; the session identity wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

/// Payload of `message:pin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinData {
    /// Target message.
    pub message_id: MessageId,
    /// Client-asserted pinner id. Ignored; the session identity wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_by: Option<UserId>,
}

/// Payload of `message:unpin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpinData {
    /// Target message.
    pub message_id: MessageId,
}

/// Room argument of history and subscription requests.
///
/// Clients send either the bare room string (`"global"`, `"<hex id>"`) or a
/// keyed object (`{"room": …}`); both deserialize here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomSelector {
    /// Bare room string.
    Bare(RoomId),
    /// Keyed object form.
    Keyed {
        /// Target room. Absent means the global room.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room: Option<RoomId>,
    },
}

impl RoomSelector {
    /// The selected room, defaulting to global when left out.
    #[must_use]
    pub fn room(self) -> RoomId {
        match self {
            Self::Bare(room) | Self::Keyed { room: Some(room) } => room,
            Self::Keyed { room: None } => RoomId::Global,
        }
    }
}

impl From<RoomId> for RoomSelector {
    fn from(room: RoomId) -> Self {
        Self::Bare(room)
    }
}

/// Group argument of group-scoped requests; bare id or keyed object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupSelector {
    /// Bare group id string.
    Bare(GroupId),
    /// Keyed object form.
    #[serde(rename_all = "camelCase")]
    Keyed {
        /// Target group.
        group_id: GroupId,
    },
}

impl GroupSelector {
    /// The selected group.
    #[must_use]
    pub fn group_id(self) -> GroupId {
        match self {
            Self::Bare(id) | Self::Keyed { group_id: id } => id,
        }
    }
}

impl From<GroupId> for GroupSelector {
    fn from(id: GroupId) -> Self {
        Self::Bare(id)
    }
}

/// Payload of `group:create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCreateData {
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Whether the group is private.
    #[serde(default)]
    pub is_private: bool,
}

/// Payload of `welcome`, sent once per connection on open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeData {
    /// Greeting text.
    pub message: String,
    /// Server wall-clock Unix milliseconds at send time.
    pub timestamp: u64,
}

/// Payload of `user:joined` and `user:left`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEventData {
    /// Display name of the user who joined or left.
    pub username: String,
    /// Server wall-clock Unix milliseconds at send time.
    pub timestamp: u64,
}

/// One online connection in a presence snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUser {
    /// Bound user identifier.
    pub user_id: UserId,
    /// Display name.
    pub username: String,
    /// Unix milliseconds when the connection was opened.
    pub connected_at: u64,
}

/// Payload of `users:update`.
///
/// Entries are per connection: the same identity connected twice appears
/// twice, and `count` is the connection count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    /// Number of bound connections.
    pub count: usize,
    /// One entry per bound connection.
    pub users: Vec<PresenceUser>,
}

/// Payload of the scoped `error` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Human-readable description of the failure.
    pub message: String,
}

impl ErrorData {
    /// Build an error payload from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Events sent client → server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Bind an identity to this session.
    #[serde(rename = "login")]
    Login(LoginData),
    /// Send a message to the global room.
    #[serde(rename = "message:send")]
    MessageSend(MessageSendData),
    /// Request message history for a room (global when unspecified).
    #[serde(rename = "messages:get")]
    MessagesGet(Option<RoomSelector>),
    /// Send a message to a group room.
    #[serde(rename = "group:message:send")]
    GroupMessageSend(GroupMessageSendData),
    /// Request message history for a group room.
    #[serde(rename = "group:messages:get")]
    GroupMessagesGet(GroupSelector),
    /// Start or stop a typing indicator.
    #[serde(rename = "typing")]
    Typing(TypingData),
    /// Add or replace this user's reaction on a message.
    #[serde(rename = "message:react")]
    React(ReactData),
    /// Remove this user's reaction from a message.
    #[serde(rename = "message:remove-reaction")]
    RemoveReaction(RemoveReactionData),
    /// Pin a message.
    #[serde(rename = "message:pin")]
    Pin(PinData),
    /// Unpin a message.
    #[serde(rename = "message:unpin")]
    Unpin(UnpinData),
    /// Request the pinned messages of a room.
    #[serde(rename = "pinned:messages:get")]
    PinnedMessagesGet(Option<RoomSelector>),
    /// Join the fan-out set of a room.
    #[serde(rename = "room:subscribe")]
    RoomSubscribe(RoomSelector),
    /// Leave the fan-out set of a room.
    #[serde(rename = "room:unsubscribe")]
    RoomUnsubscribe(RoomSelector),
    /// Create a group; the creator becomes member and admin.
    #[serde(rename = "group:create")]
    GroupCreate(GroupCreateData),
    /// Join a group as a member.
    #[serde(rename = "group:join")]
    GroupJoin(GroupSelector),
    /// Leave a group.
    #[serde(rename = "group:leave")]
    GroupLeave(GroupSelector),
}

/// Events sent server → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Greeting, sent once when the connection opens.
    #[serde(rename = "welcome")]
    Welcome(WelcomeData),
    /// A user bound an identity.
    #[serde(rename = "user:joined")]
    UserJoined(UserEventData),
    /// A bound connection closed.
    #[serde(rename = "user:left")]
    UserLeft(UserEventData),
    /// Full presence snapshot.
    #[serde(rename = "users:update")]
    UsersUpdate(PresenceSnapshot),
    /// New global-room message, broadcast to everyone.
    #[serde(rename = "message:new")]
    MessageNew(Message),
    /// Reply to `messages:get`, oldest first.
    #[serde(rename = "messages:history")]
    MessagesHistory(Vec<Message>),
    /// New group-room message, broadcast to room subscribers.
    #[serde(rename = "group:message:new")]
    GroupMessageNew(Message),
    /// Reply to `group:messages:get`, oldest first.
    #[serde(rename = "group:messages:history")]
    GroupMessagesHistory(Vec<Message>),
    /// Typing indicator relay, excluding the sender.
    #[serde(rename = "user:typing")]
    UserTyping(TypingData),
    /// Full document after a reaction change.
    #[serde(rename = "message:updated")]
    MessageUpdated(Message),
    /// Full document after a pin.
    #[serde(rename = "message:pinned")]
    MessagePinned(Message),
    /// Full document after an unpin.
    #[serde(rename = "message:unpinned")]
    MessageUnpinned(Message),
    /// Reply to `pinned:messages:get`, most recently pinned first.
    #[serde(rename = "pinned:messages:list")]
    PinnedMessagesList(Vec<Message>),
    /// Reply to `group:create`.
    #[serde(rename = "group:created")]
    GroupCreated(Group),
    /// Reply to `group:join` / `group:leave` with the updated document.
    #[serde(rename = "group:updated")]
    GroupUpdated(Group),
    /// Scoped failure report, sent only to the requester.
    #[serde(rename = "error")]
    Error(ErrorData),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_names_round_trip() {
        let event = ClientEvent::Login(LoginData {
            id: UserId::from("u1"),
            username: "alice".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "login");
        assert_eq!(json["data"]["username"], "alice");

        let back: ClientEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn colon_event_names_survive() {
        let event = ClientEvent::RemoveReaction(RemoveReactionData {
            message_id: MessageId::from_u128(3),
            user_id: None,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "message:remove-reaction");
    }

    #[test]
    fn message_send_defaults() {
        let json = r#"{"event":"message:send","data":{"username":"alice"}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        let ClientEvent::MessageSend(data) = event else {
            panic!("wrong variant");
        };
        assert_eq!(data.text, "");
        assert_eq!(data.kind, None);
        assert!(data.file.is_none());
    }

    #[test]
    fn room_selector_accepts_bare_and_keyed() {
        let bare: RoomSelector = serde_json::from_str("\"global\"").unwrap();
        assert_eq!(bare.room(), RoomId::Global);

        let keyed: RoomSelector =
            serde_json::from_str(r#"{"room":"00000000000000000000000000000007"}"#).unwrap();
        assert_eq!(keyed.room(), RoomId::Group(GroupId::from_u128(7)));

        let empty: RoomSelector = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.room(), RoomId::Global);
    }

    #[test]
    fn group_selector_accepts_bare_and_keyed() {
        let id = GroupId::from_u128(0xfeed);
        let bare: GroupSelector =
            serde_json::from_str(&format!("\"{id}\"")).unwrap();
        assert_eq!(bare.group_id(), id);

        let keyed: GroupSelector =
            serde_json::from_str(&format!(r#"{{"groupId":"{id}"}}"#)).unwrap();
        assert_eq!(keyed.group_id(), id);
    }

    #[test]
    fn messages_get_without_data() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"messages:get","data":null}"#).unwrap();
        assert_eq!(event, ClientEvent::MessagesGet(None));
    }

    #[test]
    fn server_error_event_shape() {
        let event = ServerEvent::Error(ErrorData::new("not a member of this group"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["message"], "not a member of this group");
    }
}
