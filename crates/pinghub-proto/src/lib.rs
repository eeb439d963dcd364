//! PingHub wire protocol.
//!
//! Defines everything that crosses a connection: the named client/server
//! events, the durable document types they carry (messages and groups), the
//! identifier newtypes, and the length-prefixed JSON frame codec.
//!
//! The protocol is a named-event protocol: every frame is one JSON object
//! with an `event` tag and a `data` payload, mirroring the shapes clients
//! already speak. Documents are broadcast verbatim, so the document types
//! here double as the storage schema.
//!
//! This crate is transport-agnostic and has no async code.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod codec;
pub mod errors;
mod events;
mod group;
mod ids;
mod message;
mod room;

pub use codec::{LEN_PREFIX_SIZE, MAX_FRAME_SIZE, decode_frame, encode_frame, payload_len};
pub use errors::ProtocolError;
pub use events::{
    ClientEvent, ErrorData, GroupCreateData, GroupMessageSendData, GroupSelector, LoginData,
    MessageSendData, PinData, PresenceSnapshot, PresenceUser, ReactData, RemoveReactionData,
    RoomSelector, ServerEvent, TypingData, UnpinData, UserEventData, WelcomeData,
};
pub use group::Group;
pub use ids::{GroupId, MessageId, ParseIdError, UserId};
pub use message::{FileReference, Message, MessageBody, MessageKind, MessageMetadata};
pub use room::RoomId;

/// ALPN protocol identifier for PingHub QUIC connections.
pub const ALPN_PROTOCOL: &[u8] = b"pinghub";
