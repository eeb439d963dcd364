//! Message documents.
//!
//! A message is append-mostly: `id`, `room`, and `timestamp` are fixed at
//! creation; only `metadata` mutates afterwards (reactions, pin state).
//! Documents are broadcast to clients exactly as persisted, so the JSON
//! field names here are the wire contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    ids::{MessageId, UserId},
    room::RoomId,
};

/// Discriminator for the two message shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text message.
    Text,
    /// Message carrying an uploaded-file reference.
    File,
}

/// Reference to an uploaded file, produced by the (external) upload
/// endpoint. Attached to file messages and never interpreted by this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    /// Server-side file name.
    pub filename: String,
    /// Download URL.
    pub url: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME type reported at upload.
    pub mimetype: String,
    /// Expiry as Unix milliseconds, if the file is temporary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

/// Message content as a tagged variant.
///
/// A file reference can only exist on a file message, and a file message
/// cannot exist without one; the variant makes the invalid combinations
/// unrepresentable instead of policing two optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageBody {
    /// Plain text.
    Text {
        /// Message text.
        text: String,
    },
    /// Uploaded file with an optional caption.
    File {
        /// The opaque file reference.
        file: FileReference,
        /// Caption text, possibly empty.
        #[serde(default)]
        text: String,
    },
}

impl MessageBody {
    /// The discriminator for this body.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::File { .. } => MessageKind::File,
        }
    }

    /// The text content (caption for file messages).
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Text { text } | Self::File { text, .. } => text,
        }
    }
}

/// Mutable message metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// Active reactions, at most one per user; last write wins.
    #[serde(default)]
    pub reactions: BTreeMap<UserId, String>,
    /// Whether the message is currently pinned. Single-slot: a message is
    /// pinned or it is not.
    #[serde(default)]
    pub pinned: bool,
    /// Who pinned the message. Present iff pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_by: Option<UserId>,
    /// When the message was pinned (Unix milliseconds). Present iff pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_at: Option<u64>,
    /// Whether the text has been edited since creation.
    #[serde(default)]
    pub edited: bool,
    /// Unix milliseconds of the last metadata mutation.
    pub last_updated: u64,
}

impl MessageMetadata {
    /// Fresh metadata for a newly created message.
    #[must_use]
    pub fn new(now: u64) -> Self {
        Self {
            reactions: BTreeMap::new(),
            pinned: false,
            pinned_by: None,
            pinned_at: None,
            edited: false,
            last_updated: now,
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier, server-assigned at creation.
    pub id: MessageId,
    /// Author's user identifier.
    pub user_id: UserId,
    /// Author's display name, denormalized at creation time. Not updated if
    /// the user later renames.
    pub username: String,
    /// Broadcast scope the message belongs to. Immutable once set.
    pub room: RoomId,
    /// Text or file content.
    #[serde(flatten)]
    pub body: MessageBody,
    /// Creation time as Unix milliseconds, server-assigned, immutable, and
    /// the sole ordering key within a room.
    pub timestamp: u64,
    /// Mutable metadata (reactions, pin state).
    pub metadata: MessageMetadata,
}
