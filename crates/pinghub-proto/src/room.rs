//! Broadcast scopes.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ids::{GroupId, ParseIdError};

/// The reserved identifier of the global room.
pub const GLOBAL_ROOM: &str = "global";

/// A broadcast scope: the reserved global room or a specific group.
///
/// `"global"` is never represented as a group document. Group identifiers
/// are always 32 hex characters, so the reserved name cannot collide with a
/// real group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomId {
    /// The single global room. No membership gate; every authenticated
    /// identity may read and write.
    Global,
    /// A member-gated group room.
    Group(GroupId),
}

impl RoomId {
    /// Whether this is the global room.
    #[must_use]
    pub const fn is_global(self) -> bool {
        matches!(self, Self::Global)
    }

    /// The group identifier, if this scope is a group room.
    #[must_use]
    pub const fn as_group(self) -> Option<GroupId> {
        match self {
            Self::Global => None,
            Self::Group(id) => Some(id),
        }
    }
}

impl From<GroupId> for RoomId {
    fn from(id: GroupId) -> Self {
        Self::Group(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str(GLOBAL_ROOM),
            Self::Group(id) => id.fmt(f),
        }
    }
}

impl FromStr for RoomId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == GLOBAL_ROOM {
            return Ok(Self::Global);
        }
        s.parse::<GroupId>().map(Self::Group)
    }
}

impl Serialize for RoomId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| {
            serde::de::Error::custom(format!("invalid room identifier: {s:?}"))
        })
    }
}
