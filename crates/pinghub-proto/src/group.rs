//! Group documents.

use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, UserId};

/// A durable member-gated room.
///
/// The creator is always an initial member and admin. Membership is a set;
/// insertion order carries no meaning. The reserved `"global"` room is never
/// represented as a group document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Stable server-issued identifier.
    pub group_id: GroupId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Whether the group is private.
    #[serde(default)]
    pub is_private: bool,
    /// Member user identifiers.
    pub members: Vec<UserId>,
    /// Admin user identifiers, always a subset of `members`.
    pub admins: Vec<UserId>,
    /// Creator's user identifier.
    pub created_by: UserId,
    /// Creation time as Unix milliseconds.
    pub created_at: u64,
}

impl Group {
    /// Whether `user` is a member.
    #[must_use]
    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }

    /// Whether `user` is an admin.
    #[must_use]
    pub fn is_admin(&self, user: &UserId) -> bool {
        self.admins.contains(user)
    }

    /// Add a member. Idempotent; returns whether the set changed.
    pub fn add_member(&mut self, user: UserId) -> bool {
        if self.is_member(&user) {
            return false;
        }
        self.members.push(user);
        true
    }

    /// Remove a member, stripping admin status as well. Idempotent; returns
    /// whether the member set changed.
    pub fn remove_member(&mut self, user: &UserId) -> bool {
        self.admins.retain(|u| u != user);
        let before = self.members.len();
        self.members.retain(|u| u != user);
        self.members.len() != before
    }

    /// Number of members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> Group {
        Group {
            group_id: GroupId::from_u128(9),
            name: "backend".to_string(),
            description: String::new(),
            is_private: true,
            members: vec![UserId::from("u1")],
            admins: vec![UserId::from("u1")],
            created_by: UserId::from("u1"),
            created_at: 0,
        }
    }

    #[test]
    fn add_member_is_idempotent() {
        let mut g = group();
        assert!(g.add_member(UserId::from("u2")));
        assert!(!g.add_member(UserId::from("u2")));
        assert_eq!(g.member_count(), 2);
    }

    #[test]
    fn remove_member_strips_admin() {
        let mut g = group();
        g.add_member(UserId::from("u2"));
        g.admins.push(UserId::from("u2"));

        assert!(g.remove_member(&UserId::from("u2")));
        assert!(!g.is_member(&UserId::from("u2")));
        assert!(!g.is_admin(&UserId::from("u2")));

        // Removing again is a no-op, not an error.
        assert!(!g.remove_member(&UserId::from("u2")));
    }
}
