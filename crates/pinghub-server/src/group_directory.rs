//! Group directory: creation, lookup, and membership.
//!
//! The only authority on who may read or write a group room. Membership is
//! re-checked against the store on every call - nothing here caches, so a
//! removal takes effect on the next event.

use pinghub_proto::{Group, GroupCreateData, GroupId, UserId};

use crate::{server_error::EventError, storage::Store};

/// Group operations, generic over the storage backend.
#[derive(Debug, Clone)]
pub struct GroupDirectory<S: Store> {
    store: S,
}

impl<S: Store> GroupDirectory<S> {
    /// Wrap a storage backend.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create a group. The creator is seeded as first member and admin.
    pub fn create(
        &self,
        request: &GroupCreateData,
        creator: &UserId,
        id: GroupId,
        now: u64,
    ) -> Result<Group, EventError> {
        if request.name.trim().is_empty() {
            return Err(EventError::Validation("group name is empty".to_string()));
        }

        let group = Group {
            group_id: id,
            name: request.name.clone(),
            description: request.description.clone(),
            is_private: request.is_private,
            members: vec![creator.clone()],
            admins: vec![creator.clone()],
            created_by: creator.clone(),
            created_at: now,
        };

        self.store.insert_group(&group)?;
        Ok(group)
    }

    /// Load a group by id.
    pub fn get(&self, id: GroupId) -> Result<Group, EventError> {
        self.store.group(id)?.ok_or_else(|| EventError::NotFound("group".to_string()))
    }

    /// Whether `user` is currently a member.
    pub fn is_member(&self, id: GroupId, user: &UserId) -> Result<bool, EventError> {
        Ok(self.get(id)?.is_member(user))
    }

    /// Whether `user` is currently an admin.
    pub fn is_admin(&self, id: GroupId, user: &UserId) -> Result<bool, EventError> {
        Ok(self.get(id)?.is_admin(user))
    }

    /// Add `user` to the member set. Idempotent; returns the updated group.
    pub fn add_member(&self, id: GroupId, user: &UserId) -> Result<Group, EventError> {
        let user = user.clone();
        self.store
            .update_group(id, |group| {
                group.add_member(user);
            })?
            .ok_or_else(|| EventError::NotFound("group".to_string()))
    }

    /// Remove `user` from the member set, stripping admin status.
    /// Idempotent; returns the updated group.
    pub fn remove_member(&self, id: GroupId, user: &UserId) -> Result<Group, EventError> {
        let user = user.clone();
        self.store
            .update_group(id, |group| {
                group.remove_member(&user);
            })?
            .ok_or_else(|| EventError::NotFound("group".to_string()))
    }

    /// All groups `user` belongs to.
    pub fn groups_for_user(&self, user: &UserId) -> Result<Vec<Group>, EventError> {
        Ok(self.store.groups_for_member(user)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn directory() -> GroupDirectory<MemoryStore> {
        GroupDirectory::new(MemoryStore::new())
    }

    fn request(name: &str) -> GroupCreateData {
        GroupCreateData { name: name.to_string(), description: String::new(), is_private: false }
    }

    #[test]
    fn creator_is_member_and_admin() {
        let groups = directory();
        let id = GroupId::from_u128(1);

        let group = groups.create(&request("backend"), &UserId::from("u1"), id, 100).unwrap();
        assert_eq!(group.created_at, 100);
        assert!(groups.is_member(id, &UserId::from("u1")).unwrap());
        assert!(groups.is_admin(id, &UserId::from("u1")).unwrap());
    }

    #[test]
    fn empty_name_is_rejected() {
        let groups = directory();
        let err = groups
            .create(&request("  "), &UserId::from("u1"), GroupId::from_u128(1), 0)
            .unwrap_err();
        assert!(matches!(err, EventError::Validation(_)));
    }

    #[test]
    fn membership_changes_are_visible_immediately() {
        let groups = directory();
        let id = GroupId::from_u128(1);
        groups.create(&request("backend"), &UserId::from("u1"), id, 0).unwrap();

        groups.add_member(id, &UserId::from("u2")).unwrap();
        assert!(groups.is_member(id, &UserId::from("u2")).unwrap());

        groups.remove_member(id, &UserId::from("u2")).unwrap();
        assert!(!groups.is_member(id, &UserId::from("u2")).unwrap());
    }

    #[test]
    fn add_member_is_idempotent() {
        let groups = directory();
        let id = GroupId::from_u128(1);
        groups.create(&request("backend"), &UserId::from("u1"), id, 0).unwrap();

        groups.add_member(id, &UserId::from("u2")).unwrap();
        let group = groups.add_member(id, &UserId::from("u2")).unwrap();
        assert_eq!(group.member_count(), 2);
    }

    #[test]
    fn removing_member_strips_admin() {
        let groups = directory();
        let id = GroupId::from_u128(1);
        groups.create(&request("backend"), &UserId::from("u1"), id, 0).unwrap();

        let group = groups.remove_member(id, &UserId::from("u1")).unwrap();
        assert!(group.members.is_empty());
        assert!(group.admins.is_empty());
    }

    #[test]
    fn unknown_group_is_not_found() {
        let groups = directory();
        let id = GroupId::from_u128(404);

        assert!(matches!(groups.get(id), Err(EventError::NotFound(_))));
        assert!(matches!(
            groups.add_member(id, &UserId::from("u1")),
            Err(EventError::NotFound(_))
        ));
    }

    #[test]
    fn groups_for_user_lists_memberships() {
        let groups = directory();
        groups.create(&request("a"), &UserId::from("u1"), GroupId::from_u128(1), 0).unwrap();
        groups.create(&request("b"), &UserId::from("u1"), GroupId::from_u128(2), 0).unwrap();
        groups.create(&request("c"), &UserId::from("u2"), GroupId::from_u128(3), 0).unwrap();

        assert_eq!(groups.groups_for_user(&UserId::from("u1")).unwrap().len(), 2);
        assert_eq!(groups.groups_for_user(&UserId::from("u2")).unwrap().len(), 1);
    }
}
