//! Presence snapshots.
//!
//! Builds the full `users:update` payload from the registry after every
//! open, bind, and close. Entries are per connection: an identity bound on
//! two connections appears twice and `count` is the connection count.

use pinghub_proto::{PresenceSnapshot, PresenceUser};

use crate::registry::SessionRegistry;

/// Build a presence snapshot of all bound sessions.
///
/// Ordered by connection time, then user id, so repeated snapshots of the
/// same state are byte-identical on the wire.
pub fn snapshot(registry: &SessionRegistry) -> PresenceSnapshot {
    let mut users: Vec<PresenceUser> = registry
        .bound_sessions()
        .filter_map(|(_, info)| {
            info.identity.as_ref().map(|identity| PresenceUser {
                user_id: identity.user_id.clone(),
                username: identity.username.clone(),
                connected_at: info.connected_at,
            })
        })
        .collect();

    users.sort_by(|a, b| {
        a.connected_at.cmp(&b.connected_at).then_with(|| a.user_id.cmp(&b.user_id))
    });

    PresenceSnapshot { count: users.len(), users }
}

#[cfg(test)]
mod tests {
    use pinghub_proto::UserId;

    use super::*;
    use crate::registry::Identity;

    fn identity(user: &str) -> Identity {
        Identity { user_id: UserId::from(user), username: user.to_string() }
    }

    #[test]
    fn unbound_sessions_are_invisible() {
        let mut registry = SessionRegistry::new();
        registry.open(1, 0);

        let snap = snapshot(&registry);
        assert_eq!(snap.count, 0);
        assert!(snap.users.is_empty());
    }

    #[test]
    fn one_entry_per_connection() {
        let mut registry = SessionRegistry::new();
        registry.open(1, 10);
        registry.open(2, 20);
        registry.bind(1, identity("u1")).unwrap();
        registry.bind(2, identity("u1")).unwrap();

        let snap = snapshot(&registry);
        assert_eq!(snap.count, 2);
        assert!(snap.users.iter().all(|u| u.user_id == UserId::from("u1")));
    }

    #[test]
    fn snapshot_order_is_stable() {
        let mut registry = SessionRegistry::new();
        registry.open(1, 30);
        registry.open(2, 10);
        registry.open(3, 20);
        registry.bind(1, identity("u1")).unwrap();
        registry.bind(2, identity("u2")).unwrap();
        registry.bind(3, identity("u3")).unwrap();

        let snap = snapshot(&registry);
        let order: Vec<u64> = snap.users.iter().map(|u| u.connected_at).collect();
        assert_eq!(order, vec![10, 20, 30]);
    }

    #[test]
    fn close_removes_the_entry() {
        let mut registry = SessionRegistry::new();
        registry.open(1, 0);
        registry.open(2, 0);
        registry.bind(1, identity("u1")).unwrap();
        registry.bind(2, identity("u2")).unwrap();

        registry.close(1);
        let snap = snapshot(&registry);
        assert_eq!(snap.count, 1);
        assert_eq!(snap.users[0].user_id, UserId::from("u2"));
    }
}
