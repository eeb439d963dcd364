//! Newcomer digest policy for global history.
//!
//! An identity that has never been seen, or was first seen only moments
//! ago, gets a curated digest instead of the full global backlog: the
//! pinned messages first, then the very recent tail. This keeps a fresh
//! client's first paint meaningful without shipping the whole room.

use pinghub_proto::{Message, MessageId};

/// Tunables for the newcomer digest.
#[derive(Debug, Clone)]
pub struct NewcomerPolicy {
    /// How long after first sight an identity still counts as new.
    pub window_millis: u64,
    /// Maximum pinned messages in the digest.
    pub pinned_limit: usize,
    /// Maximum recent-tail messages in the digest.
    pub recent_limit: usize,
    /// Overall digest cap after de-duplication.
    pub digest_limit: usize,
}

impl Default for NewcomerPolicy {
    fn default() -> Self {
        Self { window_millis: 60_000, pinned_limit: 10, recent_limit: 5, digest_limit: 20 }
    }
}

impl NewcomerPolicy {
    /// Whether an identity first seen at `first_seen` (or never, `None`)
    /// still counts as a newcomer at `now`.
    #[must_use]
    pub fn is_newcomer(&self, first_seen: Option<u64>, now: u64) -> bool {
        match first_seen {
            None => true,
            Some(at) => now.saturating_sub(at) < self.window_millis,
        }
    }

    /// Assemble the digest: pinned first, then the recent tail, de-duped
    /// by message id and capped at `digest_limit`.
    #[must_use]
    pub fn digest(&self, pinned: Vec<Message>, recent: Vec<Message>) -> Vec<Message> {
        let mut seen: Vec<MessageId> = Vec::new();
        let mut digest = Vec::new();

        for message in pinned.into_iter().chain(recent) {
            if digest.len() >= self.digest_limit {
                break;
            }
            if seen.contains(&message.id) {
                continue;
            }
            seen.push(message.id);
            digest.push(message);
        }

        digest
    }
}
