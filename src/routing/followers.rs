//! Follower graph: who follows whom.

use std::collections::{BTreeSet, HashMap};

use crate::notification::UserId;

/// Mapping from a followed user to the set of users following it.
#[derive(Debug, Default)]
pub struct FollowerGraph {
    followers: HashMap<UserId, BTreeSet<UserId>>,
}

impl FollowerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `follower` follows `followed`. Returns false if it already did.
    pub fn add_follower(&mut self, follower: UserId, followed: UserId) -> bool {
        self.followers.entry(followed).or_default().insert(follower)
    }

    /// Remove one follow relationship. Returns false if it did not exist.
    pub fn remove_follower(&mut self, follower: UserId, followed: UserId) -> bool {
        let Some(set) = self.followers.get_mut(&followed) else {
            return false;
        };
        let removed = set.remove(&follower);
        if set.is_empty() {
            self.followers.remove(&followed);
        }
        removed
    }

    pub fn is_follower(&self, follower: UserId, followed: UserId) -> bool {
        self.followers
            .get(&followed)
            .is_some_and(|set| set.contains(&follower))
    }

    /// Snapshot of the followers of `followed`, in ascending id order.
    pub fn followers_of(&self, followed: UserId) -> Vec<UserId> {
        self.followers
            .get(&followed)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn follower_count(&self, followed: UserId) -> usize {
        self.followers.get(&followed).map_or(0, BTreeSet::len)
    }
}
