//! Seen set
//!
//! Membership set of remote transfer ids that have already been dispatched
//! into the event pipeline. Guards against re-emission until the remote side
//! removes the transfer; pruning against the live listing every poll keeps
//! the set O(live transfers) and lets a removed-and-re-added transfer be
//! processed again.

use std::collections::HashSet;
use tokio::sync::Mutex;

use crate::types::TransferId;

/// Concurrent set of already-dispatched transfer ids
#[derive(Debug, Default)]
pub struct SeenSet {
    inner: Mutex<HashSet<TransferId>>,
}

impl SeenSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the id has already been dispatched.
    pub async fn contains(&self, id: TransferId) -> bool {
        self.inner.lock().await.contains(&id)
    }

    /// Mark an id as dispatched.
    pub async fn insert(&self, id: TransferId) {
        self.inner.lock().await.insert(id);
    }

    /// Drop every id not present in the live listing.
    pub async fn prune(&self, live: &[TransferId]) {
        let mut guard = self.inner.lock().await;
        guard.retain(|id| live.contains(id));
    }

    /// Number of retained ids.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the set is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_contains() {
        let seen = SeenSet::new();
        assert!(!seen.contains(TransferId(1)).await);
        seen.insert(TransferId(1)).await;
        assert!(seen.contains(TransferId(1)).await);
        assert_eq!(seen.len().await, 1);
    }

    #[tokio::test]
    async fn prune_releases_ids_absent_from_live_listing() {
        let seen = SeenSet::new();
        seen.insert(TransferId(1)).await;
        seen.insert(TransferId(2)).await;
        seen.insert(TransferId(3)).await;

        seen.prune(&[TransferId(2)]).await;

        assert!(!seen.contains(TransferId(1)).await);
        assert!(seen.contains(TransferId(2)).await);
        assert!(!seen.contains(TransferId(3)).await);
        assert_eq!(seen.len().await, 1);
    }

    #[tokio::test]
    async fn prune_to_empty_listing_clears_the_set() {
        let seen = SeenSet::new();
        seen.insert(TransferId(1)).await;
        seen.prune(&[]).await;
        assert!(seen.is_empty().await);
    }
}
