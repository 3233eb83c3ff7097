//! Request-scoped merge cache
//!
//! Remembers records already resolved during one batch so that a page
//! mentioning the same author fifty times costs one lookup. A cache belongs
//! to exactly one write transaction and must be dropped with it; entries are
//! not valid after a rollback.

use std::collections::HashMap;

use super::models::{Account, EntityKey, Notification, Poll, Status};

// =============================================================================
// Merge Cache
// =============================================================================

#[derive(Debug, Default)]
pub struct MergeCache {
    accounts: HashMap<EntityKey, Account>,
    statuses: HashMap<EntityKey, Status>,
    polls: HashMap<EntityKey, Poll>,
    /// (owner id, key) -> notification
    notifications: HashMap<(String, EntityKey), Notification>,
}

impl MergeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, key: &EntityKey) -> Option<&Account> {
        let hit = self.accounts.get(key);
        record_hit("account", hit.is_some());
        hit
    }

    pub fn put_account(&mut self, account: Account) {
        self.accounts.insert(account.key(), account);
    }

    pub fn status(&self, key: &EntityKey) -> Option<&Status> {
        let hit = self.statuses.get(key);
        record_hit("status", hit.is_some());
        hit
    }

    pub fn put_status(&mut self, status: Status) {
        self.statuses.insert(status.key(), status);
    }

    pub fn poll(&self, key: &EntityKey) -> Option<&Poll> {
        let hit = self.polls.get(key);
        record_hit("poll", hit.is_some());
        hit
    }

    pub fn put_poll(&mut self, poll: Poll) {
        let key = EntityKey::new(&poll.domain, &poll.remote_id);
        self.polls.insert(key, poll);
    }

    pub fn notification(&self, owner_id: &str, key: &EntityKey) -> Option<&Notification> {
        let hit = self
            .notifications
            .get(&(owner_id.to_string(), key.clone()));
        record_hit("notification", hit.is_some());
        hit
    }

    pub fn put_notification(&mut self, notification: Notification) {
        let key = EntityKey::new(&notification.domain, &notification.remote_id);
        self.notifications
            .insert((notification.owner_id.clone(), key), notification);
    }

    pub fn len(&self) -> usize {
        self.accounts.len() + self.statuses.len() + self.polls.len() + self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn record_hit(entity: &str, hit: bool) {
    if hit {
        crate::metrics::MERGE_CACHE_HITS_TOTAL
            .with_label_values(&[entity])
            .inc();
    }
}
