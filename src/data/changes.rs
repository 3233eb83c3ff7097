//! Change notifications
//!
//! Every committed write transaction publishes the set of records it
//! touched so presentation layers can re-render without polling.

use std::collections::BTreeSet;

use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use super::models::EntityKind;

/// Reference to a stored record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordRef {
    pub kind: EntityKind,
    pub id: String,
}

impl RecordRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// Records inserted, updated and deleted by one commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub inserted: BTreeSet<RecordRef>,
    pub updated: BTreeSet<RecordRef>,
    pub deleted: BTreeSet<RecordRef>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub(crate) fn record_inserted(&mut self, kind: EntityKind, id: &str) {
        self.inserted.insert(RecordRef::new(kind, id));
    }

    /// Updates of a record inserted in the same commit collapse into the insert
    pub(crate) fn record_updated(&mut self, kind: EntityKind, id: &str) {
        let record = RecordRef::new(kind, id);
        if !self.inserted.contains(&record) {
            self.updated.insert(record);
        }
    }

    pub(crate) fn record_deleted(&mut self, kind: EntityKind, id: &str) {
        let record = RecordRef::new(kind, id);
        self.inserted.remove(&record);
        self.updated.remove(&record);
        self.deleted.insert(record);
    }

    /// Whether the record appears anywhere in this change set
    pub fn touches(&self, kind: EntityKind, id: &str) -> bool {
        let record = RecordRef::new(kind, id);
        self.inserted.contains(&record)
            || self.updated.contains(&record)
            || self.deleted.contains(&record)
    }
}

/// Broadcast channel for committed change sets
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeSet>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub(crate) fn publish(&self, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        // No receivers is fine: nobody is rendering.
        let receivers = self.sender.send(changes).unwrap_or(0);
        tracing::trace!(receivers, "Published change set");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.sender.subscribe()
    }

    /// Stream of change sets; lagged receivers skip what they missed
    pub fn stream(&self) -> impl Stream<Item = ChangeSet> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|item| match item {
            Ok(changes) => Some(changes),
            Err(error) => {
                tracing::warn!(%error, "Change stream receiver lagged");
                None
            }
        })
    }
}
