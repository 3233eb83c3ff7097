//! Feed pagination
//!
//! A feed slot per (owner, kind) collects the statuses or notifications of
//! every page fetched for it. `has_more` on an entry means older items may
//! exist past it that were never fetched:
//!
//! - the oldest item of a page is flagged when it is attached for the first
//!   time;
//! - fetching "older than X" clears X's flag, because the new page now
//!   continues directly from it.
//!
//! The flag therefore walks back in time as older pages arrive and
//! disappears once a page overlaps history we already had.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::merge::{MergeContext, MergeResolver};
use crate::data::{
    Changes, Database, EntityKey, FeedKind, FeedSlot, FeedTarget, MergeCache,
};
use crate::error::AppError;
use crate::remote::{AuthContext, RemoteNotification, RemoteStatus};

/// Result of ingesting one page
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedPage {
    pub slot: FeedSlot,
    /// Local ids of the page's records, in server order
    pub record_ids: Vec<String>,
    /// Entries created by this page
    pub newly_attached: usize,
}

/// A merged page item with the data needed to order it
struct PageItem {
    target: FeedTarget,
    created_at: DateTime<Utc>,
}

pub struct FeedPaginator {
    db: Arc<Database>,
}

impl FeedPaginator {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Merge a page of statuses and attach it to `owner`'s `kind` feed.
    ///
    /// `requested_max_id` is the remote id the page was fetched "older
    /// than", if any.
    pub async fn ingest_statuses(
        &self,
        kind: FeedKind,
        owner: &AuthContext,
        page: &[RemoteStatus],
        requested_max_id: Option<&str>,
        network_date: DateTime<Utc>,
    ) -> Result<IngestedPage, AppError> {
        if kind.holds_notifications() {
            return Err(AppError::BadRequest(format!(
                "{} feeds hold notifications, not statuses",
                kind.as_str()
            )));
        }

        let mut changes = self.db.begin_changes().await?;
        let owner_id = owner_id(&mut changes, owner).await?;
        let ctx = MergeContext::for_actor(owner, network_date);
        let mut cache = MergeCache::new();

        let mut items = Vec::with_capacity(page.len());
        for remote in page {
            if let Some(merged) =
                MergeResolver::merge_status(&mut changes, &ctx, &mut cache, remote).await?
            {
                items.push(PageItem {
                    target: FeedTarget::Status(merged.record.id.clone()),
                    created_at: merged.record.created_at,
                });
            }
        }

        let anchor = match requested_max_id {
            Some(anchor) => changes
                .status_by_key(&EntityKey::new(&ctx.domain, anchor))
                .await?
                .map(|status| FeedTarget::Status(status.id)),
            None => None,
        };

        let ingested = attach_page(&mut changes, &owner_id, kind, anchor, items).await?;
        changes.commit().await?;

        record_page(kind, &ingested);
        Ok(ingested)
    }

    /// Merge a page of notifications and attach it to `owner`'s `kind` feed
    pub async fn ingest_notifications(
        &self,
        kind: FeedKind,
        owner: &AuthContext,
        page: &[RemoteNotification],
        requested_max_id: Option<&str>,
        network_date: DateTime<Utc>,
    ) -> Result<IngestedPage, AppError> {
        if !kind.holds_notifications() {
            return Err(AppError::BadRequest(format!(
                "{} feeds hold statuses, not notifications",
                kind.as_str()
            )));
        }

        let mut changes = self.db.begin_changes().await?;
        let owner_id = owner_id(&mut changes, owner).await?;
        let ctx = MergeContext::for_actor(owner, network_date);
        let mut cache = MergeCache::new();

        let mut items = Vec::with_capacity(page.len());
        for remote in page {
            if let Some(merged) =
                MergeResolver::merge_notification(&mut changes, &ctx, &mut cache, remote).await?
            {
                items.push(PageItem {
                    target: FeedTarget::Notification(merged.record.id.clone()),
                    created_at: merged.record.created_at,
                });
            }
        }

        let anchor = match requested_max_id {
            Some(anchor) => changes
                .notification_by_key(&owner_id, &EntityKey::new(&ctx.domain, anchor))
                .await?
                .map(|notification| FeedTarget::Notification(notification.id)),
            None => None,
        };

        let ingested = attach_page(&mut changes, &owner_id, kind, anchor, items).await?;
        changes.commit().await?;

        record_page(kind, &ingested);
        Ok(ingested)
    }
}

async fn owner_id(changes: &mut Changes, owner: &AuthContext) -> Result<String, AppError> {
    let key = EntityKey::new(&owner.domain, &owner.user_id);
    match changes.account_by_key(&key).await? {
        Some(account) => Ok(account.id),
        None => Err(AppError::invariant(format!(
            "feed owner {}@{} is not stored",
            owner.user_id, owner.domain
        ))),
    }
}

async fn attach_page(
    changes: &mut Changes,
    owner_id: &str,
    kind: FeedKind,
    anchor: Option<FeedTarget>,
    items: Vec<PageItem>,
) -> Result<IngestedPage, AppError> {
    let now = Utc::now();
    let slot = changes.get_or_create_feed(owner_id, kind, now).await?;

    if let Some(anchor) = &anchor {
        if let Some(entry) = changes.feed_entry(&slot.id, anchor).await? {
            if changes.set_feed_entry_has_more(&entry.id, false).await? {
                tracing::debug!(feed = %slot.id, entry = %entry.id, "Page bridged to known history");
            }
        }
    }

    let oldest = items
        .iter()
        .min_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.target.id().cmp(b.target.id()))
        })
        .map(|item| item.target.clone());

    let mut record_ids = Vec::with_capacity(items.len());
    let mut newly_attached = 0;
    for item in &items {
        let (entry, created) = changes.attach_feed_entry(&slot.id, &item.target, now).await?;
        if created {
            newly_attached += 1;
            if oldest.as_ref() == Some(&item.target) {
                changes.set_feed_entry_has_more(&entry.id, true).await?;
            }
        }
        record_ids.push(item.target.id().to_string());
    }

    let slot = changes.refresh_feed_slot(&slot, now).await?;
    Ok(IngestedPage {
        slot,
        record_ids,
        newly_attached,
    })
}

fn record_page(kind: FeedKind, page: &IngestedPage) {
    crate::metrics::FEED_PAGES_TOTAL
        .with_label_values(&[kind.as_str()])
        .inc();
    crate::metrics::FEED_ENTRIES_ATTACHED_TOTAL
        .with_label_values(&[kind.as_str()])
        .inc_by(page.newly_attached as u64);
    tracing::debug!(
        feed = %page.slot.id,
        kind = kind.as_str(),
        received = page.record_ids.len(),
        attached = page.newly_attached,
        has_more = page.slot.has_more,
        "Ingested feed page"
    );
}
