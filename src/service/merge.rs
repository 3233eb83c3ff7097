//! Identity & merge resolver
//!
//! Turns remote payloads into local records. Every entity is looked up by
//! `(domain, remote_id)`, first in the caller's [`MergeCache`] and then in
//! the store; a miss inserts, a hit writes only the columns that changed.
//! Nested entities are merged first (account, then reblog target, then the
//! status, its poll and the actor's flags on it).
//!
//! A payload that needs a record we do not have (the acting account, a
//! notification's owner, a relationship's target) is skipped with a warning
//! and yields `None`; the rest of the batch carries on.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::data::{
    Account, Changes, Database, EntityId, EntityKey, EntityKind, InteractionKind, MergeCache,
    Notification, Poll, PollOption, Relationship, RelationshipKind, Status,
};
use crate::error::AppError;
use crate::remote::{
    AuthContext, RemoteAccount, RemoteNotification, RemotePoll, RemoteRelationship, RemoteStatus,
    normalize_domain,
};

/// Where a payload came from and who asked for it
#[derive(Debug, Clone, PartialEq)]
pub struct MergeContext {
    /// Server the payload was fetched from
    pub domain: String,
    /// Signed-in account whose perspective flags the payload carries
    pub actor: Option<EntityKey>,
    /// Server-reported time of the response
    pub network_date: DateTime<Utc>,
}

impl MergeContext {
    /// Payload fetched without a signed-in account
    pub fn anonymous(domain: &str, network_date: DateTime<Utc>) -> Self {
        Self {
            domain: normalize_domain(domain),
            actor: None,
            network_date,
        }
    }

    pub fn for_actor(auth: &AuthContext, network_date: DateTime<Utc>) -> Self {
        Self {
            domain: auth.domain.clone(),
            actor: Some(EntityKey::new(&auth.domain, &auth.user_id)),
            network_date,
        }
    }

    fn key(&self, remote_id: &str) -> EntityKey {
        EntityKey::new(&self.domain, remote_id)
    }
}

/// A merged record and whether this merge created it
#[derive(Debug, Clone, PartialEq)]
pub struct Merged<T> {
    pub record: T,
    pub created: bool,
}

impl<T> Merged<T> {
    fn created(record: T) -> Self {
        Self {
            record,
            created: true,
        }
    }

    fn existing(record: T) -> Self {
        Self {
            record,
            created: false,
        }
    }
}

/// Outcome of resolving the context's actor
enum Actor {
    Anonymous,
    Known(Account),
    Missing,
}

impl Actor {
    fn id(&self) -> Option<&str> {
        match self {
            Actor::Known(account) => Some(&account.id),
            _ => None,
        }
    }
}

async fn resolve_actor(
    changes: &mut Changes,
    ctx: &MergeContext,
    cache: &mut MergeCache,
) -> Result<Actor, AppError> {
    let Some(key) = &ctx.actor else {
        return Ok(Actor::Anonymous);
    };
    if let Some(account) = cache.account(key) {
        return Ok(Actor::Known(account.clone()));
    }
    match changes.account_by_key(key).await? {
        Some(account) => {
            cache.put_account(account.clone());
            Ok(Actor::Known(account))
        }
        None => {
            tracing::warn!(
                domain = %key.domain,
                remote_id = %key.remote_id,
                "Acting account is not stored; skipping payload"
            );
            Ok(Actor::Missing)
        }
    }
}

/// Whether a payload dated `network_date` is older than what is stored
pub(crate) fn is_stale(network_date: DateTime<Utc>, last_network_at: DateTime<Utc>) -> bool {
    network_date < last_network_at
}

/// Merges remote payloads into the store
///
/// All functions run inside the caller's write transaction; nothing is
/// visible to readers until the caller commits.
pub struct MergeResolver;

impl MergeResolver {
    // =========================================================================
    // Accounts
    // =========================================================================

    pub async fn merge_account(
        changes: &mut Changes,
        ctx: &MergeContext,
        cache: &mut MergeCache,
        remote: &RemoteAccount,
    ) -> Result<Merged<Account>, AppError> {
        let key = ctx.key(&remote.id);
        let now = Utc::now();

        let existing = match cache.account(&key) {
            Some(account) => Some(account.clone()),
            None => changes.account_by_key(&key).await?,
        };

        let merged = match existing {
            None => {
                let account = account_from_remote(EntityId::new().0, ctx, remote, now);
                changes.insert_account(&account).await?;
                crate::metrics::record_merge("account", "created");
                Merged::created(account)
            }
            Some(current) if is_stale(ctx.network_date, current.last_network_at) => {
                tracing::debug!(id = %current.id, "Ignoring stale account payload");
                crate::metrics::record_merge("account", "stale");
                Merged::existing(current)
            }
            Some(current) => {
                let mut incoming = account_from_remote(current.id.clone(), ctx, remote, now);
                if changes
                    .update_record(EntityKind::Account, &current, &incoming, now)
                    .await?
                {
                    crate::metrics::record_merge("account", "updated");
                    Merged::existing(incoming)
                } else {
                    crate::metrics::record_merge("account", "unchanged");
                    incoming.updated_at = current.updated_at;
                    incoming.last_network_at = current.last_network_at;
                    Merged::existing(incoming)
                }
            }
        };

        cache.put_account(merged.record.clone());
        Ok(merged)
    }

    // =========================================================================
    // Statuses
    // =========================================================================

    /// Merge a status and everything nested in it.
    ///
    /// A reblog wrapper merges its target first and points `reblog_of_id`
    /// at the target's local id.
    pub fn merge_status<'a>(
        changes: &'a mut Changes,
        ctx: &'a MergeContext,
        cache: &'a mut MergeCache,
        remote: &'a RemoteStatus,
    ) -> BoxFuture<'a, Result<Option<Merged<Status>>, AppError>> {
        async move {
            let actor = resolve_actor(changes, ctx, cache).await?;
            if matches!(actor, Actor::Missing) {
                return Ok(None);
            }

            let author = Self::merge_account(changes, ctx, cache, &remote.account).await?;

            let reblog_of_id = match &remote.reblog {
                Some(target) => match Self::merge_status(changes, ctx, cache, target).await? {
                    Some(target) => Some(target.record.id),
                    None => return Ok(None),
                },
                None => None,
            };

            let key = ctx.key(&remote.id);
            let now = Utc::now();
            let existing = match cache.status(&key) {
                Some(status) => Some(status.clone()),
                None => changes.status_by_key(&key).await?,
            };

            let (merged, stale) = match existing {
                None => {
                    let status = status_from_remote(
                        EntityId::new().0,
                        ctx,
                        remote,
                        &author.record.id,
                        reblog_of_id,
                        now,
                    );
                    changes.insert_status(&status).await?;
                    crate::metrics::record_merge("status", "created");
                    (Merged::created(status), false)
                }
                Some(current) if is_stale(ctx.network_date, current.last_network_at) => {
                    tracing::debug!(id = %current.id, "Ignoring stale status payload");
                    crate::metrics::record_merge("status", "stale");
                    (Merged::existing(current), true)
                }
                Some(current) => {
                    let mut incoming = status_from_remote(
                        current.id.clone(),
                        ctx,
                        remote,
                        &author.record.id,
                        reblog_of_id,
                        now,
                    );
                    incoming.deleted_at = current.deleted_at;
                    if changes
                        .update_record(EntityKind::Status, &current, &incoming, now)
                        .await?
                    {
                        crate::metrics::record_merge("status", "updated");
                    } else {
                        crate::metrics::record_merge("status", "unchanged");
                        incoming.updated_at = current.updated_at;
                        incoming.last_network_at = current.last_network_at;
                    }
                    (Merged::existing(incoming), false)
                }
            };
            cache.put_status(merged.record.clone());

            if let Some(poll) = &remote.poll {
                Self::merge_poll(changes, ctx, cache, poll, &merged.record.id).await?;
            }

            if let (Some(actor_id), false) = (actor.id(), stale) {
                let flags = [
                    (remote.favourited, InteractionKind::Favourited),
                    (remote.reblogged, InteractionKind::Reblogged),
                    (remote.bookmarked, InteractionKind::Bookmarked),
                    (remote.muted, InteractionKind::Muted),
                    (remote.pinned, InteractionKind::Pinned),
                ];
                for (flag, kind) in flags {
                    if let Some(is_set) = flag {
                        changes
                            .set_interaction(&merged.record.id, actor_id, kind, is_set)
                            .await?;
                    }
                }
            }

            Ok(Some(merged))
        }
        .boxed()
    }

    // =========================================================================
    // Polls
    // =========================================================================

    /// Merge a poll owned by the local status `status_id`.
    ///
    /// `own_votes`, when present, replaces the actor's votes on every option
    /// and marks them confirmed.
    pub async fn merge_poll(
        changes: &mut Changes,
        ctx: &MergeContext,
        cache: &mut MergeCache,
        remote: &RemotePoll,
        status_id: &str,
    ) -> Result<Option<Merged<Poll>>, AppError> {
        let actor = resolve_actor(changes, ctx, cache).await?;
        if matches!(actor, Actor::Missing) {
            return Ok(None);
        }

        let key = ctx.key(&remote.id);
        let now = Utc::now();
        let existing = match cache.poll(&key) {
            Some(poll) => Some(poll.clone()),
            None => changes.poll_by_key(&key).await?,
        };

        let (merged, stale) = match existing {
            None => {
                let poll = poll_from_remote(EntityId::new().0, ctx, remote, status_id, now);
                changes.insert_poll(&poll).await?;
                crate::metrics::record_merge("poll", "created");
                (Merged::created(poll), false)
            }
            Some(current) if is_stale(ctx.network_date, current.last_network_at) => {
                tracing::debug!(id = %current.id, "Ignoring stale poll payload");
                crate::metrics::record_merge("poll", "stale");
                (Merged::existing(current), true)
            }
            Some(current) => {
                let mut incoming =
                    poll_from_remote(current.id.clone(), ctx, remote, &current.status_id, now);
                if changes
                    .update_record(EntityKind::Poll, &current, &incoming, now)
                    .await?
                {
                    crate::metrics::record_merge("poll", "updated");
                } else {
                    crate::metrics::record_merge("poll", "unchanged");
                    incoming.updated_at = current.updated_at;
                    incoming.last_network_at = current.last_network_at;
                }
                (Merged::existing(incoming), false)
            }
        };
        cache.put_poll(merged.record.clone());

        if stale {
            return Ok(Some(merged));
        }

        let stored = changes.poll_options(&merged.record.id).await?;
        let mut options = Vec::with_capacity(remote.options.len());
        for (index, remote_option) in remote.options.iter().enumerate() {
            let index = index as i64;
            let current = stored.iter().find(|option| option.option_index == index);
            let incoming = PollOption {
                id: current
                    .map(|option| option.id.clone())
                    .unwrap_or_else(|| EntityId::new().0),
                poll_id: merged.record.id.clone(),
                option_index: index,
                title: remote_option.title.clone(),
                votes_count: remote_option.votes_count,
                updated_at: now,
            };
            match current {
                Some(current) => {
                    changes
                        .update_record(EntityKind::PollOption, current, &incoming, now)
                        .await?;
                }
                None => changes.insert_poll_option(&incoming).await?,
            }
            options.push(incoming);
        }

        if let (Some(actor_id), Some(own_votes)) = (actor.id(), &remote.own_votes) {
            for option in &options {
                let voted = own_votes.contains(&(option.option_index as usize));
                changes
                    .set_poll_vote(&option.id, actor_id, voted, true)
                    .await?;
            }
        }

        Ok(Some(merged))
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Merge a notification into the actor's inbox.
    ///
    /// Notifications are scoped to their owner; without a stored actor there
    /// is nobody to own it and the payload is skipped.
    pub async fn merge_notification(
        changes: &mut Changes,
        ctx: &MergeContext,
        cache: &mut MergeCache,
        remote: &RemoteNotification,
    ) -> Result<Option<Merged<Notification>>, AppError> {
        let owner = match resolve_actor(changes, ctx, cache).await? {
            Actor::Known(owner) => owner,
            Actor::Anonymous => {
                tracing::warn!(remote_id = %remote.id, "Notification without an owner; skipping");
                return Ok(None);
            }
            Actor::Missing => return Ok(None),
        };

        let source = Self::merge_account(changes, ctx, cache, &remote.account).await?;
        let status_id = match &remote.status {
            Some(status) => match Self::merge_status(changes, ctx, cache, status).await? {
                Some(status) => Some(status.record.id),
                None => return Ok(None),
            },
            None => None,
        };

        let key = ctx.key(&remote.id);
        let now = Utc::now();
        let existing = match cache.notification(&owner.id, &key) {
            Some(notification) => Some(notification.clone()),
            None => changes.notification_by_key(&owner.id, &key).await?,
        };

        let merged = match existing {
            None => {
                let notification = Notification {
                    id: EntityId::new().0,
                    domain: ctx.domain.clone(),
                    owner_id: owner.id.clone(),
                    remote_id: remote.id.clone(),
                    kind: remote.kind.clone(),
                    account_id: source.record.id.clone(),
                    status_id,
                    created_at: remote.created_at,
                    updated_at: now,
                };
                changes.insert_notification(&notification).await?;
                crate::metrics::record_merge("notification", "created");
                Merged::created(notification)
            }
            Some(current) => {
                let mut incoming = Notification {
                    kind: remote.kind.clone(),
                    account_id: source.record.id.clone(),
                    status_id,
                    created_at: remote.created_at,
                    updated_at: now,
                    ..current.clone()
                };
                if changes
                    .update_record(EntityKind::Notification, &current, &incoming, now)
                    .await?
                {
                    crate::metrics::record_merge("notification", "updated");
                } else {
                    crate::metrics::record_merge("notification", "unchanged");
                    incoming.updated_at = current.updated_at;
                }
                Merged::existing(incoming)
            }
        };

        cache.put_notification(merged.record.clone());
        Ok(Some(merged))
    }

    // =========================================================================
    // Relationships
    // =========================================================================

    /// Write the actor's relationship with `remote.id` as edges.
    ///
    /// Returns the stored relationship after the merge, or `None` when the
    /// actor or the target account is not stored.
    pub async fn merge_relationship(
        changes: &mut Changes,
        ctx: &MergeContext,
        cache: &mut MergeCache,
        remote: &RemoteRelationship,
    ) -> Result<Option<Relationship>, AppError> {
        let actor = match resolve_actor(changes, ctx, cache).await? {
            Actor::Known(actor) => actor,
            Actor::Anonymous => {
                tracing::warn!(target = %remote.id, "Relationship without an actor; skipping");
                return Ok(None);
            }
            Actor::Missing => return Ok(None),
        };

        let key = ctx.key(&remote.id);
        let target = match cache.account(&key) {
            Some(account) => account.clone(),
            None => match changes.account_by_key(&key).await? {
                Some(account) => account,
                None => {
                    tracing::warn!(target = %remote.id, "Relationship target is not stored; skipping");
                    return Ok(None);
                }
            },
        };

        let outgoing = [
            (RelationshipKind::Following, remote.following),
            (RelationshipKind::FollowRequested, remote.requested),
            (RelationshipKind::Muting, remote.muting),
            (
                RelationshipKind::MutingNotifications,
                remote.muting && remote.muting_notifications,
            ),
            (RelationshipKind::Blocking, remote.blocking),
            (RelationshipKind::DomainBlocking, remote.domain_blocking),
            (RelationshipKind::Endorsing, remote.endorsed),
            (RelationshipKind::ShowingReblogs, remote.showing_reblogs),
            (RelationshipKind::Notifying, remote.notifying),
        ];
        for (kind, is_set) in outgoing {
            changes
                .set_relationship(kind, &actor.id, &target.id, is_set)
                .await?;
        }

        let incoming = [
            (RelationshipKind::Following, remote.followed_by),
            (RelationshipKind::Blocking, remote.blocked_by),
        ];
        for (kind, is_set) in incoming {
            changes
                .set_relationship(kind, &target.id, &actor.id, is_set)
                .await?;
        }

        crate::metrics::record_merge("relationship", "merged");
        Ok(Some(changes.relationship(&actor.id, &target.id).await?))
    }

    // =========================================================================
    // Batches
    // =========================================================================

    /// Merge a batch of accounts in one transaction
    pub async fn ingest_accounts(
        db: &Database,
        ctx: &MergeContext,
        accounts: &[RemoteAccount],
    ) -> Result<Vec<Account>, AppError> {
        let mut changes = db.begin_changes().await?;
        let mut cache = MergeCache::new();
        let mut merged = Vec::with_capacity(accounts.len());
        for remote in accounts {
            merged.push(
                Self::merge_account(&mut changes, ctx, &mut cache, remote)
                    .await?
                    .record,
            );
        }
        changes.commit().await?;
        Ok(merged)
    }

    /// Merge a batch of statuses in one transaction, skipping unmergeable
    /// items
    pub async fn ingest_statuses(
        db: &Database,
        ctx: &MergeContext,
        statuses: &[RemoteStatus],
    ) -> Result<Vec<Status>, AppError> {
        let mut changes = db.begin_changes().await?;
        let mut cache = MergeCache::new();
        let mut merged = Vec::with_capacity(statuses.len());
        for remote in statuses {
            if let Some(status) = Self::merge_status(&mut changes, ctx, &mut cache, remote).await? {
                merged.push(status.record);
            }
        }
        changes.commit().await?;

        tracing::debug!(
            domain = %ctx.domain,
            received = statuses.len(),
            merged = merged.len(),
            "Ingested statuses"
        );
        Ok(merged)
    }

    pub async fn ingest_relationships(
        db: &Database,
        ctx: &MergeContext,
        relationships: &[RemoteRelationship],
    ) -> Result<Vec<Relationship>, AppError> {
        let mut changes = db.begin_changes().await?;
        let mut cache = MergeCache::new();
        let mut merged = Vec::with_capacity(relationships.len());
        for remote in relationships {
            if let Some(relationship) =
                Self::merge_relationship(&mut changes, ctx, &mut cache, remote).await?
            {
                merged.push(relationship);
            }
        }
        changes.commit().await?;
        Ok(merged)
    }
}

/// The post that display, counts and mutations apply to: the reblog target,
/// or the status itself.
///
/// A reblog whose target is missing or soft-deleted resolves to itself.
pub async fn effective_status(changes: &mut Changes, status: Status) -> Result<Status, AppError> {
    let Some(target_id) = status.reblog_of_id.clone() else {
        return Ok(status);
    };
    match changes.status_by_id(&target_id).await? {
        Some(target) if !target.is_deleted() => Ok(target),
        _ => {
            tracing::debug!(id = %status.id, target = %target_id, "Reblog target unavailable");
            Ok(status)
        }
    }
}

// =============================================================================
// Payload conversion
// =============================================================================

fn account_from_remote(
    id: String,
    ctx: &MergeContext,
    remote: &RemoteAccount,
    now: DateTime<Utc>,
) -> Account {
    Account {
        id,
        domain: ctx.domain.clone(),
        remote_id: remote.id.clone(),
        username: remote.username.clone(),
        acct: remote.acct.clone(),
        display_name: remote.display_name.clone(),
        note: remote.note.clone(),
        url: remote.url.clone(),
        avatar: remote.avatar.clone(),
        avatar_static: remote.avatar_static.clone(),
        header: remote.header.clone(),
        header_static: remote.header_static.clone(),
        statuses_count: remote.statuses_count,
        following_count: remote.following_count,
        followers_count: remote.followers_count,
        locked: remote.locked,
        bot: remote.bot,
        suspended: remote.suspended,
        created_at: remote.created_at,
        updated_at: now,
        last_network_at: ctx.network_date,
    }
}

fn status_from_remote(
    id: String,
    ctx: &MergeContext,
    remote: &RemoteStatus,
    account_id: &str,
    reblog_of_id: Option<String>,
    now: DateTime<Utc>,
) -> Status {
    Status {
        id,
        domain: ctx.domain.clone(),
        remote_id: remote.id.clone(),
        uri: remote.uri.clone(),
        url: remote.url.clone(),
        account_id: account_id.to_string(),
        content: remote.content.clone(),
        spoiler_text: remote.spoiler_text.clone(),
        visibility: remote.visibility.clone(),
        sensitive: remote.sensitive,
        language: remote.language.clone(),
        in_reply_to_id: remote.in_reply_to_id.clone(),
        in_reply_to_account_id: remote.in_reply_to_account_id.clone(),
        reblog_of_id,
        application_name: remote.application.as_ref().map(|app| app.name.clone()),
        card: remote.card.as_ref().map(|card| card.to_string()),
        replies_count: remote.replies_count,
        reblogs_count: remote.reblogs_count,
        favourites_count: remote.favourites_count,
        created_at: remote.created_at,
        edited_at: remote.edited_at,
        deleted_at: None,
        updated_at: now,
        last_network_at: ctx.network_date,
    }
}

fn poll_from_remote(
    id: String,
    ctx: &MergeContext,
    remote: &RemotePoll,
    status_id: &str,
    now: DateTime<Utc>,
) -> Poll {
    Poll {
        id,
        domain: ctx.domain.clone(),
        remote_id: remote.id.clone(),
        status_id: status_id.to_string(),
        expires_at: remote.expires_at,
        expired: remote.expired,
        multiple: remote.multiple,
        votes_count: remote.votes_count,
        voters_count: remote.voters_count,
        updated_at: now,
        last_network_at: ctx.network_date,
    }
}
