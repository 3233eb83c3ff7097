//! Write transactions
//!
//! `Changes` is the only way to mutate the store. It holds the database's
//! write permit and one SQLite transaction; nothing it writes is visible to
//! readers until `commit`, and dropping it rolls everything back.

use std::time::Instant;

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tokio::sync::OwnedMutexGuard;

use super::changes::{ChangeFeed, ChangeSet};
use super::diff::{DiffFields, changed_fields, write_fields};
use super::models::*;
use super::queries;
use crate::error::AppError;

pub struct Changes {
    tx: Transaction<'static, Sqlite>,
    changes: ChangeSet,
    feed: ChangeFeed,
    started: Instant,
    _permit: OwnedMutexGuard<()>,
}

impl Changes {
    pub(crate) fn new(
        tx: Transaction<'static, Sqlite>,
        feed: ChangeFeed,
        permit: OwnedMutexGuard<()>,
    ) -> Self {
        Self {
            tx,
            changes: ChangeSet::default(),
            feed,
            started: Instant::now(),
            _permit: permit,
        }
    }

    fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// Records touched so far
    pub fn pending(&self) -> &ChangeSet {
        &self.changes
    }

    /// Commit and publish the change set
    pub async fn commit(self) -> Result<ChangeSet, AppError> {
        let Self {
            tx,
            changes,
            feed,
            started,
            _permit,
        } = self;

        tx.commit().await?;
        crate::metrics::observe_commit(started.elapsed());
        drop(_permit);

        feed.publish(changes.clone());
        Ok(changes)
    }

    /// Discard everything written in this transaction
    pub async fn rollback(self) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }

    // =========================================================================
    // Reads (see own writes)
    // =========================================================================

    pub async fn account_by_id(&mut self, id: &str) -> Result<Option<Account>, AppError> {
        queries::account_by_id(self.conn(), id).await
    }

    pub async fn account_by_key(&mut self, key: &EntityKey) -> Result<Option<Account>, AppError> {
        queries::account_by_key(self.conn(), key).await
    }

    pub async fn status_by_id(&mut self, id: &str) -> Result<Option<Status>, AppError> {
        queries::status_by_id(self.conn(), id).await
    }

    pub async fn status_by_key(&mut self, key: &EntityKey) -> Result<Option<Status>, AppError> {
        queries::status_by_key(self.conn(), key).await
    }

    pub async fn poll_by_id(&mut self, id: &str) -> Result<Option<Poll>, AppError> {
        queries::poll_by_id(self.conn(), id).await
    }

    pub async fn poll_by_key(&mut self, key: &EntityKey) -> Result<Option<Poll>, AppError> {
        queries::poll_by_key(self.conn(), key).await
    }

    pub async fn poll_options(&mut self, poll_id: &str) -> Result<Vec<PollOption>, AppError> {
        queries::poll_options(self.conn(), poll_id).await
    }

    pub async fn voted_option_indices(
        &mut self,
        poll_id: &str,
        actor_id: &str,
    ) -> Result<Vec<i64>, AppError> {
        queries::voted_option_indices(self.conn(), poll_id, actor_id).await
    }

    pub async fn vote_confirmed(&mut self, poll_id: &str, actor_id: &str) -> Result<bool, AppError> {
        queries::vote_confirmed(self.conn(), poll_id, actor_id).await
    }

    pub async fn notification_by_key(
        &mut self,
        owner_id: &str,
        key: &EntityKey,
    ) -> Result<Option<Notification>, AppError> {
        queries::notification_by_key(self.conn(), owner_id, key).await
    }

    pub async fn relationship(
        &mut self,
        actor_id: &str,
        target_id: &str,
    ) -> Result<Relationship, AppError> {
        let edges = queries::relationship_edges(self.conn(), actor_id, target_id).await?;
        Ok(fold_edges(actor_id, edges))
    }

    pub async fn has_interaction(
        &mut self,
        status_id: &str,
        actor_id: &str,
        kind: InteractionKind,
    ) -> Result<bool, AppError> {
        queries::has_interaction(self.conn(), status_id, actor_id, kind).await
    }

    pub async fn feed_slot(
        &mut self,
        owner_id: &str,
        kind: FeedKind,
    ) -> Result<Option<FeedSlot>, AppError> {
        queries::feed_slot(self.conn(), owner_id, kind).await
    }

    pub async fn feed_entry(
        &mut self,
        feed_id: &str,
        target: &FeedTarget,
    ) -> Result<Option<FeedEntry>, AppError> {
        queries::feed_entry(self.conn(), feed_id, target).await
    }

    // =========================================================================
    // Inserts
    // =========================================================================

    pub async fn insert_account(&mut self, account: &Account) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, domain, remote_id, username, acct, display_name, note, url,
                avatar, avatar_static, header, header_static,
                statuses_count, following_count, followers_count,
                locked, bot, suspended, created_at, updated_at, last_network_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.domain)
        .bind(&account.remote_id)
        .bind(&account.username)
        .bind(&account.acct)
        .bind(&account.display_name)
        .bind(&account.note)
        .bind(&account.url)
        .bind(&account.avatar)
        .bind(&account.avatar_static)
        .bind(&account.header)
        .bind(&account.header_static)
        .bind(account.statuses_count)
        .bind(account.following_count)
        .bind(account.followers_count)
        .bind(account.locked)
        .bind(account.bot)
        .bind(account.suspended)
        .bind(account.created_at)
        .bind(account.updated_at)
        .bind(account.last_network_at)
        .execute(self.conn())
        .await?;

        self.changes.record_inserted(EntityKind::Account, &account.id);
        Ok(())
    }

    pub async fn insert_status(&mut self, status: &Status) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO statuses (
                id, domain, remote_id, uri, url, account_id, content, spoiler_text,
                visibility, sensitive, language, in_reply_to_id, in_reply_to_account_id,
                reblog_of_id, application_name, card, replies_count, reblogs_count,
                favourites_count, created_at, edited_at, deleted_at, updated_at,
                last_network_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&status.id)
        .bind(&status.domain)
        .bind(&status.remote_id)
        .bind(&status.uri)
        .bind(&status.url)
        .bind(&status.account_id)
        .bind(&status.content)
        .bind(&status.spoiler_text)
        .bind(&status.visibility)
        .bind(status.sensitive)
        .bind(&status.language)
        .bind(&status.in_reply_to_id)
        .bind(&status.in_reply_to_account_id)
        .bind(&status.reblog_of_id)
        .bind(&status.application_name)
        .bind(&status.card)
        .bind(status.replies_count)
        .bind(status.reblogs_count)
        .bind(status.favourites_count)
        .bind(status.created_at)
        .bind(status.edited_at)
        .bind(status.deleted_at)
        .bind(status.updated_at)
        .bind(status.last_network_at)
        .execute(self.conn())
        .await?;

        self.changes.record_inserted(EntityKind::Status, &status.id);
        Ok(())
    }

    pub async fn insert_poll(&mut self, poll: &Poll) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO polls (
                id, domain, remote_id, status_id, expires_at, expired, multiple,
                votes_count, voters_count, updated_at, last_network_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&poll.id)
        .bind(&poll.domain)
        .bind(&poll.remote_id)
        .bind(&poll.status_id)
        .bind(poll.expires_at)
        .bind(poll.expired)
        .bind(poll.multiple)
        .bind(poll.votes_count)
        .bind(poll.voters_count)
        .bind(poll.updated_at)
        .bind(poll.last_network_at)
        .execute(self.conn())
        .await?;

        self.changes.record_inserted(EntityKind::Poll, &poll.id);
        Ok(())
    }

    pub async fn insert_poll_option(&mut self, option: &PollOption) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO poll_options (id, poll_id, option_index, title, votes_count, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&option.id)
        .bind(&option.poll_id)
        .bind(option.option_index)
        .bind(&option.title)
        .bind(option.votes_count)
        .bind(option.updated_at)
        .execute(self.conn())
        .await?;

        self.changes
            .record_inserted(EntityKind::PollOption, &option.id);
        Ok(())
    }

    pub async fn insert_notification(
        &mut self,
        notification: &Notification,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, domain, owner_id, remote_id, kind, account_id, status_id,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.domain)
        .bind(&notification.owner_id)
        .bind(&notification.remote_id)
        .bind(&notification.kind)
        .bind(&notification.account_id)
        .bind(&notification.status_id)
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .execute(self.conn())
        .await?;

        self.changes
            .record_inserted(EntityKind::Notification, &notification.id);
        Ok(())
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Write the columns of `incoming` that differ from `current`.
    ///
    /// Returns false, and writes nothing, when every column is equal. The
    /// network date is only advanced together with a real change.
    pub(crate) async fn update_record<T: DiffFields>(
        &mut self,
        kind: EntityKind,
        current: &T,
        incoming: &T,
        touched_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut fields = changed_fields(current, incoming);
        if fields.is_empty() {
            return Ok(false);
        }
        fields.extend(incoming.network_date_field());

        tracing::trace!(
            table = T::TABLE,
            id = current.row_id(),
            columns = ?fields.iter().map(|(column, _)| *column).collect::<Vec<_>>(),
            "Updating changed columns"
        );
        let updated =
            write_fields(self.conn(), T::TABLE, current.row_id(), fields, touched_at).await?;
        if updated {
            self.changes.record_updated(kind, current.row_id());
        }
        Ok(updated)
    }

    /// Add or remove one directional relationship edge.
    ///
    /// Returns whether membership changed.
    pub async fn set_relationship(
        &mut self,
        kind: RelationshipKind,
        source_id: &str,
        target_id: &str,
        is_set: bool,
    ) -> Result<bool, AppError> {
        let result = if is_set {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO account_relationships (source_id, kind, target_id, created_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(source_id)
            .bind(kind.as_str())
            .bind(target_id)
            .bind(Utc::now())
            .execute(self.conn())
            .await?
        } else {
            sqlx::query(
                "DELETE FROM account_relationships WHERE source_id = ? AND kind = ? AND target_id = ?",
            )
            .bind(source_id)
            .bind(kind.as_str())
            .bind(target_id)
            .execute(self.conn())
            .await?
        };

        let changed = result.rows_affected() > 0;
        if changed {
            self.changes.record_updated(
                EntityKind::Relationship,
                &format!("{source_id}:{target_id}"),
            );
        }
        Ok(changed)
    }

    /// Add or remove the actor from a status's per-actor set.
    pub async fn set_interaction(
        &mut self,
        status_id: &str,
        actor_id: &str,
        kind: InteractionKind,
        is_set: bool,
    ) -> Result<bool, AppError> {
        let result = if is_set {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO status_interactions (status_id, actor_id, kind, created_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(status_id)
            .bind(actor_id)
            .bind(kind.as_str())
            .bind(Utc::now())
            .execute(self.conn())
            .await?
        } else {
            sqlx::query(
                "DELETE FROM status_interactions WHERE status_id = ? AND actor_id = ? AND kind = ?",
            )
            .bind(status_id)
            .bind(actor_id)
            .bind(kind.as_str())
            .execute(self.conn())
            .await?
        };

        let changed = result.rows_affected() > 0;
        if changed {
            let row_id = format!("{status_id}:{actor_id}:{}", kind.as_str());
            if is_set {
                self.changes
                    .record_inserted(EntityKind::StatusInteraction, &row_id);
            } else {
                self.changes
                    .record_deleted(EntityKind::StatusInteraction, &row_id);
            }
            // The status renders the actor's flags
            self.changes.record_updated(EntityKind::Status, status_id);
        }
        Ok(changed)
    }

    /// Add `delta` to a status counter, never going below zero.
    ///
    /// Returns the new value.
    pub async fn adjust_status_counter(
        &mut self,
        status_id: &str,
        counter: StatusCounter,
        delta: i64,
    ) -> Result<i64, AppError> {
        let column = counter.column();
        let value: Option<i64> = sqlx::query_scalar(&format!(
            "UPDATE statuses SET {column} = MAX({column} + ?, 0), updated_at = ? WHERE id = ? RETURNING {column}"
        ))
        .bind(delta)
        .bind(Utc::now())
        .bind(status_id)
        .fetch_optional(self.conn())
        .await?;

        let value = value.ok_or(AppError::NotFound)?;
        self.changes.record_updated(EntityKind::Status, status_id);
        Ok(value)
    }

    /// Set a status counter to an exact value (rollback path).
    pub async fn set_status_counter(
        &mut self,
        status_id: &str,
        counter: StatusCounter,
        value: i64,
    ) -> Result<(), AppError> {
        let column = counter.column();
        let result = sqlx::query(&format!(
            "UPDATE statuses SET {column} = ?, updated_at = ? WHERE id = ? AND {column} != ?"
        ))
        .bind(value.max(0))
        .bind(Utc::now())
        .bind(status_id)
        .bind(value.max(0))
        .execute(self.conn())
        .await?;

        if result.rows_affected() > 0 {
            self.changes.record_updated(EntityKind::Status, status_id);
        }
        Ok(())
    }

    /// Mark a status deleted without removing the row
    pub async fn soft_delete_status(
        &mut self,
        status_id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE statuses SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(deleted_at)
        .bind(Utc::now())
        .bind(status_id)
        .execute(self.conn())
        .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.changes.record_updated(EntityKind::Status, status_id);
        }
        Ok(deleted)
    }

    /// Add or remove the actor from an option's votedBy set.
    ///
    /// `confirmed` marks a vote the server reported back; a local cast
    /// passes `false`. Re-adding an existing vote only updates the flag.
    pub async fn set_poll_vote(
        &mut self,
        option_id: &str,
        actor_id: &str,
        is_set: bool,
        confirmed: bool,
    ) -> Result<bool, AppError> {
        let result = if is_set {
            sqlx::query(
                r#"
                INSERT INTO poll_votes (option_id, actor_id, confirmed, created_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (option_id, actor_id) DO UPDATE SET confirmed = excluded.confirmed
                WHERE poll_votes.confirmed != excluded.confirmed
                "#,
            )
            .bind(option_id)
            .bind(actor_id)
            .bind(confirmed)
            .bind(Utc::now())
            .execute(self.conn())
            .await?
        } else {
            sqlx::query("DELETE FROM poll_votes WHERE option_id = ? AND actor_id = ?")
                .bind(option_id)
                .bind(actor_id)
                .execute(self.conn())
                .await?
        };

        let changed = result.rows_affected() > 0;
        if changed {
            self.changes.record_updated(EntityKind::PollOption, option_id);
        }
        Ok(changed)
    }

    /// Bump `updated_at` on a poll and all of its options, nothing else.
    pub async fn touch_poll(&mut self, poll_id: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE polls SET updated_at = ? WHERE id = ?")
            .bind(at)
            .bind(poll_id)
            .execute(self.conn())
            .await?;
        let option_ids = sqlx::query_scalar::<_, String>(
            "UPDATE poll_options SET updated_at = ? WHERE poll_id = ? RETURNING id",
        )
        .bind(at)
        .bind(poll_id)
        .fetch_all(self.conn())
        .await?;

        self.changes.record_updated(EntityKind::Poll, poll_id);
        for option_id in option_ids {
            self.changes
                .record_updated(EntityKind::PollOption, &option_id);
        }
        Ok(())
    }

    pub async fn mark_poll_expired(&mut self, poll_id: &str) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE polls SET expired = 1, updated_at = ? WHERE id = ? AND expired = 0")
                .bind(Utc::now())
                .bind(poll_id)
                .execute(self.conn())
                .await?;

        let changed = result.rows_affected() > 0;
        if changed {
            self.changes.record_updated(EntityKind::Poll, poll_id);
        }
        Ok(changed)
    }

    // =========================================================================
    // Feeds
    // =========================================================================

    /// The single slot for (owner, kind), created on first use
    pub async fn get_or_create_feed(
        &mut self,
        owner_id: &str,
        kind: FeedKind,
        at: DateTime<Utc>,
    ) -> Result<FeedSlot, AppError> {
        if let Some(slot) = self.feed_slot(owner_id, kind).await? {
            return Ok(slot);
        }

        let slot = FeedSlot {
            id: EntityId::new().0,
            owner_id: owner_id.to_string(),
            kind: kind.as_str().to_string(),
            has_more: false,
            updated_at: at,
        };
        sqlx::query("INSERT INTO feeds (id, owner_id, kind, has_more, updated_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&slot.id)
            .bind(&slot.owner_id)
            .bind(&slot.kind)
            .bind(slot.has_more)
            .bind(slot.updated_at)
            .execute(self.conn())
            .await?;

        self.changes.record_inserted(EntityKind::Feed, &slot.id);
        Ok(slot)
    }

    /// Attach a record to a feed slot.
    ///
    /// Returns the entry and whether it was newly created. Re-attaching only
    /// advances the entry's `updated_at`.
    pub async fn attach_feed_entry(
        &mut self,
        feed_id: &str,
        target: &FeedTarget,
        at: DateTime<Utc>,
    ) -> Result<(FeedEntry, bool), AppError> {
        if let Some(mut entry) = self.feed_entry(feed_id, target).await? {
            sqlx::query("UPDATE feed_entries SET updated_at = ? WHERE id = ?")
                .bind(at)
                .bind(&entry.id)
                .execute(self.conn())
                .await?;
            entry.updated_at = at;
            self.changes.record_updated(EntityKind::FeedEntry, &entry.id);
            return Ok((entry, false));
        }

        let (status_id, notification_id) = match target {
            FeedTarget::Status(id) => (Some(id.clone()), None),
            FeedTarget::Notification(id) => (None, Some(id.clone())),
        };
        let entry = FeedEntry {
            id: EntityId::new().0,
            feed_id: feed_id.to_string(),
            status_id,
            notification_id,
            has_more: false,
            attached_at: at,
            updated_at: at,
        };
        sqlx::query(
            r#"
            INSERT INTO feed_entries (id, feed_id, status_id, notification_id, has_more, attached_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.feed_id)
        .bind(&entry.status_id)
        .bind(&entry.notification_id)
        .bind(entry.has_more)
        .bind(entry.attached_at)
        .bind(entry.updated_at)
        .execute(self.conn())
        .await?;

        self.changes.record_inserted(EntityKind::FeedEntry, &entry.id);
        Ok((entry, true))
    }

    pub async fn set_feed_entry_has_more(
        &mut self,
        entry_id: &str,
        has_more: bool,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE feed_entries SET has_more = ? WHERE id = ? AND has_more != ?")
                .bind(has_more)
                .bind(entry_id)
                .bind(has_more)
                .execute(self.conn())
                .await?;

        let changed = result.rows_affected() > 0;
        if changed {
            self.changes.record_updated(EntityKind::FeedEntry, entry_id);
        }
        Ok(changed)
    }

    /// Recompute the slot's `has_more` from its oldest entry and bump
    /// `updated_at`.
    pub async fn refresh_feed_slot(
        &mut self,
        slot: &FeedSlot,
        at: DateTime<Utc>,
    ) -> Result<FeedSlot, AppError> {
        let oldest_has_more: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT e.has_more FROM feed_entries e
            LEFT JOIN statuses s ON s.id = e.status_id
            LEFT JOIN notifications n ON n.id = e.notification_id
            WHERE e.feed_id = ?
            ORDER BY COALESCE(s.created_at, n.created_at) ASC
            LIMIT 1
            "#,
        )
        .bind(&slot.id)
        .fetch_optional(self.conn())
        .await?;
        let has_more = oldest_has_more.unwrap_or(false);

        sqlx::query("UPDATE feeds SET has_more = ?, updated_at = ? WHERE id = ?")
            .bind(has_more)
            .bind(at)
            .bind(&slot.id)
            .execute(self.conn())
            .await?;

        self.changes.record_updated(EntityKind::Feed, &slot.id);
        Ok(FeedSlot {
            has_more,
            updated_at: at,
            ..slot.clone()
        })
    }

    // =========================================================================
    // Domain blocks
    // =========================================================================

    /// Replace the owner's whole domain-block list.
    ///
    /// Only rows that actually differ are deleted or inserted.
    pub async fn replace_domain_blocks(
        &mut self,
        domain: &str,
        owner_id: &str,
        blocked_domains: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let previous = sqlx::query_scalar::<_, String>(
            "SELECT blocked_domain FROM domain_blocks WHERE domain = ? AND owner_id = ?",
        )
        .bind(domain)
        .bind(owner_id)
        .fetch_all(self.conn())
        .await?;

        for blocked in previous.iter().filter(|d| !blocked_domains.contains(d)) {
            sqlx::query(
                "DELETE FROM domain_blocks WHERE domain = ? AND owner_id = ? AND blocked_domain = ?",
            )
            .bind(domain)
            .bind(owner_id)
            .bind(blocked)
            .execute(self.conn())
            .await?;
            self.changes
                .record_deleted(EntityKind::DomainBlock, &domain_block_ref(owner_id, blocked));
        }

        for blocked in blocked_domains {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO domain_blocks (domain, owner_id, blocked_domain, created_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(domain)
            .bind(owner_id)
            .bind(blocked)
            .bind(at)
            .execute(self.conn())
            .await?;
            if result.rows_affected() > 0 {
                self.changes
                    .record_inserted(EntityKind::DomainBlock, &domain_block_ref(owner_id, blocked));
            }
        }

        Ok(())
    }
}

fn domain_block_ref(owner_id: &str, blocked_domain: &str) -> String {
    format!("{owner_id}:{blocked_domain}")
}

/// Fold stored edges into the actor's view of the relationship
pub(crate) fn fold_edges(actor_id: &str, edges: Vec<(String, String)>) -> Relationship {
    let mut relationship = Relationship::default();
    for (source_id, kind) in edges {
        match RelationshipKind::parse(&kind) {
            Some(kind) => relationship.apply_edge(kind, source_id == actor_id),
            None => tracing::warn!(%kind, "Ignoring unknown relationship kind"),
        }
    }
    relationship
}
