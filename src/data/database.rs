//! SQLite database operations
//!
//! Reads go straight to the pool and run concurrently. Writes go through
//! [`Database::begin_changes`], which queues behind the single write permit
//! so write transactions apply one at a time in FIFO order.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Sqlite};
use tokio::sync::{Mutex, broadcast};

use super::changes::{ChangeFeed, ChangeSet};
use super::models::*;
use super::queries;
use super::transaction::{Changes, fold_edges};
use crate::error::AppError;

/// Pool and queue settings
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub busy_timeout: Duration,
    /// Buffered change sets per subscriber before it starts lagging
    pub change_feed_capacity: usize,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 8,
            busy_timeout: Duration::from_secs(5),
            change_feed_capacity: 256,
        }
    }
}

/// Sort order for [`StatusQuery`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Predicate, sort and limit for status reads
///
/// Soft-deleted statuses are excluded unless `include_deleted` is set.
#[derive(Debug, Clone, Default)]
pub struct StatusQuery {
    pub domain: Option<String>,
    pub account_id: Option<String>,
    pub reblog_of_id: Option<String>,
    pub include_deleted: bool,
    pub order: StatusOrder,
    pub limit: Option<i64>,
}

impl StatusQuery {
    pub fn by_account(account_id: impl Into<String>) -> Self {
        Self {
            account_id: Some(account_id.into()),
            ..Self::default()
        }
    }

    pub fn reblogs_of(status_id: impl Into<String>) -> Self {
        Self {
            reblog_of_id: Some(status_id.into()),
            ..Self::default()
        }
    }

    pub fn in_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn order(mut self, order: StatusOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(sqlx::FromRow)]
struct FeedStatusRow {
    #[sqlx(flatten)]
    status: Status,
    entry_has_more: bool,
}

#[derive(sqlx::FromRow)]
struct FeedNotificationRow {
    #[sqlx(flatten)]
    notification: Notification,
    entry_has_more: bool,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    write_permit: Arc<Mutex<()>>,
    change_feed: ChangeFeed,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database with default options
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        Self::connect_with_options(path, DatabaseOptions::default()).await
    }

    pub async fn connect_with_options(
        path: &Path,
        options: DatabaseOptions,
    ) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(options.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .connect_with(connect_options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            AppError::Migration(e)
        })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self {
            pool,
            write_permit: Arc::new(Mutex::new(())),
            change_feed: ChangeFeed::new(options.change_feed_capacity),
        })
    }

    /// Open a write transaction.
    ///
    /// Waits for the write permit; callers are served in arrival order.
    pub async fn begin_changes(&self) -> Result<Changes, AppError> {
        let permit = self.write_permit.clone().lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(Changes::new(tx, self.change_feed.clone(), permit))
    }

    /// Receiver for committed change sets
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.change_feed.subscribe()
    }

    pub fn change_stream(&self) -> impl Stream<Item = ChangeSet> + Send + 'static {
        self.change_feed.stream()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    pub async fn account(&self, id: &str) -> Result<Option<Account>, AppError> {
        queries::account_by_id(&self.pool, id).await
    }

    pub async fn account_by_key(&self, key: &EntityKey) -> Result<Option<Account>, AppError> {
        queries::account_by_key(&self.pool, key).await
    }

    /// Relationship between two accounts as seen by `actor_id`
    pub async fn relationship(
        &self,
        actor_id: &str,
        target_id: &str,
    ) -> Result<Relationship, AppError> {
        let edges = queries::relationship_edges(&self.pool, actor_id, target_id).await?;
        Ok(fold_edges(actor_id, edges))
    }

    // =========================================================================
    // Statuses
    // =========================================================================

    /// Get status by ID, soft-deleted or not
    pub async fn status(&self, id: &str) -> Result<Option<Status>, AppError> {
        queries::status_by_id(&self.pool, id).await
    }

    pub async fn status_by_key(&self, key: &EntityKey) -> Result<Option<Status>, AppError> {
        queries::status_by_key(&self.pool, key).await
    }

    pub async fn statuses(&self, query: &StatusQuery) -> Result<Vec<Status>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM statuses WHERE 1 = 1");

        if !query.include_deleted {
            builder.push(" AND deleted_at IS NULL");
        }
        if let Some(domain) = &query.domain {
            builder.push(" AND domain = ").push_bind(domain);
        }
        if let Some(account_id) = &query.account_id {
            builder.push(" AND account_id = ").push_bind(account_id);
        }
        if let Some(reblog_of_id) = &query.reblog_of_id {
            builder.push(" AND reblog_of_id = ").push_bind(reblog_of_id);
        }

        builder.push(match query.order {
            StatusOrder::NewestFirst => " ORDER BY created_at DESC, id DESC",
            StatusOrder::OldestFirst => " ORDER BY created_at ASC, id ASC",
        });
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let statuses = builder
            .build_query_as::<Status>()
            .fetch_all(&self.pool)
            .await?;
        Ok(statuses)
    }

    /// Per-actor flags the actor holds on a status
    pub async fn status_interactions(
        &self,
        status_id: &str,
        actor_id: &str,
    ) -> Result<HashSet<InteractionKind>, AppError> {
        let kinds = sqlx::query_scalar::<_, String>(
            "SELECT kind FROM status_interactions WHERE status_id = ? AND actor_id = ?",
        )
        .bind(status_id)
        .bind(actor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(kinds
            .iter()
            .filter_map(|kind| InteractionKind::parse(kind))
            .collect())
    }

    // =========================================================================
    // Polls
    // =========================================================================

    pub async fn poll(&self, id: &str) -> Result<Option<Poll>, AppError> {
        queries::poll_by_id(&self.pool, id).await
    }

    pub async fn poll_by_key(&self, key: &EntityKey) -> Result<Option<Poll>, AppError> {
        queries::poll_by_key(&self.pool, key).await
    }

    pub async fn poll_for_status(&self, status_id: &str) -> Result<Option<Poll>, AppError> {
        let poll = sqlx::query_as::<_, Poll>("SELECT * FROM polls WHERE status_id = ?")
            .bind(status_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(poll)
    }

    /// Options ordered by index
    pub async fn poll_options(&self, poll_id: &str) -> Result<Vec<PollOption>, AppError> {
        queries::poll_options(&self.pool, poll_id).await
    }

    pub async fn voted_options(
        &self,
        poll_id: &str,
        actor_id: &str,
    ) -> Result<Vec<i64>, AppError> {
        queries::voted_option_indices(&self.pool, poll_id, actor_id).await
    }

    /// Whether the server has reported the actor's vote on this poll
    pub async fn vote_confirmed(&self, poll_id: &str, actor_id: &str) -> Result<bool, AppError> {
        queries::vote_confirmed(&self.pool, poll_id, actor_id).await
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub async fn notification(&self, id: &str) -> Result<Option<Notification>, AppError> {
        let notification =
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(notification)
    }

    pub async fn notification_by_key(
        &self,
        owner_id: &str,
        key: &EntityKey,
    ) -> Result<Option<Notification>, AppError> {
        queries::notification_by_key(&self.pool, owner_id, key).await
    }

    // =========================================================================
    // Feeds
    // =========================================================================

    pub async fn feed_slot(
        &self,
        owner_id: &str,
        kind: FeedKind,
    ) -> Result<Option<FeedSlot>, AppError> {
        queries::feed_slot(&self.pool, owner_id, kind).await
    }

    /// Statuses attached to a feed, newest first, without soft-deleted ones
    pub async fn feed_statuses(
        &self,
        owner_id: &str,
        kind: FeedKind,
        limit: i64,
    ) -> Result<Vec<FeedStatus>, AppError> {
        let rows = sqlx::query_as::<_, FeedStatusRow>(
            r#"
            SELECT s.*, e.has_more AS entry_has_more
            FROM feed_entries e
            JOIN feeds f ON f.id = e.feed_id
            JOIN statuses s ON s.id = e.status_id
            WHERE f.owner_id = ? AND f.kind = ? AND s.deleted_at IS NULL
            ORDER BY s.created_at DESC, s.id DESC
            LIMIT ?
            "#,
        )
        .bind(owner_id)
        .bind(kind.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FeedStatus {
                status: row.status,
                has_more: row.entry_has_more,
            })
            .collect())
    }

    /// Notifications attached to a feed, newest first
    pub async fn feed_notifications(
        &self,
        owner_id: &str,
        kind: FeedKind,
        limit: i64,
    ) -> Result<Vec<FeedNotification>, AppError> {
        let rows = sqlx::query_as::<_, FeedNotificationRow>(
            r#"
            SELECT n.*, e.has_more AS entry_has_more
            FROM feed_entries e
            JOIN feeds f ON f.id = e.feed_id
            JOIN notifications n ON n.id = e.notification_id
            WHERE f.owner_id = ? AND f.kind = ?
            ORDER BY n.created_at DESC, n.id DESC
            LIMIT ?
            "#,
        )
        .bind(owner_id)
        .bind(kind.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FeedNotification {
                notification: row.notification,
                has_more: row.entry_has_more,
            })
            .collect())
    }

    // =========================================================================
    // Domain blocks
    // =========================================================================

    /// Blocked domains for the owner, sorted
    pub async fn domain_blocks(
        &self,
        domain: &str,
        owner_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let domains = sqlx::query_scalar::<_, String>(
            r#"
            SELECT blocked_domain FROM domain_blocks
            WHERE domain = ? AND owner_id = ?
            ORDER BY blocked_domain
            "#,
        )
        .bind(domain)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(domains)
    }
}
