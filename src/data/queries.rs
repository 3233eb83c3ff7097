//! Row lookups shared by the read side (pool) and write transactions.
//!
//! Every function takes any SQLite executor so the same query serves
//! concurrent readers and reads-your-writes inside a `Changes` transaction.

use sqlx::{Executor, Sqlite};

use super::models::*;
use crate::error::AppError;

pub(crate) async fn account_by_id<'e, E>(executor: E, id: &str) -> Result<Option<Account>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(account)
}

pub(crate) async fn account_by_key<'e, E>(
    executor: E,
    key: &EntityKey,
) -> Result<Option<Account>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let account =
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE domain = ? AND remote_id = ?")
            .bind(&key.domain)
            .bind(&key.remote_id)
            .fetch_optional(executor)
            .await?;

    Ok(account)
}

pub(crate) async fn status_by_id<'e, E>(executor: E, id: &str) -> Result<Option<Status>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let status = sqlx::query_as::<_, Status>("SELECT * FROM statuses WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(status)
}

pub(crate) async fn status_by_key<'e, E>(
    executor: E,
    key: &EntityKey,
) -> Result<Option<Status>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let status =
        sqlx::query_as::<_, Status>("SELECT * FROM statuses WHERE domain = ? AND remote_id = ?")
            .bind(&key.domain)
            .bind(&key.remote_id)
            .fetch_optional(executor)
            .await?;

    Ok(status)
}

pub(crate) async fn poll_by_id<'e, E>(executor: E, id: &str) -> Result<Option<Poll>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let poll = sqlx::query_as::<_, Poll>("SELECT * FROM polls WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(poll)
}

pub(crate) async fn poll_by_key<'e, E>(
    executor: E,
    key: &EntityKey,
) -> Result<Option<Poll>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let poll = sqlx::query_as::<_, Poll>("SELECT * FROM polls WHERE domain = ? AND remote_id = ?")
        .bind(&key.domain)
        .bind(&key.remote_id)
        .fetch_optional(executor)
        .await?;

    Ok(poll)
}

pub(crate) async fn poll_options<'e, E>(
    executor: E,
    poll_id: &str,
) -> Result<Vec<PollOption>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let options = sqlx::query_as::<_, PollOption>(
        "SELECT * FROM poll_options WHERE poll_id = ? ORDER BY option_index",
    )
    .bind(poll_id)
    .fetch_all(executor)
    .await?;

    Ok(options)
}

/// Option indices the actor is recorded as having voted for
pub(crate) async fn voted_option_indices<'e, E>(
    executor: E,
    poll_id: &str,
    actor_id: &str,
) -> Result<Vec<i64>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let indices = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT o.option_index FROM poll_votes v
        JOIN poll_options o ON o.id = v.option_id
        WHERE o.poll_id = ? AND v.actor_id = ?
        ORDER BY o.option_index
        "#,
    )
    .bind(poll_id)
    .bind(actor_id)
    .fetch_all(executor)
    .await?;

    Ok(indices)
}

pub(crate) async fn vote_confirmed<'e, E>(
    executor: E,
    poll_id: &str,
    actor_id: &str,
) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM poll_votes v
        JOIN poll_options o ON o.id = v.option_id
        WHERE o.poll_id = ? AND v.actor_id = ? AND v.confirmed = 1
        "#,
    )
    .bind(poll_id)
    .bind(actor_id)
    .fetch_one(executor)
    .await?;

    Ok(count > 0)
}

pub(crate) async fn notification_by_key<'e, E>(
    executor: E,
    owner_id: &str,
    key: &EntityKey,
) -> Result<Option<Notification>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let notification = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE domain = ? AND owner_id = ? AND remote_id = ?",
    )
    .bind(&key.domain)
    .bind(owner_id)
    .bind(&key.remote_id)
    .fetch_optional(executor)
    .await?;

    Ok(notification)
}

/// Edges between two accounts in either direction, as (source_id, kind)
pub(crate) async fn relationship_edges<'e, E>(
    executor: E,
    actor_id: &str,
    target_id: &str,
) -> Result<Vec<(String, String)>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let edges = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT source_id, kind FROM account_relationships
        WHERE (source_id = ? AND target_id = ?) OR (source_id = ? AND target_id = ?)
        "#,
    )
    .bind(actor_id)
    .bind(target_id)
    .bind(target_id)
    .bind(actor_id)
    .fetch_all(executor)
    .await?;

    Ok(edges)
}

pub(crate) async fn has_interaction<'e, E>(
    executor: E,
    status_id: &str,
    actor_id: &str,
    kind: InteractionKind,
) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM status_interactions WHERE status_id = ? AND actor_id = ? AND kind = ?",
    )
    .bind(status_id)
    .bind(actor_id)
    .bind(kind.as_str())
    .fetch_one(executor)
    .await?;

    Ok(count > 0)
}

pub(crate) async fn feed_slot<'e, E>(
    executor: E,
    owner_id: &str,
    kind: FeedKind,
) -> Result<Option<FeedSlot>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let slot = sqlx::query_as::<_, FeedSlot>("SELECT * FROM feeds WHERE owner_id = ? AND kind = ?")
        .bind(owner_id)
        .bind(kind.as_str())
        .fetch_optional(executor)
        .await?;

    Ok(slot)
}

pub(crate) async fn feed_entry<'e, E>(
    executor: E,
    feed_id: &str,
    target: &FeedTarget,
) -> Result<Option<FeedEntry>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = match target {
        FeedTarget::Status(_) => "SELECT * FROM feed_entries WHERE feed_id = ? AND status_id = ?",
        FeedTarget::Notification(_) => {
            "SELECT * FROM feed_entries WHERE feed_id = ? AND notification_id = ?"
        }
    };
    let entry = sqlx::query_as::<_, FeedEntry>(sql)
        .bind(feed_id)
        .bind(target.id())
        .fetch_optional(executor)
        .await?;

    Ok(entry)
}
