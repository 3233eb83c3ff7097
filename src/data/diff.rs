//! Field-level diffing for in-place updates
//!
//! Each mergeable record lists its writable columns once. An update
//! compares the stored record with the proposed one and writes only the
//! columns whose values differ, so identical payloads produce no write and
//! no change notification.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::models::{Account, Notification, Poll, PollOption, Status};
use crate::error::AppError;

/// A column value as bound into SQLite
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldValue {
    Text(Option<String>),
    Int(Option<i64>),
    Bool(bool),
    Time(Option<DateTime<Utc>>),
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        Self::Text(Some(value.clone()))
    }
}

impl From<&Option<String>> for FieldValue {
    fn from(value: &Option<String>) -> Self {
        Self::Text(value.clone())
    }
}

impl From<&i64> for FieldValue {
    fn from(value: &i64) -> Self {
        Self::Int(Some(*value))
    }
}

impl From<&Option<i64>> for FieldValue {
    fn from(value: &Option<i64>) -> Self {
        Self::Int(*value)
    }
}

impl From<&bool> for FieldValue {
    fn from(value: &bool) -> Self {
        Self::Bool(*value)
    }
}

impl From<&DateTime<Utc>> for FieldValue {
    fn from(value: &DateTime<Utc>) -> Self {
        Self::Time(Some(*value))
    }
}

impl From<&Option<DateTime<Utc>>> for FieldValue {
    fn from(value: &Option<DateTime<Utc>>) -> Self {
        Self::Time(*value)
    }
}

type Fields = Vec<(&'static str, FieldValue)>;

/// A record whose mergeable columns can be diffed and written
pub(crate) trait DiffFields {
    const TABLE: &'static str;

    fn row_id(&self) -> &str;

    /// Columns merged from remote payloads. Identity columns, local
    /// bookkeeping (`updated_at`, `last_network_at`) and soft-delete markers
    /// are excluded.
    fn fields(&self) -> Fields;

    /// Network date column written along with any changed field
    fn network_date_field(&self) -> Option<(&'static str, FieldValue)> {
        None
    }
}

/// Columns of `incoming` that differ from `current`
pub(crate) fn changed_fields<T: DiffFields>(current: &T, incoming: &T) -> Fields {
    current
        .fields()
        .into_iter()
        .zip(incoming.fields())
        .filter(|((_, old), (_, new))| old != new)
        .map(|(_, changed)| changed)
        .collect()
}

/// Write the given columns of one row. Returns false when nothing changed.
pub(crate) async fn write_fields(
    conn: &mut SqliteConnection,
    table: &'static str,
    id: &str,
    fields: Fields,
    touched_at: DateTime<Utc>,
) -> Result<bool, AppError> {
    if fields.is_empty() {
        return Ok(false);
    }

    let mut builder = QueryBuilder::<Sqlite>::new(format!("UPDATE {table} SET "));
    {
        let mut assignments = builder.separated(", ");
        for (column, value) in fields {
            assignments.push(format!("{column} = "));
            match value {
                FieldValue::Text(value) => assignments.push_bind_unseparated(value),
                FieldValue::Int(value) => assignments.push_bind_unseparated(value),
                FieldValue::Bool(value) => assignments.push_bind_unseparated(value),
                FieldValue::Time(value) => assignments.push_bind_unseparated(value),
            };
        }
        assignments.push("updated_at = ");
        assignments.push_bind_unseparated(touched_at);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id.to_string());

    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected() == 1)
}

impl DiffFields for Account {
    const TABLE: &'static str = "accounts";

    fn row_id(&self) -> &str {
        &self.id
    }

    fn network_date_field(&self) -> Option<(&'static str, FieldValue)> {
        Some(("last_network_at", (&self.last_network_at).into()))
    }

    fn fields(&self) -> Fields {
        vec![
            ("username", (&self.username).into()),
            ("acct", (&self.acct).into()),
            ("display_name", (&self.display_name).into()),
            ("note", (&self.note).into()),
            ("url", (&self.url).into()),
            ("avatar", (&self.avatar).into()),
            ("avatar_static", (&self.avatar_static).into()),
            ("header", (&self.header).into()),
            ("header_static", (&self.header_static).into()),
            ("statuses_count", (&self.statuses_count).into()),
            ("following_count", (&self.following_count).into()),
            ("followers_count", (&self.followers_count).into()),
            ("locked", (&self.locked).into()),
            ("bot", (&self.bot).into()),
            ("suspended", (&self.suspended).into()),
            ("created_at", (&self.created_at).into()),
        ]
    }
}

impl DiffFields for Status {
    const TABLE: &'static str = "statuses";

    fn row_id(&self) -> &str {
        &self.id
    }

    fn network_date_field(&self) -> Option<(&'static str, FieldValue)> {
        Some(("last_network_at", (&self.last_network_at).into()))
    }

    fn fields(&self) -> Fields {
        vec![
            ("uri", (&self.uri).into()),
            ("url", (&self.url).into()),
            ("account_id", (&self.account_id).into()),
            ("content", (&self.content).into()),
            ("spoiler_text", (&self.spoiler_text).into()),
            ("visibility", (&self.visibility).into()),
            ("sensitive", (&self.sensitive).into()),
            ("language", (&self.language).into()),
            ("in_reply_to_id", (&self.in_reply_to_id).into()),
            ("in_reply_to_account_id", (&self.in_reply_to_account_id).into()),
            ("reblog_of_id", (&self.reblog_of_id).into()),
            ("application_name", (&self.application_name).into()),
            ("card", (&self.card).into()),
            ("replies_count", (&self.replies_count).into()),
            ("reblogs_count", (&self.reblogs_count).into()),
            ("favourites_count", (&self.favourites_count).into()),
            ("created_at", (&self.created_at).into()),
            ("edited_at", (&self.edited_at).into()),
        ]
    }
}

impl DiffFields for Poll {
    const TABLE: &'static str = "polls";

    fn row_id(&self) -> &str {
        &self.id
    }

    fn network_date_field(&self) -> Option<(&'static str, FieldValue)> {
        Some(("last_network_at", (&self.last_network_at).into()))
    }

    fn fields(&self) -> Fields {
        vec![
            ("expires_at", (&self.expires_at).into()),
            ("expired", (&self.expired).into()),
            ("multiple", (&self.multiple).into()),
            ("votes_count", (&self.votes_count).into()),
            ("voters_count", (&self.voters_count).into()),
        ]
    }
}

impl DiffFields for PollOption {
    const TABLE: &'static str = "poll_options";

    fn row_id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> Fields {
        vec![
            ("title", (&self.title).into()),
            ("votes_count", (&self.votes_count).into()),
        ]
    }
}

impl DiffFields for Notification {
    const TABLE: &'static str = "notifications";

    fn row_id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> Fields {
        vec![
            ("kind", (&self.kind).into()),
            ("account_id", (&self.account_id).into()),
            ("status_id", (&self.status_id).into()),
            ("created_at", (&self.created_at).into()),
        ]
    }
}
