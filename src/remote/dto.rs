//! Remote entity payloads
//!
//! Shapes of the entities returned by a Mastodon-compatible server, as far
//! as the sync engine needs them. Unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAccount {
    pub id: String,
    pub username: String,
    pub acct: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub avatar_static: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub header_static: Option<String>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub suspended: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub statuses_count: i64,
    #[serde(default)]
    pub following_count: i64,
    #[serde(default)]
    pub followers_count: i64,
}

/// Client application that published a status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteApplication {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
}

/// Status payload
///
/// `favourited`, `reblogged`, `bookmarked`, `muted` and `pinned` are
/// reported from the perspective of the account that made the request and
/// are absent on anonymous fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStatus {
    pub id: String,
    pub uri: String,
    #[serde(default)]
    pub url: Option<String>,
    pub account: RemoteAccount,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub spoiler_text: String,
    pub visibility: String,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    #[serde(default)]
    pub in_reply_to_account_id: Option<String>,
    #[serde(default)]
    pub reblog: Option<Box<RemoteStatus>>,
    #[serde(default)]
    pub application: Option<RemoteApplication>,
    #[serde(default)]
    pub card: Option<serde_json::Value>,
    #[serde(default)]
    pub poll: Option<RemotePoll>,
    #[serde(default)]
    pub replies_count: i64,
    #[serde(default)]
    pub reblogs_count: i64,
    #[serde(default)]
    pub favourites_count: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub favourited: Option<bool>,
    #[serde(default)]
    pub reblogged: Option<bool>,
    #[serde(default)]
    pub bookmarked: Option<bool>,
    #[serde(default)]
    pub muted: Option<bool>,
    #[serde(default)]
    pub pinned: Option<bool>,
}

/// Poll option payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePollOption {
    pub title: String,
    /// Hidden until the poll closes on some servers
    #[serde(default)]
    pub votes_count: Option<i64>,
}

/// Poll payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePoll {
    pub id: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub votes_count: i64,
    #[serde(default)]
    pub voters_count: Option<i64>,
    pub options: Vec<RemotePollOption>,
    #[serde(default)]
    pub voted: Option<bool>,
    /// Indices of the options the requesting account voted for
    #[serde(default)]
    pub own_votes: Option<Vec<usize>>,
}

/// Notification payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteNotification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub account: RemoteAccount,
    #[serde(default)]
    pub status: Option<RemoteStatus>,
}

/// Relationship between the requesting account and `id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteRelationship {
    pub id: String,
    pub following: bool,
    pub showing_reblogs: bool,
    pub notifying: bool,
    pub followed_by: bool,
    pub blocking: bool,
    pub blocked_by: bool,
    pub muting: bool,
    pub muting_notifications: bool,
    pub requested: bool,
    pub domain_blocking: bool,
    pub endorsed: bool,
}
