//! Data models
//!
//! Rust structs representing stored entities.
//! Local ids are ULIDs; every remote entity is also addressable by its
//! `(domain, remote_id)` key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of a remote entity: the server it lives on and its id there
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub domain: String,
    pub remote_id: String,
}

impl EntityKey {
    pub fn new(domain: impl Into<String>, remote_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            remote_id: remote_id.into(),
        }
    }
}

/// Kinds of stored records, used to tag change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Account,
    Relationship,
    Status,
    StatusInteraction,
    Poll,
    PollOption,
    Notification,
    Feed,
    FeedEntry,
    DomainBlock,
}

// =============================================================================
// Account
// =============================================================================

/// A remote account as last seen from its server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    pub domain: String,
    pub remote_id: String,
    pub username: String,
    /// `user` for local accounts, `user@host` for remote ones
    pub acct: String,
    pub display_name: String,
    /// Bio (HTML)
    pub note: String,
    pub url: Option<String>,
    pub avatar: Option<String>,
    pub avatar_static: Option<String>,
    pub header: Option<String>,
    pub header_static: Option<String>,
    pub statuses_count: i64,
    pub following_count: i64,
    pub followers_count: i64,
    /// Follow requests need approval
    pub locked: bool,
    pub bot: bool,
    pub suspended: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_network_at: DateTime<Utc>,
}

impl Account {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(&self.domain, &self.remote_id)
    }
}

/// Directional relationship kinds, stored as `source --kind--> target`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    Following,
    /// Follow request sent, awaiting approval
    FollowRequested,
    Muting,
    /// Mute that also hides the target's notifications
    MutingNotifications,
    Blocking,
    DomainBlocking,
    Endorsing,
    ShowingReblogs,
    Notifying,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Following => "following",
            Self::FollowRequested => "follow_requested",
            Self::Muting => "muting",
            Self::MutingNotifications => "muting_notifications",
            Self::Blocking => "blocking",
            Self::DomainBlocking => "domain_blocking",
            Self::Endorsing => "endorsing",
            Self::ShowingReblogs => "showing_reblogs",
            Self::Notifying => "notifying",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "following" => Self::Following,
            "follow_requested" => Self::FollowRequested,
            "muting" => Self::Muting,
            "muting_notifications" => Self::MutingNotifications,
            "blocking" => Self::Blocking,
            "domain_blocking" => Self::DomainBlocking,
            "endorsing" => Self::Endorsing,
            "showing_reblogs" => Self::ShowingReblogs,
            "notifying" => Self::Notifying,
            _ => return None,
        })
    }
}

/// Both directions of the relationship between an actor and a target
///
/// Built from stored edges; `*_by` fields are the target's edges toward the
/// actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub following: bool,
    pub followed_by: bool,
    pub requested: bool,
    pub muting: bool,
    pub muted_by: bool,
    pub muting_notifications: bool,
    pub blocking: bool,
    pub blocked_by: bool,
    pub domain_blocking: bool,
    pub domain_blocked_by: bool,
    pub endorsing: bool,
    pub endorsed_by: bool,
    pub showing_reblogs: bool,
    pub shown_reblogs_by: bool,
    pub notifying: bool,
}

impl Relationship {
    /// Apply one stored edge. `outgoing` is true for actor -> target.
    pub(crate) fn apply_edge(&mut self, kind: RelationshipKind, outgoing: bool) {
        use RelationshipKind::*;
        match (kind, outgoing) {
            (Following, true) => self.following = true,
            (Following, false) => self.followed_by = true,
            (FollowRequested, true) => self.requested = true,
            (FollowRequested, false) => {}
            (Muting, true) => self.muting = true,
            (Muting, false) => self.muted_by = true,
            (MutingNotifications, true) => self.muting_notifications = true,
            (MutingNotifications, false) => {}
            (Blocking, true) => self.blocking = true,
            (Blocking, false) => self.blocked_by = true,
            (DomainBlocking, true) => self.domain_blocking = true,
            (DomainBlocking, false) => self.domain_blocked_by = true,
            (Endorsing, true) => self.endorsing = true,
            (Endorsing, false) => self.endorsed_by = true,
            (ShowingReblogs, true) => self.showing_reblogs = true,
            (ShowingReblogs, false) => self.shown_reblogs_by = true,
            (Notifying, true) => self.notifying = true,
            (Notifying, false) => {}
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// A post
///
/// `reblog_of_id` points at the local id of the reblogged status. The target
/// may be missing or soft-deleted; readers must tolerate that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Status {
    pub id: String,
    pub domain: String,
    pub remote_id: String,
    /// ActivityPub URI (globally unique)
    pub uri: String,
    pub url: Option<String>,
    /// Local id of the author
    pub account_id: String,
    /// HTML content
    pub content: String,
    /// Content warning text
    pub spoiler_text: String,
    /// Visibility: public, unlisted, private, direct
    pub visibility: String,
    pub sensitive: bool,
    pub language: Option<String>,
    /// Remote id of the replied-to status
    pub in_reply_to_id: Option<String>,
    pub in_reply_to_account_id: Option<String>,
    pub reblog_of_id: Option<String>,
    pub application_name: Option<String>,
    /// Preview card (raw JSON)
    pub card: Option<String>,
    pub replies_count: i64,
    pub reblogs_count: i64,
    pub favourites_count: i64,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    /// Soft delete marker
    pub deleted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub last_network_at: DateTime<Utc>,
}

impl Status {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(&self.domain, &self.remote_id)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Per-actor flags on a status, stored as set membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Favourited,
    Reblogged,
    Bookmarked,
    Muted,
    Pinned,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Favourited => "favourited",
            Self::Reblogged => "reblogged",
            Self::Bookmarked => "bookmarked",
            Self::Muted => "muted",
            Self::Pinned => "pinned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "favourited" => Self::Favourited,
            "reblogged" => Self::Reblogged,
            "bookmarked" => Self::Bookmarked,
            "muted" => Self::Muted,
            "pinned" => Self::Pinned,
            _ => return None,
        })
    }
}

/// Denormalized counters that optimistic mutations adjust
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCounter {
    Reblogs,
    Favourites,
}

impl StatusCounter {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Reblogs => "reblogs_count",
            Self::Favourites => "favourites_count",
        }
    }

    pub fn read(&self, status: &Status) -> i64 {
        match self {
            Self::Reblogs => status.reblogs_count,
            Self::Favourites => status.favourites_count,
        }
    }
}

// =============================================================================
// Polls
// =============================================================================

/// Poll owned by a status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: String,
    pub domain: String,
    pub remote_id: String,
    pub status_id: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    pub multiple: bool,
    pub votes_count: i64,
    pub voters_count: Option<i64>,
    pub updated_at: DateTime<Utc>,
    pub last_network_at: DateTime<Utc>,
}

impl Poll {
    /// Closed either by the server's flag or by the clock
    pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
        self.expired || self.expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PollOption {
    pub id: String,
    pub poll_id: String,
    pub option_index: i64,
    pub title: String,
    pub votes_count: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Notifications
// =============================================================================

/// Notification in one signed-in account's inbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: String,
    pub domain: String,
    /// Local id of the account whose inbox this is
    pub owner_id: String,
    pub remote_id: String,
    /// mention, status, reblog, follow, follow_request, favourite, poll, update
    pub kind: String,
    /// Who triggered this notification
    pub account_id: String,
    pub status_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Feeds
// =============================================================================

/// Feed kinds, one slot per (owner, kind)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Home,
    Local,
    Public,
    NotificationsAll,
    NotificationsMentions,
    Favourites,
    Bookmarks,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Local => "local",
            Self::Public => "public",
            Self::NotificationsAll => "notifications_all",
            Self::NotificationsMentions => "notifications_mentions",
            Self::Favourites => "favourites",
            Self::Bookmarks => "bookmarks",
        }
    }

    /// Notification feeds attach notifications; the rest attach statuses
    pub fn holds_notifications(&self) -> bool {
        matches!(self, Self::NotificationsAll | Self::NotificationsMentions)
    }
}

/// Pagination bookkeeping for one (owner, kind)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeedSlot {
    pub id: String,
    pub owner_id: String,
    pub kind: String,
    /// Older, not yet fetched items may exist past the oldest entry
    pub has_more: bool,
    pub updated_at: DateTime<Utc>,
}

/// Attachment of a status or notification to a feed slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeedEntry {
    pub id: String,
    pub feed_id: String,
    pub status_id: Option<String>,
    pub notification_id: Option<String>,
    pub has_more: bool,
    pub attached_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The record a feed entry points at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedTarget {
    Status(String),
    Notification(String),
}

impl FeedTarget {
    pub fn id(&self) -> &str {
        match self {
            Self::Status(id) | Self::Notification(id) => id,
        }
    }
}

/// Status row of a feed read together with its entry flags
#[derive(Debug, Clone, PartialEq)]
pub struct FeedStatus {
    pub status: Status,
    pub has_more: bool,
}

/// Notification row of a feed read together with its entry flags
#[derive(Debug, Clone, PartialEq)]
pub struct FeedNotification {
    pub notification: Notification,
    pub has_more: bool,
}
