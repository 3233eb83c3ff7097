//! Remote collaborators
//!
//! The engine never talks HTTP itself. Servers are reached through
//! [`RemoteApi`], and the signed-in account is supplied by [`Session`].

mod dto;

pub use dto::*;

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Authoritative payload plus the server-reported time it was produced
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub value: T,
    /// Used as the merge's network date
    pub network_date: DateTime<Utc>,
}

impl<T> Response<T> {
    pub fn new(value: T, network_date: DateTime<Utc>) -> Self {
        Self {
            value,
            network_date,
        }
    }
}

/// Error reported by the remote API collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("record not found on server")]
    NotFound,

    #[error("rate limited")]
    Throttled { retry_after_secs: Option<u64> },

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request cancelled")]
    Cancelled,
}

pub type RemoteResult<T> = std::result::Result<Response<T>, RemoteError>;

/// Identity of the signed-in account making a call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthContext {
    /// Normalised host of the account's server
    pub domain: String,
    /// The account's id on that server
    pub user_id: String,
}

impl AuthContext {
    pub fn new(domain: &str, user_id: impl Into<String>) -> Self {
        Self {
            domain: normalize_domain(domain),
            user_id: user_id.into(),
        }
    }
}

/// Normalise an instance domain to a lowercase host without trailing dot.
///
/// Accepts bare hosts, `host:port` and full URLs. A port other than the
/// scheme's default is part of the identity and kept as `host:port`.
pub fn normalize_domain(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed = if trimmed.contains("://") {
        url::Url::parse(trimmed).ok()
    } else {
        url::Url::parse(&format!("https://{trimmed}")).ok()
    };
    let Some(url) = parsed else {
        return trimmed.trim_end_matches('.').to_ascii_lowercase();
    };
    let host = url
        .host_str()
        .unwrap_or(trimmed)
        .trim_end_matches('.')
        .to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    }
}

/// Mastodon-compatible server API used by the engine
///
/// Every call is idempotent on the server side and returns the entity as
/// the server now sees it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn follow(&self, auth: &AuthContext, account_id: &str)
    -> RemoteResult<RemoteRelationship>;
    async fn unfollow(
        &self,
        auth: &AuthContext,
        account_id: &str,
    ) -> RemoteResult<RemoteRelationship>;
    async fn mute(&self, auth: &AuthContext, account_id: &str) -> RemoteResult<RemoteRelationship>;
    async fn unmute(&self, auth: &AuthContext, account_id: &str)
    -> RemoteResult<RemoteRelationship>;
    async fn block(&self, auth: &AuthContext, account_id: &str) -> RemoteResult<RemoteRelationship>;
    async fn unblock(
        &self,
        auth: &AuthContext,
        account_id: &str,
    ) -> RemoteResult<RemoteRelationship>;
    async fn relationship(
        &self,
        auth: &AuthContext,
        account_id: &str,
    ) -> RemoteResult<RemoteRelationship>;

    async fn block_domain(&self, auth: &AuthContext, domain: &str) -> RemoteResult<()>;
    async fn unblock_domain(&self, auth: &AuthContext, domain: &str) -> RemoteResult<()>;
    async fn domain_blocks(&self, auth: &AuthContext) -> RemoteResult<Vec<String>>;

    async fn reblog(&self, auth: &AuthContext, status_id: &str) -> RemoteResult<RemoteStatus>;
    async fn unreblog(&self, auth: &AuthContext, status_id: &str) -> RemoteResult<RemoteStatus>;
    async fn favourite(&self, auth: &AuthContext, status_id: &str) -> RemoteResult<RemoteStatus>;
    async fn unfavourite(&self, auth: &AuthContext, status_id: &str)
    -> RemoteResult<RemoteStatus>;
    async fn bookmark(&self, auth: &AuthContext, status_id: &str) -> RemoteResult<RemoteStatus>;
    async fn unbookmark(&self, auth: &AuthContext, status_id: &str) -> RemoteResult<RemoteStatus>;

    async fn poll(&self, auth: &AuthContext, poll_id: &str) -> RemoteResult<RemotePoll>;
    async fn vote(
        &self,
        auth: &AuthContext,
        poll_id: &str,
        choices: &[usize],
    ) -> RemoteResult<RemotePoll>;
}

/// Supplies the signed-in account for every engine call
pub trait Session: Send + Sync {
    fn current(&self) -> Option<AuthContext>;
}

/// Session holder that can be signed in and out at runtime
#[derive(Debug, Default)]
pub struct SharedSession {
    current: RwLock<Option<AuthContext>>,
}

impl SharedSession {
    pub fn signed_in(auth: AuthContext) -> Self {
        Self {
            current: RwLock::new(Some(auth)),
        }
    }

    pub fn sign_in(&self, auth: AuthContext) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Some(auth);
    }

    pub fn sign_out(&self) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = None;
    }
}

impl Session for SharedSession {
    fn current(&self) -> Option<AuthContext> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
