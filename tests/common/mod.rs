//! Common test utilities for E2E tests
//!
//! `FakeServer` plays a Mastodon instance in memory: it keeps
//! relationships, status flags and polls per remote id, answers like the
//! real API, and can be told to fail or to hold calls until released.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use fedisync::SyncEngine;
use fedisync::config;
use fedisync::data::{Account, Database, EntityKey, Status};
use fedisync::remote::{
    AuthContext, RemoteAccount, RemoteApi, RemoteError, RemoteNotification, RemotePoll,
    RemotePollOption, RemoteRelationship, RemoteResult, RemoteStatus, Response, SharedSession,
};
use fedisync::service::{MergeContext, MergeResolver};
use tempfile::TempDir;
use tokio::sync::Notify;

/// Instance every fixture lives on
pub const DOMAIN: &str = "social.example";

/// Remote ids of the fixture accounts
pub const ME: &str = "1";
pub const BOB: &str = "2";
pub const CAROL: &str = "3";

/// Fixed point the fake server's clock starts from
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn remote_account(id: &str, acct: &str, locked: bool) -> RemoteAccount {
    RemoteAccount {
        id: id.to_string(),
        username: acct.split('@').next().unwrap_or(acct).to_string(),
        acct: acct.to_string(),
        display_name: String::new(),
        note: String::new(),
        url: None,
        avatar: None,
        avatar_static: None,
        header: None,
        header_static: None,
        locked,
        bot: false,
        suspended: false,
        created_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
        statuses_count: 0,
        following_count: 0,
        followers_count: 0,
    }
}

pub fn me() -> RemoteAccount {
    remote_account(ME, "me", false)
}

pub fn bob() -> RemoteAccount {
    remote_account(BOB, "bob", false)
}

/// Locked account on another server
pub fn carol() -> RemoteAccount {
    remote_account(CAROL, "carol@remote.example", true)
}

/// A status posted `minutes` after [`base_time`]
pub fn remote_status(id: &str, author: RemoteAccount, minutes: i64) -> RemoteStatus {
    RemoteStatus {
        id: id.to_string(),
        uri: format!("https://{DOMAIN}/statuses/{id}"),
        url: None,
        account: author,
        content: format!("<p>status {id}</p>"),
        spoiler_text: String::new(),
        visibility: "public".to_string(),
        sensitive: false,
        language: Some("en".to_string()),
        in_reply_to_id: None,
        in_reply_to_account_id: None,
        reblog: None,
        application: None,
        card: None,
        poll: None,
        replies_count: 0,
        reblogs_count: 0,
        favourites_count: 0,
        created_at: base_time() + Duration::minutes(minutes),
        edited_at: None,
        favourited: None,
        reblogged: None,
        bookmarked: None,
        muted: None,
        pinned: None,
    }
}

pub fn remote_reblog(id: &str, by: RemoteAccount, target: RemoteStatus, minutes: i64) -> RemoteStatus {
    RemoteStatus {
        content: String::new(),
        reblog: Some(Box::new(target)),
        ..remote_status(id, by, minutes)
    }
}

/// Open poll with the given option titles, closing a day from now
pub fn remote_poll(id: &str, titles: &[&str], multiple: bool) -> RemotePoll {
    RemotePoll {
        id: id.to_string(),
        expires_at: Some(Utc::now() + Duration::days(1)),
        expired: false,
        multiple,
        votes_count: 0,
        voters_count: Some(0),
        options: titles
            .iter()
            .map(|title| RemotePollOption {
                title: title.to_string(),
                votes_count: Some(0),
            })
            .collect(),
        voted: Some(false),
        own_votes: Some(Vec::new()),
    }
}

pub fn remote_notification(
    id: &str,
    kind: &str,
    from: RemoteAccount,
    status: Option<RemoteStatus>,
    minutes: i64,
) -> RemoteNotification {
    RemoteNotification {
        id: id.to_string(),
        kind: kind.to_string(),
        created_at: base_time() + Duration::minutes(minutes),
        account: from,
        status,
    }
}

// =============================================================================
// Fake server
// =============================================================================

#[derive(Default)]
struct FakeState {
    clock: DateTime<Utc>,
    accounts: HashMap<String, RemoteAccount>,
    relationships: HashMap<String, RemoteRelationship>,
    statuses: HashMap<String, RemoteStatus>,
    polls: HashMap<String, RemotePoll>,
    domain_blocks: BTreeSet<String>,
    failures: VecDeque<RemoteError>,
    calls: Vec<String>,
}

impl FakeState {
    fn relationship(&mut self, account_id: &str) -> &mut RemoteRelationship {
        self.relationships
            .entry(account_id.to_string())
            .or_insert_with(|| RemoteRelationship {
                id: account_id.to_string(),
                ..RemoteRelationship::default()
            })
    }

    fn status(&mut self, id: &str) -> Result<&mut RemoteStatus, RemoteError> {
        self.statuses.get_mut(id).ok_or(RemoteError::NotFound)
    }
}

pub struct FakeServer {
    state: Mutex<FakeState>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                clock: base_time() + Duration::hours(1),
                ..FakeState::default()
            }),
            gate: Mutex::new(None),
        }
    }

    /// Current server time, without advancing it
    pub fn now(&self) -> DateTime<Utc> {
        self.state.lock().unwrap().clock
    }

    pub fn add_account(&self, account: RemoteAccount) {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(account.id.clone(), account);
    }

    pub fn add_status(&self, status: RemoteStatus) {
        self.add_account(status.account.clone());
        let mut state = self.state.lock().unwrap();
        if let Some(poll) = &status.poll {
            state.polls.insert(poll.id.clone(), poll.clone());
        }
        state.statuses.insert(status.id.clone(), status);
    }

    pub fn set_relationship(&self, relationship: RemoteRelationship) {
        self.state
            .lock()
            .unwrap()
            .relationships
            .insert(relationship.id.clone(), relationship);
    }

    /// The account behind `account_id` accepts our pending request
    pub fn approve_follow_request(&self, account_id: &str) {
        let mut state = self.state.lock().unwrap();
        let relationship = state.relationship(account_id);
        relationship.requested = false;
        relationship.following = true;
        relationship.showing_reblogs = true;
    }

    /// Close a poll on the server side
    pub fn expire_poll(&self, poll_id: &str) {
        if let Some(poll) = self.state.lock().unwrap().polls.get_mut(poll_id) {
            poll.expired = true;
            poll.expires_at = Some(Utc::now() - Duration::minutes(1));
        }
    }

    /// Make the next call fail with `error`
    pub fn fail_next(&self, error: RemoteError) {
        self.state.lock().unwrap().failures.push_back(error);
    }

    /// Hold every following call until the returned handle is notified
    /// once per call.
    pub fn pause(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Calls received so far, as "endpoint:id"
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Wait until at least `count` calls have arrived
    pub async fn wait_for_calls(&self, count: usize) {
        for _ in 0..200 {
            if self.calls().len() >= count {
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        panic!("expected {count} calls, saw {:?}", self.calls());
    }

    /// Record the call, wait at the gate, then either fail or advance the
    /// clock and return the response date.
    async fn enter(&self, call: String) -> Result<DateTime<Utc>, RemoteError> {
        self.state.lock().unwrap().calls.push(call);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        state.clock += Duration::seconds(1);
        Ok(state.clock)
    }

    async fn update_relationship(
        &self,
        call: &str,
        account_id: &str,
        apply: impl FnOnce(&mut RemoteRelationship, bool),
    ) -> RemoteResult<RemoteRelationship> {
        let date = self.enter(format!("{call}:{account_id}")).await?;
        let mut state = self.state.lock().unwrap();
        let locked = state
            .accounts
            .get(account_id)
            .map(|account| account.locked)
            .unwrap_or(false);
        let relationship = state.relationship(account_id);
        apply(relationship, locked);
        Ok(Response::new(relationship.clone(), date))
    }

    /// Apply a status action. Undo actions answer with the count from
    /// before the undo, the way Mastodon does.
    async fn update_status(
        &self,
        call: &str,
        status_id: &str,
        apply: impl FnOnce(&mut RemoteStatus) -> Option<RemoteStatus>,
    ) -> RemoteResult<RemoteStatus> {
        let date = self.enter(format!("{call}:{status_id}")).await?;
        let mut state = self.state.lock().unwrap();
        let status = state.status(status_id)?;
        let answer = apply(status).unwrap_or_else(|| status.clone());
        Ok(Response::new(answer, date))
    }
}

#[async_trait]
impl RemoteApi for FakeServer {
    async fn follow(&self, _auth: &AuthContext, account_id: &str) -> RemoteResult<RemoteRelationship> {
        self.update_relationship("follow", account_id, |relationship, locked| {
            if locked {
                relationship.requested = !relationship.following;
            } else {
                relationship.following = true;
                relationship.showing_reblogs = true;
            }
        })
        .await
    }

    async fn unfollow(
        &self,
        _auth: &AuthContext,
        account_id: &str,
    ) -> RemoteResult<RemoteRelationship> {
        self.update_relationship("unfollow", account_id, |relationship, _| {
            relationship.following = false;
            relationship.requested = false;
            relationship.showing_reblogs = false;
        })
        .await
    }

    async fn mute(&self, _auth: &AuthContext, account_id: &str) -> RemoteResult<RemoteRelationship> {
        self.update_relationship("mute", account_id, |relationship, _| {
            relationship.muting = true;
            relationship.muting_notifications = true;
        })
        .await
    }

    async fn unmute(&self, _auth: &AuthContext, account_id: &str) -> RemoteResult<RemoteRelationship> {
        self.update_relationship("unmute", account_id, |relationship, _| {
            relationship.muting = false;
            relationship.muting_notifications = false;
        })
        .await
    }

    async fn block(&self, _auth: &AuthContext, account_id: &str) -> RemoteResult<RemoteRelationship> {
        self.update_relationship("block", account_id, |relationship, _| {
            relationship.blocking = true;
            relationship.following = false;
            relationship.requested = false;
        })
        .await
    }

    async fn unblock(
        &self,
        _auth: &AuthContext,
        account_id: &str,
    ) -> RemoteResult<RemoteRelationship> {
        self.update_relationship("unblock", account_id, |relationship, _| {
            relationship.blocking = false;
        })
        .await
    }

    async fn relationship(
        &self,
        _auth: &AuthContext,
        account_id: &str,
    ) -> RemoteResult<RemoteRelationship> {
        self.update_relationship("relationship", account_id, |_, _| {})
            .await
    }

    async fn block_domain(&self, _auth: &AuthContext, domain: &str) -> RemoteResult<()> {
        let date = self.enter(format!("block_domain:{domain}")).await?;
        let mut state = self.state.lock().unwrap();
        state.domain_blocks.insert(domain.to_string());
        set_domain_blocking(&mut state, domain, true);
        Ok(Response::new((), date))
    }

    async fn unblock_domain(&self, _auth: &AuthContext, domain: &str) -> RemoteResult<()> {
        let date = self.enter(format!("unblock_domain:{domain}")).await?;
        let mut state = self.state.lock().unwrap();
        state.domain_blocks.remove(domain);
        set_domain_blocking(&mut state, domain, false);
        Ok(Response::new((), date))
    }

    async fn domain_blocks(&self, _auth: &AuthContext) -> RemoteResult<Vec<String>> {
        let date = self.enter("domain_blocks".to_string()).await?;
        let state = self.state.lock().unwrap();
        Ok(Response::new(
            state.domain_blocks.iter().cloned().collect(),
            date,
        ))
    }

    async fn reblog(&self, _auth: &AuthContext, status_id: &str) -> RemoteResult<RemoteStatus> {
        self.update_status("reblog", status_id, |status| {
            if status.reblogged != Some(true) {
                status.reblogs_count += 1;
            }
            status.reblogged = Some(true);
            None
        })
        .await
    }

    async fn unreblog(&self, _auth: &AuthContext, status_id: &str) -> RemoteResult<RemoteStatus> {
        self.update_status("unreblog", status_id, |status| {
            status.reblogged = Some(false);
            let answer = status.clone();
            status.reblogs_count = (status.reblogs_count - 1).max(0);
            Some(answer)
        })
        .await
    }

    async fn favourite(&self, _auth: &AuthContext, status_id: &str) -> RemoteResult<RemoteStatus> {
        self.update_status("favourite", status_id, |status| {
            if status.favourited != Some(true) {
                status.favourites_count += 1;
            }
            status.favourited = Some(true);
            None
        })
        .await
    }

    async fn unfavourite(
        &self,
        _auth: &AuthContext,
        status_id: &str,
    ) -> RemoteResult<RemoteStatus> {
        self.update_status("unfavourite", status_id, |status| {
            status.favourited = Some(false);
            let answer = status.clone();
            status.favourites_count = (status.favourites_count - 1).max(0);
            Some(answer)
        })
        .await
    }

    async fn bookmark(&self, _auth: &AuthContext, status_id: &str) -> RemoteResult<RemoteStatus> {
        self.update_status("bookmark", status_id, |status| {
            status.bookmarked = Some(true);
            None
        })
        .await
    }

    async fn unbookmark(&self, _auth: &AuthContext, status_id: &str) -> RemoteResult<RemoteStatus> {
        self.update_status("unbookmark", status_id, |status| {
            status.bookmarked = Some(false);
            None
        })
        .await
    }

    async fn poll(&self, _auth: &AuthContext, poll_id: &str) -> RemoteResult<RemotePoll> {
        let date = self.enter(format!("poll:{poll_id}")).await?;
        let state = self.state.lock().unwrap();
        let poll = state.polls.get(poll_id).ok_or(RemoteError::NotFound)?;
        Ok(Response::new(poll.clone(), date))
    }

    async fn vote(
        &self,
        _auth: &AuthContext,
        poll_id: &str,
        choices: &[usize],
    ) -> RemoteResult<RemotePoll> {
        let date = self.enter(format!("vote:{poll_id}")).await?;
        let mut state = self.state.lock().unwrap();
        let poll = state.polls.get_mut(poll_id).ok_or(RemoteError::NotFound)?;

        let closed = poll.expired || poll.expires_at.is_some_and(|at| at <= Utc::now());
        if closed {
            return Err(RemoteError::Server {
                status: 422,
                message: "The poll has already ended".to_string(),
            });
        }
        if poll.voted == Some(true) {
            return Err(RemoteError::Server {
                status: 422,
                message: "You have already voted on this poll".to_string(),
            });
        }

        for choice in choices {
            if let Some(option) = poll.options.get_mut(*choice) {
                option.votes_count = Some(option.votes_count.unwrap_or(0) + 1);
            }
        }
        poll.votes_count += choices.len() as i64;
        poll.voters_count = Some(poll.voters_count.unwrap_or(0) + 1);
        poll.voted = Some(true);
        poll.own_votes = Some(choices.to_vec());
        Ok(Response::new(poll.clone(), date))
    }
}

fn set_domain_blocking(state: &mut FakeState, domain: &str, blocked: bool) {
    let ids: Vec<String> = state
        .accounts
        .values()
        .filter(|account| {
            account
                .acct
                .split_once('@')
                .is_some_and(|(_, host)| host.eq_ignore_ascii_case(domain))
        })
        .map(|account| account.id.clone())
        .collect();
    for id in ids {
        state.relationship(&id).domain_blocking = blocked;
    }
}

// =============================================================================
// Engine harness
// =============================================================================

pub type Engine = SyncEngine<FakeServer, SharedSession>;

/// Engine on a temporary store, signed in as [`ME`] with [`bob`] and
/// [`carol`] already stored
pub struct TestEngine {
    pub engine: Engine,
    pub server: Arc<FakeServer>,
    pub session: Arc<SharedSession>,
    pub auth: AuthContext,
    pub _temp_dir: TempDir,
}

pub fn test_config(temp_dir: &TempDir) -> config::AppConfig {
    config::AppConfig {
        database: config::DatabaseConfig {
            path: temp_dir.path().join("test.db"),
            max_connections: 4,
            busy_timeout_ms: 5000,
        },
        sync: config::SyncConfig {
            change_feed_capacity: 64,
            follow_request_poll: config::FollowRequestPollConfig {
                initial_delay_ms: 5,
                max_delay_ms: 20,
                max_attempts: 5,
            },
        },
        logging: config::LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
    }
}

impl TestEngine {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let server = Arc::new(FakeServer::new());
        let auth = AuthContext::new(DOMAIN, ME);
        let session = Arc::new(SharedSession::signed_in(auth.clone()));

        let config = test_config(&temp_dir);
        fedisync::telemetry::init_tracing(&config.logging);
        let engine = SyncEngine::new(config, server.clone(), session.clone())
            .await
            .unwrap();

        for account in [me(), bob(), carol()] {
            server.add_account(account);
        }

        let this = Self {
            engine,
            server,
            session,
            auth,
            _temp_dir: temp_dir,
        };
        this.ingest_accounts(&[me(), bob(), carol()]).await;
        this
    }

    pub fn db(&self) -> &Arc<Database> {
        self.engine.db()
    }

    /// Merge context as the signed-in account, dated at server time
    pub fn ctx(&self) -> MergeContext {
        MergeContext::for_actor(&self.auth, self.server.now())
    }

    pub async fn ingest_accounts(&self, accounts: &[RemoteAccount]) -> Vec<Account> {
        MergeResolver::ingest_accounts(self.db(), &self.ctx(), accounts)
            .await
            .unwrap()
    }

    /// Store statuses locally and publish them on the fake server
    pub async fn ingest_statuses(&self, statuses: &[RemoteStatus]) -> Vec<Status> {
        for status in statuses {
            if let Some(target) = &status.reblog {
                self.server.add_status((**target).clone());
            }
            self.server.add_status(status.clone());
        }
        MergeResolver::ingest_statuses(self.db(), &self.ctx(), statuses)
            .await
            .unwrap()
    }

    pub async fn account(&self, remote_id: &str) -> Account {
        self.db()
            .account_by_key(&EntityKey::new(DOMAIN, remote_id))
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn status(&self, remote_id: &str) -> Status {
        self.db()
            .status_by_key(&EntityKey::new(DOMAIN, remote_id))
            .await
            .unwrap()
            .unwrap()
    }
}
