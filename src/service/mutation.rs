//! Optimistic mutation coordinator
//!
//! Every toggle runs the same three phases:
//!
//! 1. In one write transaction, read the actor's current membership, pick
//!    the opposite query, flip it locally and remember what was there.
//! 2. Call the server. This is the only phase that waits on the network.
//! 3. On success merge the server's answer; on failure put the remembered
//!    state back and return the error.
//!
//! Phases 2 and 3 run on a spawned task, so a caller that stops waiting
//! does not leave the optimistic state behind. Toggles on the same
//! (target, actor, kind) are serialized through [`InFlight`].

use std::sync::Arc;

use super::inflight::{InFlight, InFlightGuard, InFlightKey};
use super::merge::{MergeContext, MergeResolver, effective_status, is_stale};
use crate::data::{
    Account, Changes, Database, EntityKey, InteractionKind, MergeCache, Relationship,
    RelationshipKind, Status, StatusCounter,
};
use crate::error::AppError;
use crate::remote::{
    AuthContext, RemoteApi, RemoteError, RemoteRelationship, RemoteStatus, Response, Session,
};

/// Relationship families toggled between an actor and another account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipToggle {
    Follow,
    Mute,
    Block,
}

impl RelationshipToggle {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Mute => "mute",
            Self::Block => "block",
        }
    }
}

/// Per-actor flags toggled on a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusToggle {
    Reblog,
    Favourite,
    Bookmark,
}

impl StatusToggle {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Reblog => "reblog",
            Self::Favourite => "favourite",
            Self::Bookmark => "bookmark",
        }
    }

    fn interaction(&self) -> InteractionKind {
        match self {
            Self::Reblog => InteractionKind::Reblogged,
            Self::Favourite => InteractionKind::Favourited,
            Self::Bookmark => InteractionKind::Bookmarked,
        }
    }

    fn counter(&self) -> Option<StatusCounter> {
        match self {
            Self::Reblog => Some(StatusCounter::Reblogs),
            Self::Favourite => Some(StatusCounter::Favourites),
            Self::Bookmark => None,
        }
    }
}

/// The remote call chosen in phase 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleQuery {
    Follow,
    /// Follow a locked account; the server answers with a pending request
    FollowRequest,
    Unfollow,
    Mute,
    Unmute,
    Block,
    Unblock,
    Reblog,
    Unreblog,
    Favourite,
    Unfavourite,
    Bookmark,
    Unbookmark,
}

impl ToggleQuery {
    /// Compute the query from the actor's current relationship
    pub fn for_relationship(
        toggle: RelationshipToggle,
        current: &Relationship,
        target_locked: bool,
    ) -> Self {
        match toggle {
            RelationshipToggle::Follow if current.following || current.requested => Self::Unfollow,
            RelationshipToggle::Follow if target_locked => Self::FollowRequest,
            RelationshipToggle::Follow => Self::Follow,
            RelationshipToggle::Mute if current.muting => Self::Unmute,
            RelationshipToggle::Mute => Self::Mute,
            RelationshipToggle::Block if current.blocking => Self::Unblock,
            RelationshipToggle::Block => Self::Block,
        }
    }

    pub fn for_status(toggle: StatusToggle, is_set: bool) -> Self {
        match (toggle, is_set) {
            (StatusToggle::Reblog, true) => Self::Unreblog,
            (StatusToggle::Reblog, false) => Self::Reblog,
            (StatusToggle::Favourite, true) => Self::Unfavourite,
            (StatusToggle::Favourite, false) => Self::Favourite,
            (StatusToggle::Bookmark, true) => Self::Unbookmark,
            (StatusToggle::Bookmark, false) => Self::Bookmark,
        }
    }

    /// Undo of a count-bearing action
    fn compensates_count(&self) -> bool {
        matches!(self, Self::Unreblog | Self::Unfavourite)
    }

    /// Edges written locally before the server answers
    fn relationship_edges(&self) -> &'static [(RelationshipKind, bool)] {
        match self {
            Self::Follow => &[(RelationshipKind::Following, true)],
            Self::FollowRequest => &[(RelationshipKind::FollowRequested, true)],
            Self::Unfollow => &[
                (RelationshipKind::Following, false),
                (RelationshipKind::FollowRequested, false),
            ],
            // The server mutes notifications too unless told otherwise
            Self::Mute => &[
                (RelationshipKind::Muting, true),
                (RelationshipKind::MutingNotifications, true),
            ],
            Self::Unmute => &[
                (RelationshipKind::Muting, false),
                (RelationshipKind::MutingNotifications, false),
            ],
            Self::Block => &[(RelationshipKind::Blocking, true)],
            Self::Unblock => &[(RelationshipKind::Blocking, false)],
            _ => &[],
        }
    }
}

/// Local state captured before the flip, restored on failure
#[derive(Debug, Clone, PartialEq)]
enum Snapshot {
    Relationship {
        actor_id: String,
        target_id: String,
        edges: Vec<(RelationshipKind, bool)>,
    },
    Interaction {
        status_id: String,
        actor_id: String,
        kind: InteractionKind,
        was_set: bool,
        counter: Option<(StatusCounter, i64)>,
    },
}

impl Snapshot {
    async fn restore(&self, changes: &mut Changes) -> Result<(), AppError> {
        match self {
            Snapshot::Relationship {
                actor_id,
                target_id,
                edges,
            } => {
                for (kind, is_set) in edges {
                    changes
                        .set_relationship(*kind, actor_id, target_id, *is_set)
                        .await?;
                }
            }
            Snapshot::Interaction {
                status_id,
                actor_id,
                kind,
                was_set,
                counter,
            } => {
                changes
                    .set_interaction(status_id, actor_id, *kind, *was_set)
                    .await?;
                if let Some((counter, value)) = counter {
                    changes
                        .set_status_counter(status_id, *counter, *value)
                        .await?;
                }
            }
        }
        Ok(())
    }
}

/// Runs optimistic toggles for the signed-in account
pub struct MutationCoordinator<R, S> {
    db: Arc<Database>,
    remote: Arc<R>,
    session: Arc<S>,
    inflight: Arc<InFlight>,
}

impl<R, S> MutationCoordinator<R, S>
where
    R: RemoteApi + 'static,
    S: Session,
{
    pub fn new(db: Arc<Database>, remote: Arc<R>, session: Arc<S>) -> Self {
        Self {
            db,
            remote,
            session,
            inflight: Arc::new(InFlight::new()),
        }
    }

    fn auth(&self) -> Result<AuthContext, AppError> {
        self.session.current().ok_or(AppError::AuthenticationMissing)
    }

    // =========================================================================
    // Relationship toggles
    // =========================================================================

    /// Follow, request to follow, or unfollow `target_id`
    pub async fn toggle_follow(&self, target_id: &str) -> Result<Relationship, AppError> {
        self.toggle_relationship(RelationshipToggle::Follow, target_id)
            .await
    }

    pub async fn toggle_mute(&self, target_id: &str) -> Result<Relationship, AppError> {
        self.toggle_relationship(RelationshipToggle::Mute, target_id)
            .await
    }

    pub async fn toggle_block(&self, target_id: &str) -> Result<Relationship, AppError> {
        self.toggle_relationship(RelationshipToggle::Block, target_id)
            .await
    }

    async fn toggle_relationship(
        &self,
        toggle: RelationshipToggle,
        target_id: &str,
    ) -> Result<Relationship, AppError> {
        let auth = self.auth()?;
        let (actor, target) = self.participants(&auth, target_id).await?;
        let guard = self
            .inflight
            .acquire(InFlightKey::new(&target.id, &actor.id, toggle.as_str()))
            .await;

        // Phase 1
        let mut changes = self.db.begin_changes().await?;
        let current = changes.relationship(&actor.id, &target.id).await?;
        let query = ToggleQuery::for_relationship(toggle, &current, target.locked);
        let mut edges = Vec::new();
        for (kind, is_set) in query.relationship_edges() {
            edges.push((*kind, current_edge(&current, *kind)));
            changes
                .set_relationship(*kind, &actor.id, &target.id, *is_set)
                .await?;
        }
        changes.commit().await?;
        let snapshot = Snapshot::Relationship {
            actor_id: actor.id.clone(),
            target_id: target.id.clone(),
            edges,
        };

        tracing::debug!(
            ?query,
            actor = %actor.id,
            target = %target.id,
            "Applied optimistic relationship change"
        );

        let task = ReconcileTask {
            db: self.db.clone(),
            remote: self.remote.clone(),
            auth,
            label: toggle.as_str(),
            query,
            remote_id: target.remote_id.clone(),
            snapshot,
            _guard: guard,
        };
        let actor_id = actor.id.clone();
        let target_id = target.id.clone();
        let outcome = tokio::spawn(async move {
            let response = task.call_relationship().await;
            task.reconcile_relationship(response, &actor_id, &target_id)
                .await
        });

        outcome
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("toggle task failed: {e}")))?
    }

    /// Block or unblock the domain of `target_id`'s server.
    ///
    /// Domain blocks are a list, not a flag: the current state is read from
    /// the server, nothing is flipped locally, and the stored list is
    /// replaced with the server's after the change.
    pub async fn toggle_domain_block(&self, target_id: &str) -> Result<Relationship, AppError> {
        let auth = self.auth()?;
        let (actor, target) = self.participants(&auth, target_id).await?;
        let _guard = self
            .inflight
            .acquire(InFlightKey::new(&target.id, &actor.id, "domain_block"))
            .await;

        let blocked_domain = account_domain(&target).ok_or_else(|| {
            AppError::BadRequest(format!("account {} is on the actor's own server", target.acct))
        })?;

        let result = async {
            let current = self.remote.relationship(&auth, &target.remote_id).await?;
            self.merge_relationship_response(&auth, &current).await?;

            let changed = if current.value.domain_blocking {
                self.remote.unblock_domain(&auth, &blocked_domain).await?
            } else {
                self.remote.block_domain(&auth, &blocked_domain).await?
            };
            tracing::info!(
                domain = %blocked_domain,
                blocked = !current.value.domain_blocking,
                "Domain block toggled"
            );

            let refreshed = self.remote.relationship(&auth, &target.remote_id).await?;
            let blocks = self.remote.domain_blocks(&auth).await?;

            let mut changes = self.db.begin_changes().await?;
            let mut cache = MergeCache::new();
            let ctx = MergeContext::for_actor(&auth, refreshed.network_date);
            MergeResolver::merge_relationship(&mut changes, &ctx, &mut cache, &refreshed.value)
                .await?;
            changes
                .replace_domain_blocks(&auth.domain, &actor.id, &blocks.value, changed.network_date)
                .await?;
            let relationship = changes.relationship(&actor.id, &target.id).await?;
            changes.commit().await?;
            Ok::<_, AppError>(relationship)
        }
        .await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        crate::metrics::record_toggle("domain_block", outcome);
        result
    }

    async fn merge_relationship_response(
        &self,
        auth: &AuthContext,
        response: &Response<RemoteRelationship>,
    ) -> Result<(), AppError> {
        let mut changes = self.db.begin_changes().await?;
        let mut cache = MergeCache::new();
        let ctx = MergeContext::for_actor(auth, response.network_date);
        MergeResolver::merge_relationship(&mut changes, &ctx, &mut cache, &response.value).await?;
        changes.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Status toggles
    // =========================================================================

    /// Reblog or unreblog the effective post of `status_id`
    pub async fn toggle_reblog(&self, status_id: &str) -> Result<Status, AppError> {
        self.toggle_status(StatusToggle::Reblog, status_id).await
    }

    pub async fn toggle_favourite(&self, status_id: &str) -> Result<Status, AppError> {
        self.toggle_status(StatusToggle::Favourite, status_id).await
    }

    pub async fn toggle_bookmark(&self, status_id: &str) -> Result<Status, AppError> {
        self.toggle_status(StatusToggle::Bookmark, status_id).await
    }

    async fn toggle_status(&self, toggle: StatusToggle, status_id: &str) -> Result<Status, AppError> {
        let auth = self.auth()?;
        let actor = self.actor(&auth).await?;
        let status = self.db.status(status_id).await?.ok_or(AppError::NotFound)?;
        ensure_same_server(&auth, &status.domain)?;

        // Serialize on the effective post so a reblog wrapper and its target
        // share one key.
        let effective_id = match &status.reblog_of_id {
            Some(target_id) => match self.db.status(target_id).await? {
                Some(target) if !target.is_deleted() => target.id,
                _ => status.id.clone(),
            },
            None => status.id.clone(),
        };
        let guard = self
            .inflight
            .acquire(InFlightKey::new(&effective_id, &actor.id, toggle.as_str()))
            .await;

        // Phase 1
        let mut changes = self.db.begin_changes().await?;
        let status = changes.status_by_id(status_id).await?.ok_or(AppError::NotFound)?;
        let effective = effective_status(&mut changes, status).await?;
        let kind = toggle.interaction();
        let was_set = changes
            .has_interaction(&effective.id, &actor.id, kind)
            .await?;
        let query = ToggleQuery::for_status(toggle, was_set);

        changes
            .set_interaction(&effective.id, &actor.id, kind, !was_set)
            .await?;
        let counter = match toggle.counter() {
            Some(counter) => {
                let before = counter.read(&effective);
                let delta = if was_set { -1 } else { 1 };
                changes
                    .adjust_status_counter(&effective.id, counter, delta)
                    .await?;
                Some((counter, before))
            }
            None => None,
        };
        changes.commit().await?;
        let snapshot = Snapshot::Interaction {
            status_id: effective.id.clone(),
            actor_id: actor.id.clone(),
            kind,
            was_set,
            counter,
        };

        tracing::debug!(
            ?query,
            actor = %actor.id,
            status = %effective.id,
            "Applied optimistic status change"
        );

        let task = ReconcileTask {
            db: self.db.clone(),
            remote: self.remote.clone(),
            auth,
            label: toggle.as_str(),
            query,
            remote_id: effective.remote_id.clone(),
            snapshot,
            _guard: guard,
        };
        let effective_id = effective.id.clone();
        let outcome = tokio::spawn(async move {
            let response = task.call_status().await;
            task.reconcile_status(response, &effective_id, toggle.counter())
                .await
        });

        outcome
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("toggle task failed: {e}")))?
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn actor(&self, auth: &AuthContext) -> Result<Account, AppError> {
        let key = EntityKey::new(&auth.domain, &auth.user_id);
        match self.db.account_by_key(&key).await? {
            Some(account) => Ok(account),
            None => Err(AppError::invariant(format!(
                "acting account {}@{} is not stored",
                auth.user_id, auth.domain
            ))),
        }
    }

    async fn participants(
        &self,
        auth: &AuthContext,
        target_id: &str,
    ) -> Result<(Account, Account), AppError> {
        let actor = self.actor(auth).await?;
        let target = self.db.account(target_id).await?.ok_or(AppError::NotFound)?;
        ensure_same_server(auth, &target.domain)?;
        if target.id == actor.id {
            return Err(AppError::BadRequest(
                "cannot change a relationship with yourself".to_string(),
            ));
        }
        Ok((actor, target))
    }
}

/// Phases 2 and 3 of one toggle, owned by the spawned task
struct ReconcileTask<R> {
    db: Arc<Database>,
    remote: Arc<R>,
    auth: AuthContext,
    label: &'static str,
    query: ToggleQuery,
    remote_id: String,
    snapshot: Snapshot,
    _guard: InFlightGuard,
}

impl<R: RemoteApi> ReconcileTask<R> {
    async fn call_relationship(&self) -> Result<Response<RemoteRelationship>, RemoteError> {
        let (auth, id) = (&self.auth, self.remote_id.as_str());
        match self.query {
            ToggleQuery::Follow | ToggleQuery::FollowRequest => self.remote.follow(auth, id).await,
            ToggleQuery::Unfollow => self.remote.unfollow(auth, id).await,
            ToggleQuery::Mute => self.remote.mute(auth, id).await,
            ToggleQuery::Unmute => self.remote.unmute(auth, id).await,
            ToggleQuery::Block => self.remote.block(auth, id).await,
            ToggleQuery::Unblock => self.remote.unblock(auth, id).await,
            other => Err(RemoteError::Transport(format!(
                "{other:?} is not a relationship query"
            ))),
        }
    }

    async fn call_status(&self) -> Result<Response<RemoteStatus>, RemoteError> {
        let (auth, id) = (&self.auth, self.remote_id.as_str());
        match self.query {
            ToggleQuery::Reblog => self.remote.reblog(auth, id).await,
            ToggleQuery::Unreblog => self.remote.unreblog(auth, id).await,
            ToggleQuery::Favourite => self.remote.favourite(auth, id).await,
            ToggleQuery::Unfavourite => self.remote.unfavourite(auth, id).await,
            ToggleQuery::Bookmark => self.remote.bookmark(auth, id).await,
            ToggleQuery::Unbookmark => self.remote.unbookmark(auth, id).await,
            other => Err(RemoteError::Transport(format!(
                "{other:?} is not a status query"
            ))),
        }
    }

    async fn reconcile_relationship(
        self,
        response: Result<Response<RemoteRelationship>, RemoteError>,
        actor_id: &str,
        target_id: &str,
    ) -> Result<Relationship, AppError> {
        let response = match response {
            Ok(response) => response,
            Err(error) => return Err(self.fail(error.into()).await),
        };

        let reconciled = async {
            let mut changes = self.db.begin_changes().await?;
            let mut cache = MergeCache::new();
            let ctx = MergeContext::for_actor(&self.auth, response.network_date);
            MergeResolver::merge_relationship(&mut changes, &ctx, &mut cache, &response.value)
                .await?;
            let relationship = changes.relationship(actor_id, target_id).await?;
            changes.commit().await?;
            Ok::<_, AppError>(relationship)
        }
        .await;

        match reconciled {
            Ok(relationship) => {
                crate::metrics::record_toggle(self.label, "success");
                Ok(relationship)
            }
            Err(error) => Err(self.fail(error).await),
        }
    }

    async fn reconcile_status(
        self,
        response: Result<Response<RemoteStatus>, RemoteError>,
        effective_id: &str,
        counter: Option<StatusCounter>,
    ) -> Result<Status, AppError> {
        let response = match response {
            Ok(response) => response,
            Err(error) => return Err(self.fail(error.into()).await),
        };

        let reconciled = async {
            let mut changes = self.db.begin_changes().await?;
            let mut cache = MergeCache::new();
            let ctx = MergeContext::for_actor(&self.auth, response.network_date);
            // A stale answer is dropped by the merge; the local count stands.
            let applied = match changes.status_by_id(effective_id).await? {
                Some(current) => !is_stale(response.network_date, current.last_network_at),
                None => true,
            };
            MergeResolver::merge_status(&mut changes, &ctx, &mut cache, &response.value).await?;

            // The server's count for an undo still includes the action.
            if let (true, Some(counter)) = (applied && self.query.compensates_count(), counter) {
                changes
                    .adjust_status_counter(effective_id, counter, -1)
                    .await?;
            }

            let status = changes
                .status_by_id(effective_id)
                .await?
                .ok_or(AppError::NotFound)?;
            changes.commit().await?;
            Ok::<_, AppError>(status)
        }
        .await;

        match reconciled {
            Ok(status) => {
                crate::metrics::record_toggle(self.label, "success");
                Ok(status)
            }
            Err(error) => Err(self.fail(error).await),
        }
    }

    /// Restore the snapshot and hand back the original error.
    ///
    /// A failed restore is logged, never returned.
    async fn fail(&self, error: AppError) -> AppError {
        crate::metrics::record_toggle(self.label, "failure");
        tracing::warn!(
            query = ?self.query,
            error = %error,
            "Remote toggle failed; rolling back"
        );

        let restored = async {
            let mut changes = self.db.begin_changes().await?;
            self.snapshot.restore(&mut changes).await?;
            changes.commit().await?;
            Ok::<_, AppError>(())
        }
        .await;

        if let Err(rollback_error) = restored {
            crate::metrics::ROLLBACK_FAILURES_TOTAL
                .with_label_values(&[self.label])
                .inc();
            tracing::error!(
                query = ?self.query,
                error = %rollback_error,
                "Rollback of optimistic change failed"
            );
        }

        error
    }
}

fn current_edge(relationship: &Relationship, kind: RelationshipKind) -> bool {
    match kind {
        RelationshipKind::Following => relationship.following,
        RelationshipKind::FollowRequested => relationship.requested,
        RelationshipKind::Muting => relationship.muting,
        RelationshipKind::MutingNotifications => relationship.muting_notifications,
        RelationshipKind::Blocking => relationship.blocking,
        RelationshipKind::DomainBlocking => relationship.domain_blocking,
        RelationshipKind::Endorsing => relationship.endorsing,
        RelationshipKind::ShowingReblogs => relationship.showing_reblogs,
        RelationshipKind::Notifying => relationship.notifying,
    }
}

fn ensure_same_server(auth: &AuthContext, domain: &str) -> Result<(), AppError> {
    if auth.domain == domain {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "record from {domain} cannot be changed through {}",
            auth.domain
        )))
    }
}

/// Host part of a remote account's `acct`; `None` for local accounts
fn account_domain(account: &Account) -> Option<String> {
    account
        .acct
        .split_once('@')
        .map(|(_, host)| host.to_ascii_lowercase())
}
