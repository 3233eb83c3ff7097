//! Poll vote guard
//!
//! One vote per actor per poll. A local vote is recorded before the server
//! is asked and stays in place if the server call fails; the next fetch of
//! the poll replaces it either way. A vote counts as submitted once a merged
//! server answer lists it among the actor's own votes.

use std::sync::Arc;

use chrono::Utc;

use super::merge::{MergeContext, MergeResolver};
use crate::data::{Database, EntityKey, MergeCache, Poll};
use crate::error::AppError;
use crate::remote::{AuthContext, RemoteApi, Session};

/// Where the actor stands with a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    Eligible,
    Expired,
    /// A local vote exists; the server has not confirmed it yet
    AlreadyVotedLocally,
    /// The server accepted the vote
    Submitted,
}

/// Poll as merged from the server's answer to a vote
#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub poll: Poll,
    pub state: VoteState,
}

impl VoteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eligible => "eligible",
            Self::Expired => "expired",
            Self::AlreadyVotedLocally => "already_voted_locally",
            Self::Submitted => "submitted",
        }
    }
}

pub struct PollVoteGuard<R, S> {
    db: Arc<Database>,
    remote: Arc<R>,
    session: Arc<S>,
}

impl<R, S> PollVoteGuard<R, S>
where
    R: RemoteApi,
    S: Session,
{
    pub fn new(db: Arc<Database>, remote: Arc<R>, session: Arc<S>) -> Self {
        Self {
            db,
            remote,
            session,
        }
    }

    fn auth(&self) -> Result<AuthContext, AppError> {
        self.session.current().ok_or(AppError::AuthenticationMissing)
    }

    async fn actor_id(&self, auth: &AuthContext) -> Result<String, AppError> {
        let key = EntityKey::new(&auth.domain, &auth.user_id);
        match self.db.account_by_key(&key).await? {
            Some(account) => Ok(account.id),
            None => Err(AppError::invariant(format!(
                "acting account {}@{} is not stored",
                auth.user_id, auth.domain
            ))),
        }
    }

    /// Current state for the signed-in actor, without changing anything
    pub async fn state(&self, poll_id: &str) -> Result<VoteState, AppError> {
        let auth = self.auth()?;
        let actor_id = self.actor_id(&auth).await?;
        let poll = self.db.poll(poll_id).await?.ok_or(AppError::NotFound)?;

        if poll.is_closed_at(Utc::now()) {
            return Ok(VoteState::Expired);
        }
        self.vote_state(poll_id, &actor_id).await
    }

    /// State of an open poll, from the stored votes alone
    async fn vote_state(&self, poll_id: &str, actor_id: &str) -> Result<VoteState, AppError> {
        if self.db.vote_confirmed(poll_id, actor_id).await? {
            return Ok(VoteState::Submitted);
        }
        if !self.db.voted_options(poll_id, actor_id).await?.is_empty() {
            return Ok(VoteState::AlreadyVotedLocally);
        }
        Ok(VoteState::Eligible)
    }

    /// Record the actor's choices locally.
    ///
    /// A poll past its expiry is marked expired (and stays so) before
    /// `PollExpired` is returned. Any existing vote by the actor, whatever
    /// the choices, fails with `AlreadyVoted`.
    pub async fn cast_vote_locally(
        &self,
        poll_id: &str,
        choices: &[usize],
    ) -> Result<VoteState, AppError> {
        let auth = self.auth()?;
        let actor_id = self.actor_id(&auth).await?;

        let mut changes = self.db.begin_changes().await?;
        let poll = changes.poll_by_id(poll_id).await?.ok_or(AppError::NotFound)?;
        let now = Utc::now();

        if poll.is_closed_at(now) {
            if changes.mark_poll_expired(&poll.id).await? {
                tracing::info!(poll = %poll.id, "Poll passed its expiry; marked expired");
            }
            changes.commit().await?;
            crate::metrics::POLL_VOTES_TOTAL
                .with_label_values(&[VoteState::Expired.as_str()])
                .inc();
            return Err(AppError::PollExpired);
        }

        if !changes
            .voted_option_indices(&poll.id, &actor_id)
            .await?
            .is_empty()
        {
            crate::metrics::POLL_VOTES_TOTAL
                .with_label_values(&[VoteState::AlreadyVotedLocally.as_str()])
                .inc();
            return Err(AppError::AlreadyVoted);
        }

        let options = changes.poll_options(&poll.id).await?;
        validate_choices(&poll, options.len(), choices)?;

        for option in &options {
            let chosen = choices.contains(&(option.option_index as usize));
            changes
                .set_poll_vote(&option.id, &actor_id, chosen, false)
                .await?;
        }
        changes.touch_poll(&poll.id, now).await?;
        changes.commit().await?;

        tracing::debug!(poll = %poll.id, ?choices, "Recorded local vote");
        Ok(VoteState::AlreadyVotedLocally)
    }

    /// Vote locally, then submit to the server and merge its answer.
    ///
    /// The local vote is kept when the server call fails. If the poll's
    /// expiry has passed by then, it is marked expired and `PollExpired` is
    /// returned instead of the server's error. On success the state is
    /// `Submitted`, unless the merged answer did not carry the actor's votes.
    pub async fn vote(&self, poll_id: &str, choices: &[usize]) -> Result<VoteOutcome, AppError> {
        let auth = self.auth()?;
        let actor_id = self.actor_id(&auth).await?;
        let poll = self.db.poll(poll_id).await?.ok_or(AppError::NotFound)?;
        if poll.domain != auth.domain {
            return Err(AppError::BadRequest(format!(
                "poll from {} cannot be voted on through {}",
                poll.domain, auth.domain
            )));
        }

        self.cast_vote_locally(poll_id, choices).await?;

        let response = match self.remote.vote(&auth, &poll.remote_id, choices).await {
            Ok(response) => response,
            Err(error) => {
                let error: AppError = error.into();
                tracing::warn!(poll = %poll.id, %error, "Vote submission failed");
                crate::metrics::POLL_VOTES_TOTAL
                    .with_label_values(&["failed"])
                    .inc();

                if poll.expires_at.is_some_and(|expires_at| Utc::now() > expires_at) {
                    let mut changes = self.db.begin_changes().await?;
                    changes.mark_poll_expired(&poll.id).await?;
                    changes.commit().await?;
                    return Err(AppError::PollExpired);
                }
                return Err(error);
            }
        };

        let mut changes = self.db.begin_changes().await?;
        let mut cache = MergeCache::new();
        let ctx = MergeContext::for_actor(&auth, response.network_date);
        let merged = MergeResolver::merge_poll(
            &mut changes,
            &ctx,
            &mut cache,
            &response.value,
            &poll.status_id,
        )
        .await?;
        changes.commit().await?;

        let state = self.vote_state(&poll.id, &actor_id).await?;
        crate::metrics::POLL_VOTES_TOTAL
            .with_label_values(&[state.as_str()])
            .inc();
        tracing::info!(poll = %poll.id, state = state.as_str(), "Vote submitted");

        let poll = match merged {
            Some(merged) => merged.record,
            None => poll,
        };
        Ok(VoteOutcome { poll, state })
    }
}

fn validate_choices(poll: &Poll, option_count: usize, choices: &[usize]) -> Result<(), AppError> {
    if choices.is_empty() {
        return Err(AppError::BadRequest("no poll option chosen".to_string()));
    }
    if let Some(choice) = choices.iter().find(|choice| **choice >= option_count) {
        return Err(AppError::BadRequest(format!(
            "poll option {choice} does not exist"
        )));
    }
    if !poll.multiple && choices.len() > 1 {
        return Err(AppError::BadRequest(
            "poll accepts a single choice".to_string(),
        ));
    }
    Ok(())
}
