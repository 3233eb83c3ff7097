//! Pending follow-request refresh
//!
//! Following a locked account leaves the relationship `requested` until
//! the other side answers. This polls the relationship with a doubling
//! delay and merges every answer, stopping when the request is resolved or
//! the attempts run out. It is a convenience refresh; nothing depends on it
//! finishing.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::merge::{MergeContext, MergeResolver};
use crate::data::{Database, EntityKey, MergeCache, Relationship};
use crate::error::AppError;
use crate::remote::{RemoteApi, Session};

/// Delay schedule for re-polling a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            max_attempts: 8,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

pub struct FollowRequestPoller<R, S> {
    db: Arc<Database>,
    remote: Arc<R>,
    session: Arc<S>,
    policy: RetryPolicy,
}

impl<R, S> FollowRequestPoller<R, S>
where
    R: RemoteApi + 'static,
    S: Session + 'static,
{
    pub fn new(db: Arc<Database>, remote: Arc<R>, session: Arc<S>, policy: RetryPolicy) -> Self {
        Self {
            db,
            remote,
            session,
            policy,
        }
    }

    /// Poll until `target_id` is no longer pending.
    ///
    /// Returns the stored relationship after the last attempt. Failed
    /// fetches are logged and retried.
    pub async fn await_resolution(&self, target_id: &str) -> Result<Relationship, AppError> {
        let auth = self
            .session
            .current()
            .ok_or(AppError::AuthenticationMissing)?;
        let actor = self
            .db
            .account_by_key(&EntityKey::new(&auth.domain, &auth.user_id))
            .await?
            .ok_or_else(|| {
                AppError::invariant(format!(
                    "acting account {}@{} is not stored",
                    auth.user_id, auth.domain
                ))
            })?;
        let target = self.db.account(target_id).await?.ok_or(AppError::NotFound)?;

        for attempt in 0..self.policy.max_attempts {
            tokio::time::sleep(self.policy.delay(attempt)).await;

            let response = match self.remote.relationship(&auth, &target.remote_id).await {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(
                        target = %target.id,
                        attempt,
                        %error,
                        "Follow request refresh failed"
                    );
                    continue;
                }
            };

            let mut changes = self.db.begin_changes().await?;
            let mut cache = MergeCache::new();
            let ctx = MergeContext::for_actor(&auth, response.network_date);
            MergeResolver::merge_relationship(&mut changes, &ctx, &mut cache, &response.value)
                .await?;
            changes.commit().await?;

            if !response.value.requested {
                tracing::info!(
                    target = %target.id,
                    following = response.value.following,
                    "Follow request resolved"
                );
                break;
            }
        }

        self.db.relationship(&actor.id, &target.id).await
    }

    /// Run [`Self::await_resolution`] in the background
    pub fn watch(self: &Arc<Self>, target_id: &str) -> JoinHandle<Result<Relationship, AppError>> {
        let poller = Arc::clone(self);
        let target_id = target_id.to_string();
        tokio::spawn(async move { poller.await_resolution(&target_id).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_up_to_the_cap() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            max_attempts: 10,
        };
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(policy.delay(3), Duration::from_millis(500));
        assert_eq!(policy.delay(40), Duration::from_millis(500));
    }
}
