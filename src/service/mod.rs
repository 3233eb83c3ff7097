//! Service layer
//!
//! Sync logic on top of the data layer: merging remote payloads,
//! optimistic toggles, feed pagination and poll voting. Services talk to
//! servers only through [`crate::remote::RemoteApi`].

mod feed;
mod follow_request;
mod inflight;
mod merge;
mod mutation;
mod poll;

pub use feed::{FeedPaginator, IngestedPage};
pub use follow_request::{FollowRequestPoller, RetryPolicy};
pub use inflight::{InFlight, InFlightGuard, InFlightKey};
pub use merge::{MergeContext, MergeResolver, Merged, effective_status};
pub use mutation::{MutationCoordinator, RelationshipToggle, StatusToggle, ToggleQuery};
pub use poll::{PollVoteGuard, VoteOutcome, VoteState};
