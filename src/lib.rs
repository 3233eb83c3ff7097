//! fedisync - local-first sync and caching core for a Mastodon client
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Merge resolver (remote payload -> local records)         │
//! │  - Optimistic toggles with rollback                         │
//! │  - Feed pagination, poll voting, follow-request refresh     │
//! └─────────────────────────────────────────────────────────────┘
//!            │                                   │
//! ┌──────────────────────────────┐  ┌───────────────────────────┐
//! │          Data Layer           │  │     Remote collaborators  │
//! │  - SQLite (sqlx)              │  │  - RemoteApi (async)      │
//! │  - Serialised write queue     │  │  - Session                │
//! │  - Change notifications       │  │                           │
//! └──────────────────────────────┘  └───────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `service`: Sync logic
//! - `data`: Entity store, transactions and change feed
//! - `remote`: Server payloads and the API the engine calls
//! - `config`: Configuration management
//! - `telemetry`: Tracing setup
//! - `metrics`: Prometheus metrics
//! - `error`: Error types

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod remote;
pub mod service;
pub mod telemetry;

use std::sync::Arc;

use remote::{RemoteApi, Session};

/// Everything an embedding client needs, wired to one store
pub struct SyncEngine<R, S> {
    /// Engine configuration
    pub config: Arc<config::AppConfig>,

    db: Arc<data::Database>,
    mutations: service::MutationCoordinator<R, S>,
    feeds: service::FeedPaginator,
    polls: service::PollVoteGuard<R, S>,
    follow_requests: Arc<service::FollowRequestPoller<R, S>>,
}

impl<R, S> SyncEngine<R, S>
where
    R: RemoteApi + 'static,
    S: Session + 'static,
{
    /// Initialize the engine
    ///
    /// # Steps
    /// 1. Register metrics
    /// 2. Open (and migrate) the SQLite store
    /// 3. Build the services around it
    ///
    /// # Errors
    /// Returns error if the store cannot be opened or migrated
    pub async fn new(
        config: config::AppConfig,
        remote: Arc<R>,
        session: Arc<S>,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing sync engine...");

        metrics::init_metrics();

        let db = data::Database::connect_with_options(
            &config.database.path,
            config.database_options(),
        )
        .await?;
        let db = Arc::new(db);
        tracing::info!(path = %config.database.path.display(), "Database connected");

        let mutations =
            service::MutationCoordinator::new(db.clone(), remote.clone(), session.clone());
        let feeds = service::FeedPaginator::new(db.clone());
        let polls = service::PollVoteGuard::new(db.clone(), remote.clone(), session.clone());
        let follow_requests = Arc::new(service::FollowRequestPoller::new(
            db.clone(),
            remote,
            session,
            config.retry_policy(),
        ));

        tracing::info!("Sync engine initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            mutations,
            feeds,
            polls,
            follow_requests,
        })
    }

    pub fn db(&self) -> &Arc<data::Database> {
        &self.db
    }

    pub fn mutations(&self) -> &service::MutationCoordinator<R, S> {
        &self.mutations
    }

    pub fn feeds(&self) -> &service::FeedPaginator {
        &self.feeds
    }

    pub fn polls(&self) -> &service::PollVoteGuard<R, S> {
        &self.polls
    }

    pub fn follow_requests(&self) -> &Arc<service::FollowRequestPoller<R, S>> {
        &self.follow_requests
    }

    /// Close the store's connections
    pub async fn shutdown(&self) {
        self.db.close().await;
        tracing::info!("Sync engine shut down");
    }
}
