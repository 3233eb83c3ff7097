//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite entity store (reads)
//! - Write transactions behind a single write queue
//! - Change notifications
//! - Request-scoped merge cache

mod cache;
mod changes;
mod database;
mod diff;
mod models;
mod queries;
mod transaction;

pub use cache::MergeCache;
pub use changes::{ChangeFeed, ChangeSet, RecordRef};
pub use database::{Database, DatabaseOptions, StatusOrder, StatusQuery};
pub use models::*;
pub use transaction::Changes;
