//! Persistence contract for partitions and items.
//!
//! [`Repo`] is a capability set, not a schema: any store supporting
//! conditional (version-predicated) updates can implement it. Two
//! implementations ship with the crate, [`PgRepo`] for production and
//! [`SqliteRepo`] for local mode and tests; both speak the same table
//! layout through sqlx.
//!
//! The save methods return `bool` rather than `Result`: a `false` return is
//! a *stale write* (the stored version moved underneath the caller because a
//! lease was stolen or a concurrent update landed first) and is an expected
//! coordination signal, not a fatal error. Database errors on save are
//! logged and reported the same way, since the caller's reaction is
//! identical: relinquish and move on.

mod postgres;
mod sqlite;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Item, Partition, Status};

pub use postgres::PgRepo;
pub use sqlite::SqliteRepo;

/// Deadline applied to every repository query, in addition to any caller
/// cancellation.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid table prefix {0:?}: only ASCII alphanumerics and underscores are allowed")]
    InvalidTablePrefix(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Callback executed inside [`Repo::transaction`]. The handle it receives
/// routes every operation through the same database transaction and must not
/// be retained past the callback's completion.
pub type TxFunc =
    Box<dyn FnOnce(Arc<dyn Repo>) -> BoxFuture<'static, RepoResult<()>> + Send>;

#[async_trait]
pub trait Repo: Send + Sync {
    /// Idempotent schema creation; safe to invoke at every startup.
    async fn migrate(&self) -> RepoResult<()>;

    /// Conditionally persist the partition against its current version.
    /// Returns false on a stale write; the in-memory version is unchanged.
    /// On success the in-memory version is bumped by exactly one.
    async fn save_partition(&self, partition: &mut Partition) -> bool;

    /// As [`Repo::save_partition`], for items.
    async fn save_item(&self, item: &mut Item) -> bool;

    /// All partitions eligible for lease acquisition: not `Complete` and
    /// with an expired lease window.
    async fn potential_leases(&self) -> RepoResult<Vec<Partition>>;

    /// Up to `limit` available items at the partition's current gate,
    /// oldest-ready first.
    async fn available_items(&self, partition: &Partition, limit: i64) -> RepoResult<Vec<Item>>;

    /// Item counts for the partition grouped by status, across all gates.
    async fn count_by_status(&self, partition_id: &str) -> RepoResult<HashMap<Status, i64>>;

    /// The smallest gate at which the partition still holds an available
    /// item, if any. Guards gate advancement against items stranded below
    /// the barrier and against zero-budget polls.
    async fn min_available_gate(&self, partition_id: &str) -> RepoResult<Option<i64>>;

    /// Run `f` within a database transaction; commit on `Ok`, roll back on
    /// `Err`. Transactions do not nest: calling this on the handle passed to
    /// `f` is an error.
    async fn transaction(&self, f: TxFunc) -> RepoResult<()>;

    /// Liveness probe of the underlying store.
    async fn healthcheck(&self) -> RepoResult<()>;
}

/// Resolved table names for one repository instance.
#[derive(Debug, Clone)]
pub(crate) struct Tables {
    pub partitions: String,
    pub items: String,
}

impl Tables {
    pub fn new(prefix: &str) -> RepoResult<Self> {
        if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(RepoError::InvalidTablePrefix(prefix.to_string()));
        }
        Ok(Self {
            partitions: format!("{prefix}partitions"),
            items: format!("{prefix}items"),
        })
    }
}

/// Collapse a save outcome into the bool contract, logging the reason for
/// any false return.
pub(crate) fn settle_save(kind: &'static str, id: &str, result: RepoResult<bool>) -> bool {
    match result {
        Ok(true) => true,
        Ok(false) => {
            debug!(entity = kind, id = %id, "stale write; stored version moved underneath us");
            false
        }
        Err(err) => {
            warn!(entity = kind, id = %id, error = %err, "error saving entity");
            false
        }
    }
}

/// Apply the repository deadline to a query future.
pub(crate) async fn timed<T>(
    timeout: Duration,
    fut: impl std::future::Future<Output = Result<T, sqlx::Error>>,
) -> RepoResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(RepoError::Timeout(timeout)),
    }
}
