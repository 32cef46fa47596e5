//! Embedded SQLite repository, used for local mode and tests.
//!
//! Same contract and table layout as the Postgres backend, over a file (or
//! in-memory) database. WAL journaling plus a busy timeout keep concurrent
//! workers on one file from tripping over SQLITE_BUSY during short write
//! bursts.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::SqliteConnection;
use tokio::sync::Mutex;
use tracing::warn;

use crate::model::{Item, Partition, Status};

use super::{timed, Repo, RepoError, RepoResult, Tables, TxFunc, DEFAULT_QUERY_TIMEOUT};

/// SQLite-backed [`Repo`].
pub struct SqliteRepo {
    pool: SqlitePool,
    tables: Tables,
    timeout: Duration,
}

impl SqliteRepo {
    /// Open (creating if missing) a database file with WAL journaling and a
    /// busy timeout suited to multiple local workers.
    pub async fn open(path: impl AsRef<Path>, table_prefix: &str) -> RepoResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        Self::connect_with(options, table_prefix).await
    }

    pub async fn connect_with(
        options: SqliteConnectOptions,
        table_prefix: &str,
    ) -> RepoResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;
        Self::with_pool(pool, table_prefix)
    }

    pub fn with_pool(pool: SqlitePool, table_prefix: &str) -> RepoResult<Self> {
        Ok(Self {
            pool,
            tables: Tables::new(table_prefix)?,
            timeout: DEFAULT_QUERY_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch one partition by id. Not part of the worker contract; used by
    /// operators and tests inspecting final state.
    pub async fn get_partition(&self, id: &str) -> RepoResult<Option<Partition>> {
        let mut conn = self.pool.acquire().await?;
        timed(self.timeout, queries::get_partition(&mut conn, &self.tables, id)).await
    }

    /// Fetch one item by id. See [`SqliteRepo::get_partition`].
    pub async fn get_item(&self, id: &str) -> RepoResult<Option<Item>> {
        let mut conn = self.pool.acquire().await?;
        timed(self.timeout, queries::get_item(&mut conn, &self.tables, id)).await
    }
}

#[async_trait]
impl Repo for SqliteRepo {
    async fn migrate(&self) -> RepoResult<()> {
        let mut conn = self.pool.acquire().await?;
        timed(self.timeout, queries::migrate(&mut conn, &self.tables)).await
    }

    async fn save_partition(&self, partition: &mut Partition) -> bool {
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(partition_id = %partition.id, error = %err, "could not acquire connection");
                return false;
            }
        };
        let result = timed(
            self.timeout,
            queries::save_partition(&mut conn, &self.tables, partition),
        )
        .await;
        super::settle_save("partition", &partition.id, result)
    }

    async fn save_item(&self, item: &mut Item) -> bool {
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(item_id = %item.id, error = %err, "could not acquire connection");
                return false;
            }
        };
        let result = timed(self.timeout, queries::save_item(&mut conn, &self.tables, item)).await;
        super::settle_save("item", &item.id, result)
    }

    async fn potential_leases(&self) -> RepoResult<Vec<Partition>> {
        let mut conn = self.pool.acquire().await?;
        timed(self.timeout, queries::potential_leases(&mut conn, &self.tables)).await
    }

    async fn available_items(&self, partition: &Partition, limit: i64) -> RepoResult<Vec<Item>> {
        let mut conn = self.pool.acquire().await?;
        timed(
            self.timeout,
            queries::available_items(&mut conn, &self.tables, partition, limit),
        )
        .await
    }

    async fn count_by_status(&self, partition_id: &str) -> RepoResult<HashMap<Status, i64>> {
        let mut conn = self.pool.acquire().await?;
        timed(
            self.timeout,
            queries::count_by_status(&mut conn, &self.tables, partition_id),
        )
        .await
    }

    async fn min_available_gate(&self, partition_id: &str) -> RepoResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        timed(
            self.timeout,
            queries::min_available_gate(&mut conn, &self.tables, partition_id),
        )
        .await
    }

    async fn transaction(&self, f: TxFunc) -> RepoResult<()> {
        let tx = self.pool.begin().await?;
        let tx_repo = Arc::new(SqliteTxRepo {
            tx: Mutex::new(tx),
            tables: self.tables.clone(),
            timeout: self.timeout,
        });
        let handle: Arc<dyn Repo> = Arc::clone(&tx_repo) as Arc<dyn Repo>;
        let result = f(handle).await;
        let tx_repo = Arc::try_unwrap(tx_repo).map_err(|_| {
            RepoError::Message("transaction handle retained beyond the callback".to_string())
        })?;
        let tx = tx_repo.tx.into_inner();
        match result {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn healthcheck(&self) -> RepoResult<()> {
        let mut conn = self.pool.acquire().await?;
        timed(self.timeout, queries::ping(&mut conn)).await
    }
}

/// Repository view routed through one open transaction.
struct SqliteTxRepo {
    tx: Mutex<sqlx::Transaction<'static, sqlx::Sqlite>>,
    tables: Tables,
    timeout: Duration,
}

#[async_trait]
impl Repo for SqliteTxRepo {
    async fn migrate(&self) -> RepoResult<()> {
        let mut tx = self.tx.lock().await;
        timed(self.timeout, queries::migrate(&mut tx, &self.tables)).await
    }

    async fn save_partition(&self, partition: &mut Partition) -> bool {
        let mut tx = self.tx.lock().await;
        let result = timed(
            self.timeout,
            queries::save_partition(&mut tx, &self.tables, partition),
        )
        .await;
        super::settle_save("partition", &partition.id, result)
    }

    async fn save_item(&self, item: &mut Item) -> bool {
        let mut tx = self.tx.lock().await;
        let result = timed(self.timeout, queries::save_item(&mut tx, &self.tables, item)).await;
        super::settle_save("item", &item.id, result)
    }

    async fn potential_leases(&self) -> RepoResult<Vec<Partition>> {
        let mut tx = self.tx.lock().await;
        timed(self.timeout, queries::potential_leases(&mut tx, &self.tables)).await
    }

    async fn available_items(&self, partition: &Partition, limit: i64) -> RepoResult<Vec<Item>> {
        let mut tx = self.tx.lock().await;
        timed(
            self.timeout,
            queries::available_items(&mut tx, &self.tables, partition, limit),
        )
        .await
    }

    async fn count_by_status(&self, partition_id: &str) -> RepoResult<HashMap<Status, i64>> {
        let mut tx = self.tx.lock().await;
        timed(
            self.timeout,
            queries::count_by_status(&mut tx, &self.tables, partition_id),
        )
        .await
    }

    async fn min_available_gate(&self, partition_id: &str) -> RepoResult<Option<i64>> {
        let mut tx = self.tx.lock().await;
        timed(
            self.timeout,
            queries::min_available_gate(&mut tx, &self.tables, partition_id),
        )
        .await
    }

    async fn transaction(&self, _f: TxFunc) -> RepoResult<()> {
        Err(RepoError::Message(
            "nested transactions are not supported".to_string(),
        ))
    }

    async fn healthcheck(&self) -> RepoResult<()> {
        let mut tx = self.tx.lock().await;
        timed(self.timeout, queries::ping(&mut tx)).await
    }
}

mod queries {
    use sqlx::Executor;

    use super::*;

    pub async fn migrate(conn: &mut SqliteConnection, tables: &Tables) -> Result<(), sqlx::Error> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {partitions} (
                id TEXT PRIMARY KEY,
                version INTEGER NOT NULL DEFAULT 0,
                gate INTEGER NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 1,
                owner TEXT NOT NULL DEFAULT '',
                until TEXT NOT NULL DEFAULT '1970-01-01T00:00:00+00:00',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_{partitions}_lease
                ON {partitions}(status, until);

            CREATE TABLE IF NOT EXISTS {items} (
                id TEXT PRIMARY KEY,
                version INTEGER NOT NULL DEFAULT 0,
                partition_id TEXT NOT NULL,
                gate INTEGER NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 1,
                retry_count INTEGER NOT NULL DEFAULT 0,
                error_messages TEXT NOT NULL DEFAULT '',
                data BLOB NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_{items}_feed
                ON {items}(partition_id, status, gate, updated_at);
            "#,
            partitions = tables.partitions,
            items = tables.items,
        );
        // Multiple statements in one batch go through the unprepared path.
        conn.execute(ddl.as_str()).await?;
        Ok(())
    }

    pub async fn save_partition(
        conn: &mut SqliteConnection,
        tables: &Tables,
        partition: &mut Partition,
    ) -> Result<bool, sqlx::Error> {
        let now = Utc::now();
        let next_version = partition.version + 1;
        let update = format!(
            "UPDATE {} SET gate = ?, status = ?, owner = ?, until = ?, version = ?, updated_at = ? \
             WHERE id = ? AND version = ?",
            tables.partitions
        );
        let result = sqlx::query(&update)
            .bind(partition.gate)
            .bind(partition.status)
            .bind(&partition.owner)
            .bind(partition.until)
            .bind(next_version)
            .bind(now)
            .bind(&partition.id)
            .bind(partition.version)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 1 {
            partition.version = next_version;
            partition.updated_at = now;
            return Ok(true);
        }

        let insert = format!(
            "INSERT INTO {} (id, version, gate, status, owner, until, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            tables.partitions
        );
        match sqlx::query(&insert)
            .bind(&partition.id)
            .bind(next_version)
            .bind(partition.gate)
            .bind(partition.status)
            .bind(&partition.owner)
            .bind(partition.until)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await
        {
            Ok(_) => {
                partition.version = next_version;
                partition.created_at = now;
                partition.updated_at = now;
                Ok(true)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn save_item(
        conn: &mut SqliteConnection,
        tables: &Tables,
        item: &mut Item,
    ) -> Result<bool, sqlx::Error> {
        let now = Utc::now();
        let next_version = item.version + 1;
        let update = format!(
            "UPDATE {} SET partition_id = ?, gate = ?, status = ?, retry_count = ?, \
             error_messages = ?, data = ?, version = ?, updated_at = ? \
             WHERE id = ? AND version = ?",
            tables.items
        );
        let result = sqlx::query(&update)
            .bind(&item.partition_id)
            .bind(item.gate)
            .bind(item.status)
            .bind(item.retry_count)
            .bind(&item.error_messages)
            .bind(&item.data)
            .bind(next_version)
            .bind(now)
            .bind(&item.id)
            .bind(item.version)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 1 {
            item.version = next_version;
            item.updated_at = now;
            return Ok(true);
        }

        let insert = format!(
            "INSERT INTO {} (id, version, partition_id, gate, status, retry_count, \
             error_messages, data, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            tables.items
        );
        match sqlx::query(&insert)
            .bind(&item.id)
            .bind(next_version)
            .bind(&item.partition_id)
            .bind(item.gate)
            .bind(item.status)
            .bind(item.retry_count)
            .bind(&item.error_messages)
            .bind(&item.data)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await
        {
            Ok(_) => {
                item.version = next_version;
                item.created_at = now;
                item.updated_at = now;
                Ok(true)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn potential_leases(
        conn: &mut SqliteConnection,
        tables: &Tables,
    ) -> Result<Vec<Partition>, sqlx::Error> {
        let sql = format!(
            "SELECT id, version, gate, status, owner, until, created_at, updated_at \
             FROM {} WHERE status <> ? AND until < ?",
            tables.partitions
        );
        sqlx::query_as(&sql)
            .bind(Status::Complete)
            .bind(Utc::now())
            .fetch_all(&mut *conn)
            .await
    }

    pub async fn available_items(
        conn: &mut SqliteConnection,
        tables: &Tables,
        partition: &Partition,
        limit: i64,
    ) -> Result<Vec<Item>, sqlx::Error> {
        let sql = format!(
            "SELECT id, version, partition_id, gate, status, retry_count, error_messages, \
             data, created_at, updated_at \
             FROM {} WHERE partition_id = ? AND status = ? AND gate = ? \
             ORDER BY updated_at ASC LIMIT ?",
            tables.items
        );
        sqlx::query_as(&sql)
            .bind(&partition.id)
            .bind(Status::Available)
            .bind(partition.gate)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await
    }

    pub async fn count_by_status(
        conn: &mut SqliteConnection,
        tables: &Tables,
        partition_id: &str,
    ) -> Result<HashMap<Status, i64>, sqlx::Error> {
        let sql = format!(
            "SELECT status, COUNT(*) FROM {} WHERE partition_id = ? GROUP BY status",
            tables.items
        );
        let rows: Vec<(Status, i64)> = sqlx::query_as(&sql)
            .bind(partition_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn min_available_gate(
        conn: &mut SqliteConnection,
        tables: &Tables,
        partition_id: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        let sql = format!(
            "SELECT MIN(gate) FROM {} WHERE partition_id = ? AND status = ?",
            tables.items
        );
        sqlx::query_scalar(&sql)
            .bind(partition_id)
            .bind(Status::Available)
            .fetch_one(&mut *conn)
            .await
    }

    pub async fn get_partition(
        conn: &mut SqliteConnection,
        tables: &Tables,
        id: &str,
    ) -> Result<Option<Partition>, sqlx::Error> {
        let sql = format!(
            "SELECT id, version, gate, status, owner, until, created_at, updated_at \
             FROM {} WHERE id = ?",
            tables.partitions
        );
        sqlx::query_as(&sql).bind(id).fetch_optional(&mut *conn).await
    }

    pub async fn get_item(
        conn: &mut SqliteConnection,
        tables: &Tables,
        id: &str,
    ) -> Result<Option<Item>, sqlx::Error> {
        let sql = format!(
            "SELECT id, version, partition_id, gate, status, retry_count, error_messages, \
             data, created_at, updated_at \
             FROM {} WHERE id = ?",
            tables.items
        );
        sqlx::query_as(&sql).bind(id).fetch_optional(&mut *conn).await
    }

    pub async fn ping(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    async fn test_repo() -> (SqliteRepo, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let repo = SqliteRepo::open(dir.path().join("test.db"), "test_")
            .await
            .expect("open repo");
        repo.migrate().await.expect("migrate");
        (repo, dir)
    }

    #[tokio::test]
    async fn save_creates_then_updates_with_version_bumps() {
        let (repo, _dir) = test_repo().await;

        let mut p = Partition::new("p1");
        assert!(repo.save_partition(&mut p).await);
        assert_eq!(p.version, 1);

        let stored = repo.get_partition("p1").await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.status, Status::Available);

        let mut p = stored;
        p.gate = 2;
        assert!(repo.save_partition(&mut p).await);
        assert_eq!(p.version, 2);
        let stored = repo.get_partition("p1").await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.gate, 2);
    }

    #[tokio::test]
    async fn stale_save_returns_false_and_leaves_version_alone() {
        let (repo, _dir) = test_repo().await;

        let mut original = Partition::new("p1");
        assert!(repo.save_partition(&mut original).await);

        let mut stale = repo.get_partition("p1").await.unwrap().unwrap();
        // Someone else advances the row first.
        let mut winner = stale.clone();
        winner.owner = "other".to_string();
        assert!(repo.save_partition(&mut winner).await);

        stale.owner = "me".to_string();
        assert!(!repo.save_partition(&mut stale).await);
        assert_eq!(stale.version, 1);

        let stored = repo.get_partition("p1").await.unwrap().unwrap();
        assert_eq!(stored.owner, "other");
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn duplicate_create_is_a_stale_write() {
        let (repo, _dir) = test_repo().await;

        let mut first = Item::new("s1", "p1", b"{}".to_vec());
        assert!(repo.save_item(&mut first).await);

        let mut duplicate = Item::new("s1", "p1", b"{}".to_vec());
        assert!(!repo.save_item(&mut duplicate).await);
        assert_eq!(duplicate.version, 0);
    }

    #[tokio::test]
    async fn potential_leases_filters_complete_and_unexpired() {
        let (repo, _dir) = test_repo().await;

        let mut open = Partition::new("open");
        assert!(repo.save_partition(&mut open).await);

        let mut done = Partition::new("done");
        done.status = Status::Complete;
        assert!(repo.save_partition(&mut done).await);

        let mut held = Partition::new("held");
        held.until = Utc::now() + StdDuration::from_secs(300);
        assert!(repo.save_partition(&mut held).await);

        let mut failed = Partition::new("failed");
        failed.status = Status::Failed;
        assert!(repo.save_partition(&mut failed).await);

        let mut leases = repo.potential_leases().await.unwrap();
        leases.sort_by(|a, b| a.id.cmp(&b.id));
        let ids: Vec<&str> = leases.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["failed", "open"]);
    }

    #[tokio::test]
    async fn available_items_respects_gate_status_order_and_limit() {
        let (repo, _dir) = test_repo().await;

        let mut partition = Partition::new("p1");
        assert!(repo.save_partition(&mut partition).await);

        let mut a = Item::new("a", "p1", b"{}".to_vec());
        assert!(repo.save_item(&mut a).await);
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        let mut b = Item::new("b", "p1", b"{}".to_vec());
        assert!(repo.save_item(&mut b).await);
        tokio::time::sleep(StdDuration::from_millis(10)).await;

        let mut gated = Item::new("gated", "p1", b"{}".to_vec());
        gated.gate = 1;
        assert!(repo.save_item(&mut gated).await);

        let mut done = Item::new("done", "p1", b"{}".to_vec());
        done.status = Status::Complete;
        assert!(repo.save_item(&mut done).await);

        let mut elsewhere = Item::new("elsewhere", "p2", b"{}".to_vec());
        assert!(repo.save_item(&mut elsewhere).await);

        let items = repo.available_items(&partition, 10).await.unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        // Re-saving "a" pushes it to the back of the ready order.
        let mut a = repo.get_item("a").await.unwrap().unwrap();
        assert!(repo.save_item(&mut a).await);
        let items = repo.available_items(&partition, 10).await.unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let items = repo.available_items(&partition, 1).await.unwrap();
        assert_eq!(items.len(), 1);

        let items = repo.available_items(&partition, 0).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn count_by_status_groups_across_gates() {
        let (repo, _dir) = test_repo().await;

        for (id, status, gate) in [
            ("s1", Status::Available, 0),
            ("s2", Status::Available, 3),
            ("s3", Status::Complete, 0),
            ("s4", Status::Failed, 1),
        ] {
            let mut item = Item::new(id, "p1", b"{}".to_vec());
            item.status = status;
            item.gate = gate;
            assert!(repo.save_item(&mut item).await);
        }

        let counts = repo.count_by_status("p1").await.unwrap();
        assert_eq!(counts.get(&Status::Available), Some(&2));
        assert_eq!(counts.get(&Status::Complete), Some(&1));
        assert_eq!(counts.get(&Status::Failed), Some(&1));

        let counts = repo.count_by_status("empty").await.unwrap();
        assert!(counts.is_empty());
    }

    #[tokio::test]
    async fn min_available_gate_ignores_terminal_items() {
        let (repo, _dir) = test_repo().await;

        assert_eq!(repo.min_available_gate("p1").await.unwrap(), None);

        let mut done = Item::new("done", "p1", b"{}".to_vec());
        done.status = Status::Complete;
        assert!(repo.save_item(&mut done).await);
        assert_eq!(repo.min_available_gate("p1").await.unwrap(), None);

        let mut high = Item::new("high", "p1", b"{}".to_vec());
        high.gate = 4;
        assert!(repo.save_item(&mut high).await);
        let mut low = Item::new("low", "p1", b"{}".to_vec());
        low.gate = 2;
        assert!(repo.save_item(&mut low).await);

        assert_eq!(repo.min_available_gate("p1").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn transaction_commits_on_ok() {
        let (repo, _dir) = test_repo().await;

        repo.transaction(Box::new(
            |tx: Arc<dyn Repo>| -> futures::future::BoxFuture<'static, RepoResult<()>> {
                Box::pin(async move {
                    let mut item = Item::new("s1", "p1", b"{}".to_vec());
                    assert!(tx.save_item(&mut item).await);
                    Ok(())
                })
            },
        ))
        .await
        .unwrap();

        assert!(repo.get_item("s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_error() {
        let (repo, _dir) = test_repo().await;

        let result = repo
            .transaction(Box::new(
                |tx: Arc<dyn Repo>| -> futures::future::BoxFuture<'static, RepoResult<()>> {
                    Box::pin(async move {
                        let mut item = Item::new("s2", "p1", b"{}".to_vec());
                        assert!(tx.save_item(&mut item).await);
                        Err(RepoError::Message("abort".to_string()))
                    })
                },
            ))
            .await;

        assert!(matches!(result, Err(RepoError::Message(_))));
        assert!(repo.get_item("s2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn healthcheck_succeeds_on_open_database() {
        let (repo, _dir) = test_repo().await;
        repo.healthcheck().await.unwrap();
    }
}
