//! Store access layer (C5). Owns the SQLite pool and all SQL; every other
//! engine module goes through `StoreClient`. Grounded on
//! `escriba/dao/*.py` for query shapes and on the teacher's
//! `engine/src/store/mod.rs` for the client/error skeleton.

mod snapshot;
mod transfer;
mod transfer_job;
mod webpage;
mod webpage_job;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use escriba_common::types::JobState;

pub use snapshot::SnapshotRow;
pub use transfer_job::TransferJobRow;
pub use webpage_job::WebpageJobRow;

/// SQLite client for the job-pipeline store. A single pool is shared by all
/// loops in the engine process; SQLite serializes writers internally so
/// `busy_timeout` (not a larger pool) is what buys concurrency headroom.
pub struct StoreClient {
    pool: SqlitePool,
}

impl StoreClient {
    /// Connect to SQLite and return a client with a connection pool.
    ///
    /// WAL journal mode and `synchronous=NORMAL` match the durability
    /// tradeoff the original process configured (`PRAGMA synchronous=1`);
    /// `busy_timeout` absorbs writer contention across the concurrent
    /// C6-C9 loops instead of surfacing `SQLITE_BUSY` to callers.
    pub async fn connect(db_uri: &str) -> Result<Self, StoreError> {
        tracing::info!("connecting to SQLite store");

        let options: SqliteConnectOptions = db_uri
            .parse()
            .map_err(|e: sqlx::Error| StoreError::Connection(e.to_string()))?;
        let options = options
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_millis(30_000));

        // A single connection, not a larger pool: SQLite serializes writers
        // internally, and a `:memory:` database is otherwise only visible to
        // the connection that created it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let client = Self { pool };
        client.health_check().await?;
        tracing::info!("SQLite store ready");

        Ok(client)
    }

    /// Verify the connection is alive.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    /// Run `PRAGMA optimize` before handing the pool back, then close it.
    pub async fn close(self) {
        if let Err(e) = sqlx::query("PRAGMA optimize").execute(&self.pool).await {
            tracing::warn!(error = %e, "PRAGMA optimize failed on shutdown");
        }
        self.pool.close().await;
    }

    /// Stand up the job-pipeline schema. The dashboard owns schema
    /// evolution in production; this lets the engine (and its tests) bring
    /// up a store on its own.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("src/store/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Crash recovery (spec.md §3 invariant 3): on process (re)start no job
    /// row may remain `EXECUTING`. Bulk-demote every job kind to `FAILED`
    /// before any loop touches the store.
    pub async fn recover_on_startup(&self) -> Result<(), StoreError> {
        let transfer_jobs = self
            .bulk_update_transfer_job_state(JobState::Executing, JobState::Failed)
            .await?;
        let webpage_jobs = self
            .bulk_update_webpage_job_state(JobState::Executing, JobState::Failed)
            .await?;
        let snapshots = self
            .bulk_update_snapshot_state(JobState::Executing, JobState::Failed)
            .await?;

        if transfer_jobs > 0 || webpage_jobs > 0 || snapshots > 0 {
            tracing::warn!(
                transfer_jobs,
                webpage_jobs,
                snapshots,
                "recovered orphaned EXECUTING rows from a previous crash"
            );
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite connection error: {0}")]
    Connection(String),

    #[error("SQLite query error: {0}")]
    Query(String),

    #[error("SQLite migration error: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StoreError> for escriba_common::EscribaError {
    fn from(e: StoreError) -> Self {
        escriba_common::EscribaError::Store(e.to_string())
    }
}
