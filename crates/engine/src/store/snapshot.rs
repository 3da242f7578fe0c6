use escriba_common::ids::{SnapshotId, WebpageId};
use escriba_common::types::{JobState, Snapshot, SnapshotResult, Strategy};
use uuid::Uuid;

use super::{StoreClient, StoreError};

impl StoreClient {
    /// Always inserts a new row, unlike `create_webpage`'s upsert — one
    /// snapshot per (webpage, strategy) attempt, not per (webpage, strategy)
    /// pair overall.
    pub async fn create_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO snapshot
                (id, created_at, webpage_id, strategy_code, job_state_code, modified_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(snapshot.id.0)
        .bind(snapshot.created_at)
        .bind(snapshot.webpage_id.0)
        .bind(snapshot.strategy.code())
        .bind(snapshot.job_state.as_db_str())
        .bind(snapshot.modified_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    pub async fn get_snapshot(&self, id: SnapshotId) -> Result<Snapshot, StoreError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "SELECT id, created_at, webpage_id, strategy_code, job_state_code,
                    modified_at, result, stdout, stderr
             FROM snapshot WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?
        .ok_or_else(|| StoreError::NotFound(format!("Snapshot {id}")))?;

        row.try_into()
    }

    /// Claim one `PENDING` snapshot. C8's only entry point onto a row.
    pub async fn claim_pending_snapshot(&self) -> Result<Option<Snapshot>, StoreError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "SELECT id, created_at, webpage_id, strategy_code, job_state_code,
                    modified_at, result, stdout, stderr
             FROM snapshot WHERE job_state_code = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(JobState::Pending.as_db_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        self.set_snapshot_state(SnapshotId::from_uuid(row.id), JobState::Executing)
            .await?;

        let mut snapshot: Snapshot = row.try_into()?;
        snapshot.job_state = JobState::Executing;
        Ok(Some(snapshot))
    }

    pub async fn set_snapshot_state(
        &self,
        id: SnapshotId,
        state: JobState,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE snapshot SET job_state_code = ?, modified_at = ? WHERE id = ?")
            .bind(state.as_db_str())
            .bind(chrono::Utc::now())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    /// Persist a terminal outcome together with its result/stdout/stderr —
    /// a snapshot's `result` is only ever written alongside a terminal
    /// state.
    pub async fn set_snapshot_result(
        &self,
        id: SnapshotId,
        state: JobState,
        result: &SnapshotResult,
        stdout: &str,
        stderr: &str,
    ) -> Result<(), StoreError> {
        let result_json = serde_json::to_string(result)
            .map_err(|e| StoreError::Query(format!("result serialization failed: {e}")))?;
        sqlx::query(
            "UPDATE snapshot
             SET job_state_code = ?, result = ?, stdout = ?, stderr = ?, modified_at = ?
             WHERE id = ?",
        )
        .bind(state.as_db_str())
        .bind(result_json)
        .bind(stdout)
        .bind(stderr)
        .bind(chrono::Utc::now())
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    pub async fn bulk_update_snapshot_state(
        &self,
        old: JobState,
        new: JobState,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE snapshot SET job_state_code = ?, modified_at = ? WHERE job_state_code = ?",
        )
        .bind(new.as_db_str())
        .bind(chrono::Utc::now())
        .bind(old.as_db_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// `SUCCEEDED` `title` snapshots whose parent webpage's title is still
    /// NULL. Newest-first; idempotent once the parent column is set.
    pub async fn listmany_snapshots_ready_for_title_update(
        &self,
        limit: i64,
    ) -> Result<Vec<Snapshot>, StoreError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            "SELECT s.id, s.created_at, s.webpage_id, s.strategy_code, s.job_state_code,
                    s.modified_at, s.result, s.stdout, s.stderr
             FROM snapshot s
             JOIN webpage w ON w.id = s.webpage_id
             WHERE s.job_state_code = ? AND s.strategy_code = ? AND w.title IS NULL
             ORDER BY s.created_at DESC
             LIMIT ?",
        )
        .bind(JobState::Succeeded.as_db_str())
        .bind(Strategy::Title.code())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// `SUCCEEDED` `archivedotorg` snapshots with `result.rc == 0` whose
    /// parent webpage's `internet_archive_url` is still NULL.
    pub async fn listmany_snapshots_ready_for_archivedotorg_update(
        &self,
        limit: i64,
    ) -> Result<Vec<Snapshot>, StoreError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            "SELECT s.id, s.created_at, s.webpage_id, s.strategy_code, s.job_state_code,
                    s.modified_at, s.result, s.stdout, s.stderr
             FROM snapshot s
             JOIN webpage w ON w.id = s.webpage_id
             WHERE s.job_state_code = ? AND s.strategy_code = ?
               AND w.internet_archive_url IS NULL
               AND json_extract(s.result, '$.rc') = 0
             ORDER BY s.created_at DESC
             LIMIT ?",
        )
        .bind(JobState::Succeeded.as_db_str())
        .bind(Strategy::ArchiveDotOrg.code())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
pub struct SnapshotRow {
    id: Uuid,
    created_at: chrono::DateTime<chrono::Utc>,
    webpage_id: Uuid,
    strategy_code: i32,
    job_state_code: String,
    modified_at: Option<chrono::DateTime<chrono::Utc>>,
    result: Option<String>,
    stdout: Option<String>,
    stderr: Option<String>,
}

impl TryFrom<SnapshotRow> for Snapshot {
    type Error = StoreError;

    fn try_from(row: SnapshotRow) -> Result<Self, StoreError> {
        let strategy = Strategy::from_code(row.strategy_code)
            .ok_or_else(|| StoreError::Query(format!("unknown strategy code {}", row.strategy_code)))?;
        let result = row
            .result
            .map(|raw| {
                serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Query(format!("stored result failed to parse: {e}")))
            })
            .transpose()?;

        Ok(Self {
            id: SnapshotId::from_uuid(row.id),
            created_at: row.created_at,
            webpage_id: WebpageId::from_uuid(row.webpage_id),
            strategy,
            job_state: JobState::from_db_str(&row.job_state_code),
            modified_at: row.modified_at,
            result,
            stdout: row.stdout,
            stderr: row.stderr,
        })
    }
}
