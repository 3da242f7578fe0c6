use escriba_common::ids::{TransferId, TransferJobId};
use escriba_common::types::{JobState, TransferJob};
use uuid::Uuid;

use super::{StoreClient, StoreError};

impl StoreClient {
    pub async fn create_transfer_job(&self, job: &TransferJob) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO transfer_job (id, created_at, transfer_id, job_state_code, modified_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(job.id.0)
        .bind(job.created_at)
        .bind(job.transfer_id.0)
        .bind(job.job_state.as_db_str())
        .bind(job.modified_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    /// Claim one `PENDING` transfer job for this process: select it, then
    /// transition it to `EXECUTING` in the same call. C6's only entry point
    /// onto a row.
    pub async fn claim_pending_transfer_job(&self) -> Result<Option<TransferJob>, StoreError> {
        let row = sqlx::query_as::<_, TransferJobRow>(
            "SELECT id, created_at, transfer_id, job_state_code, modified_at
             FROM transfer_job WHERE job_state_code = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(JobState::Pending.as_db_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        self.set_transfer_job_state(TransferJobId::from_uuid(row.id), JobState::Executing)
            .await?;

        let mut job: TransferJob = row.into();
        job.job_state = JobState::Executing;
        Ok(Some(job))
    }

    pub async fn set_transfer_job_state(
        &self,
        id: TransferJobId,
        state: JobState,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE transfer_job SET job_state_code = ?, modified_at = ? WHERE id = ?",
        )
        .bind(state.as_db_str())
        .bind(chrono::Utc::now())
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    /// Bulk transition every row from `old` to `new`, regardless of id.
    /// Used at startup to recover orphaned `EXECUTING` rows into `FAILED`.
    pub async fn bulk_update_transfer_job_state(
        &self,
        old: JobState,
        new: JobState,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE transfer_job SET job_state_code = ?, modified_at = ? WHERE job_state_code = ?",
        )
        .bind(new.as_db_str())
        .bind(chrono::Utc::now())
        .bind(old.as_db_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
pub struct TransferJobRow {
    id: Uuid,
    created_at: chrono::DateTime<chrono::Utc>,
    transfer_id: Uuid,
    job_state_code: String,
    modified_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<TransferJobRow> for TransferJob {
    fn from(row: TransferJobRow) -> Self {
        Self {
            id: TransferJobId::from_uuid(row.id),
            created_at: row.created_at,
            transfer_id: TransferId::from_uuid(row.transfer_id),
            job_state: JobState::from_db_str(&row.job_state_code),
            modified_at: row.modified_at,
        }
    }
}
