use escriba_common::ids::{WebpageId, WebpageJobId};
use escriba_common::types::{JobState, WebpageJob};
use uuid::Uuid;

use super::{StoreClient, StoreError};

impl StoreClient {
    pub async fn create_webpage_job(&self, job: &WebpageJob) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO webpage_job (id, created_at, webpage_id, job_state_code, modified_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(job.id.0)
        .bind(job.created_at)
        .bind(job.webpage_id.0)
        .bind(job.job_state.as_db_str())
        .bind(job.modified_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    /// Claim one `PENDING` webpage job. C7's only entry point onto a row.
    pub async fn claim_pending_webpage_job(&self) -> Result<Option<WebpageJob>, StoreError> {
        let row = sqlx::query_as::<_, WebpageJobRow>(
            "SELECT id, created_at, webpage_id, job_state_code, modified_at
             FROM webpage_job WHERE job_state_code = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(JobState::Pending.as_db_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        self.set_webpage_job_state(WebpageJobId::from_uuid(row.id), JobState::Executing)
            .await?;

        let mut job: WebpageJob = row.into();
        job.job_state = JobState::Executing;
        Ok(Some(job))
    }

    pub async fn set_webpage_job_state(
        &self,
        id: WebpageJobId,
        state: JobState,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE webpage_job SET job_state_code = ?, modified_at = ? WHERE id = ?")
            .bind(state.as_db_str())
            .bind(chrono::Utc::now())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    pub async fn bulk_update_webpage_job_state(
        &self,
        old: JobState,
        new: JobState,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE webpage_job SET job_state_code = ?, modified_at = ? WHERE job_state_code = ?",
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
pub struct WebpageJobRow {
    id: Uuid,
    created_at: chrono::DateTime<chrono::Utc>,
    webpage_id: Uuid,
    job_state_code: String,
    modified_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<WebpageJobRow> for WebpageJob {
    fn from(row: WebpageJobRow) -> Self {
        Self {
            id: WebpageJobId::from_uuid(row.id),
            created_at: row.created_at,
            webpage_id: WebpageId::from_uuid(row.webpage_id),
            job_state: JobState::from_db_str(&row.job_state_code),
            modified_at: row.modified_at,
        }
    }
}
