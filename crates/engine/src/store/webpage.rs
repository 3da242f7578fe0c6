use escriba_common::ids::{TransferJobId, WebpageId};
use escriba_common::types::{SplitUrl, Webpage};
use uuid::Uuid;

use super::{StoreClient, StoreError};

impl StoreClient {
    /// Upsert on URL uniqueness, always inserting the
    /// webpage/transfer-job association row. Returns the existing or new
    /// webpage id either way.
    pub async fn create_webpage(
        &self,
        url: &SplitUrl,
        transfer_job_id: TransferJobId,
    ) -> Result<WebpageId, StoreError> {
        let unsplit = url.unsplit();

        let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM webpage WHERE url = ?")
            .bind(&unsplit)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let webpage_id = match existing {
            Some((id,)) => WebpageId::from_uuid(id),
            None => {
                let id = WebpageId::new();
                sqlx::query("INSERT INTO webpage (id, url, created_at) VALUES (?, ?, ?)")
                    .bind(id.0)
                    .bind(&unsplit)
                    .bind(chrono::Utc::now())
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StoreError::Query(e.to_string()))?;
                id
            }
        };

        sqlx::query(
            "INSERT INTO webpage_transfer_job_association (webpage_id, transfer_job_id)
             VALUES (?, ?)",
        )
        .bind(webpage_id.0)
        .bind(transfer_job_id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(webpage_id)
    }

    pub async fn get_webpage(&self, id: WebpageId) -> Result<Webpage, StoreError> {
        let row = sqlx::query_as::<_, WebpageRow>(
            "SELECT id, url, created_at, title, internet_archive_url, modified_at
             FROM webpage WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?
        .ok_or_else(|| StoreError::NotFound(format!("Webpage {id}")))?;

        row.try_into()
    }

    /// Set `title` on a webpage whose title is still NULL. Called by the
    /// title derivation loop; idempotence comes from the selection query,
    /// not from this write being conditional.
    pub async fn update_webpage_title(
        &self,
        id: WebpageId,
        title: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE webpage SET title = ?, modified_at = ? WHERE id = ?")
            .bind(title)
            .bind(chrono::Utc::now())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    pub async fn update_webpage_internet_archive_url(
        &self,
        id: WebpageId,
        url: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE webpage SET internet_archive_url = ?, modified_at = ? WHERE id = ?")
            .bind(url)
            .bind(chrono::Utc::now())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct WebpageRow {
    id: Uuid,
    url: String,
    created_at: chrono::DateTime<chrono::Utc>,
    title: Option<String>,
    internet_archive_url: Option<String>,
    modified_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<WebpageRow> for Webpage {
    type Error = StoreError;

    fn try_from(row: WebpageRow) -> Result<Self, StoreError> {
        let url = SplitUrl::split(&row.url)
            .map_err(|e| StoreError::Query(format!("stored url failed to parse: {e}")))?;
        Ok(Self {
            id: WebpageId::from_uuid(row.id),
            url,
            created_at: row.created_at,
            title: row.title,
            internet_archive_url: row.internet_archive_url,
            modified_at: row.modified_at,
        })
    }
}
