use escriba_common::ids::TransferId;
use escriba_common::types::Transfer;
use uuid::Uuid;

use super::{StoreClient, StoreError};

impl StoreClient {
    /// Look up a transfer by id; C6 reads `user_input` off of it.
    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer, StoreError> {
        let row = sqlx::query_as::<_, TransferRow>(
            "SELECT id, created_at, user_input FROM transfer WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?
        .ok_or_else(|| StoreError::NotFound(format!("Transfer {id}")))?;

        Ok(row.into())
    }

    /// Record a newly submitted batch of URLs. The dashboard normally owns
    /// this insert; exposed here so tests can seed a transfer directly.
    pub async fn create_transfer(&self, transfer: &Transfer) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO transfer (id, created_at, user_input) VALUES (?, ?, ?)")
            .bind(transfer.id.0)
            .bind(transfer.created_at)
            .bind(&transfer.user_input)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct TransferRow {
    id: Uuid,
    created_at: chrono::DateTime<chrono::Utc>,
    user_input: String,
}

impl From<TransferRow> for Transfer {
    fn from(row: TransferRow) -> Self {
        Self {
            id: TransferId::from_uuid(row.id),
            created_at: row.created_at,
            user_input: row.user_input,
        }
    }
}
