use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{TransferId, TransferJobId};
use crate::types::JobState;

/// Exactly one per transfer; progresses `PENDING → EXECUTING → SUCCEEDED|FAILED`
/// as the transfer loop (C6) parses `transfer.user_input` into webpages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferJob {
    pub id: TransferJobId,
    pub created_at: DateTime<Utc>,
    pub transfer_id: TransferId,
    pub job_state: JobState,
    pub modified_at: Option<DateTime<Utc>>,
}

impl TransferJob {
    pub fn new(transfer_id: TransferId) -> Self {
        Self {
            id: TransferJobId::new(),
            created_at: Utc::now(),
            transfer_id,
            job_state: JobState::Pending,
            modified_at: None,
        }
    }
}
