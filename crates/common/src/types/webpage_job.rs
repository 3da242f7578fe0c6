use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{WebpageId, WebpageJobId};
use crate::types::JobState;

/// One per webpage per transfer-job enumeration; same state machine as
/// `TransferJob`. The webpage loop (C7) claims these and fans out snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebpageJob {
    pub id: WebpageJobId,
    pub created_at: DateTime<Utc>,
    pub webpage_id: WebpageId,
    pub job_state: JobState,
    pub modified_at: Option<DateTime<Utc>>,
}

impl WebpageJob {
    pub fn new(webpage_id: WebpageId) -> Self {
        Self {
            id: WebpageJobId::new(),
            created_at: Utc::now(),
            webpage_id,
            job_state: JobState::Pending,
            modified_at: None,
        }
    }
}
