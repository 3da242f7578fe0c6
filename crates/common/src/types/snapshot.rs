use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SnapshotId, WebpageId};
use crate::types::{JobState, Strategy};

/// The reply envelope an agent's helper produces: `rc` drives the
/// `SUCCEEDED`/`FAILED` terminal state, `help` is a free-text note.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotResult {
    pub rc: i32,
    pub help: String,
}

/// One per (webpage, strategy) instance; `snapshot.create` always inserts a
/// new row (unlike `webpage.create`, which upserts).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub created_at: DateTime<Utc>,
    pub webpage_id: WebpageId,
    pub strategy: Strategy,
    pub job_state: JobState,
    pub modified_at: Option<DateTime<Utc>>,
    pub result: Option<SnapshotResult>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl Snapshot {
    pub fn new(webpage_id: WebpageId, strategy: Strategy) -> Self {
        Self {
            id: SnapshotId::new(),
            created_at: Utc::now(),
            webpage_id,
            strategy,
            job_state: JobState::Pending,
            modified_at: None,
            result: None,
            stdout: None,
            stderr: None,
        }
    }
}
