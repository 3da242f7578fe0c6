use serde::{Deserialize, Serialize};

/// The state machine shared by `transfer_job`, `webpage_job`, and `snapshot`:
/// `PENDING → EXECUTING → {SUCCEEDED, FAILED}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Executing,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Executing => "EXECUTING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "EXECUTING" => Self::Executing,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            other => {
                if other != "PENDING" {
                    tracing::warn!(state = other, "unknown job state, defaulting to PENDING");
                }
                Self::Pending
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}
