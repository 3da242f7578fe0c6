use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::TransferId;

/// A user-submitted batch of URLs. Immutable after creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub created_at: DateTime<Utc>,
    /// Raw newline-separated URL blob as submitted.
    pub user_input: String,
}

impl Transfer {
    pub fn new(user_input: String) -> Self {
        Self {
            id: TransferId::new(),
            created_at: Utc::now(),
            user_input,
        }
    }
}
