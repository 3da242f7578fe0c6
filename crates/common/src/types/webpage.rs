use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::WebpageId;
use crate::types::SplitUrl;

/// `url` is unique after normalization; the same URL submitted twice
/// resolves to the same `webpage.id` (`webpage.create` upserts on it).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Webpage {
    pub id: WebpageId,
    pub url: SplitUrl,
    pub created_at: DateTime<Utc>,
    pub title: Option<String>,
    pub internet_archive_url: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Webpage {
    pub fn new(url: SplitUrl) -> Self {
        Self {
            id: WebpageId::new(),
            url,
            created_at: Utc::now(),
            title: None,
            internet_archive_url: None,
            modified_at: None,
        }
    }
}
