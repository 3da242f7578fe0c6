//! Webpage-job loop (C7): enumerates strategies for a claimed webpage job
//! and creates one pending snapshot per strategy. Grounded on
//! `escriba/dao/webpage_job.py` and spec.md §4.7.

use std::sync::Arc;
use std::time::Duration;

use escriba_common::types::{JobState, Snapshot, ALL_STRATEGIES};

use crate::store::StoreClient;

pub async fn run(store: Arc<StoreClient>, interval: Duration) {
    loop {
        match tick(&store).await {
            Ok(true) => {}
            Ok(false) => tokio::time::sleep(interval).await,
            Err(e) => {
                tracing::error!(error = %e, "webpage-job loop iteration failed");
                tokio::time::sleep(interval).await;
            }
        }
    }
}

pub async fn tick(store: &StoreClient) -> escriba_common::Result<bool> {
    let Some(job) = store.claim_pending_webpage_job().await? else {
        return Ok(false);
    };

    let result: escriba_common::Result<()> = async {
        for strategy in ALL_STRATEGIES {
            let snapshot = Snapshot::new(job.webpage_id, *strategy);
            store.create_snapshot(&snapshot).await?;
        }
        Ok(())
    }
    .await;

    match result {
        Ok(()) => {
            metrics::counter!("webpage_job.succeeded").increment(1);
            store
                .set_webpage_job_state(job.id, JobState::Succeeded)
                .await?;
        }
        Err(e) => {
            tracing::error!(error = %e, webpage_job_id = %job.id, "webpage job failed");
            metrics::counter!("webpage_job.failed").increment(1);
            store
                .set_webpage_job_state(job.id, JobState::Failed)
                .await?;
        }
    }

    Ok(true)
}
