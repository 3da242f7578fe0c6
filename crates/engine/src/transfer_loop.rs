//! Transfer-job loop (C6): parses a transfer's raw URL blob into `webpage`
//! rows and fans out one `webpage_job` per distinct URL. Grounded on
//! `escriba/dao/transfer_job.py` for the claim/commit shape and spec.md
//! §4.6 for the split/trim/dedupe sequence.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use escriba_common::types::{JobState, SplitUrl, WebpageJob};

use crate::store::StoreClient;

pub async fn run(store: Arc<StoreClient>, interval: Duration) {
    loop {
        match tick(&store).await {
            Ok(true) => {}
            Ok(false) => tokio::time::sleep(interval).await,
            Err(e) => {
                tracing::error!(error = %e, "transfer-job loop iteration failed");
                tokio::time::sleep(interval).await;
            }
        }
    }
}

/// Returns `Ok(true)` if a job was claimed and processed (so the caller
/// should poll again immediately), `Ok(false)` if there was nothing to do.
pub async fn tick(store: &StoreClient) -> escriba_common::Result<bool> {
    let Some(job) = store.claim_pending_transfer_job().await? else {
        return Ok(false);
    };

    match process(store, &job).await {
        Ok(()) => {
            metrics::counter!("transfer_job.succeeded").increment(1);
            store
                .set_transfer_job_state(job.id, JobState::Succeeded)
                .await?;
        }
        Err(e) => {
            tracing::error!(error = %e, transfer_job_id = %job.id, "transfer job failed");
            metrics::counter!("transfer_job.failed").increment(1);
            store
                .set_transfer_job_state(job.id, JobState::Failed)
                .await?;
        }
    }

    Ok(true)
}

async fn process(
    store: &StoreClient,
    job: &escriba_common::types::TransferJob,
) -> escriba_common::Result<()> {
    let transfer = store.get_transfer(job.transfer_id).await?;

    let mut seen = HashSet::new();
    for line in transfer.user_input.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
            continue;
        }

        let split = match SplitUrl::split(trimmed) {
            Ok(split) => split,
            Err(e) => {
                tracing::warn!(url = trimmed, error = %e, "skipping unparseable url");
                continue;
            }
        };

        let webpage_id = store.create_webpage(&split, job.id).await?;
        let webpage_job = WebpageJob::new(webpage_id);
        store.create_webpage_job(&webpage_job).await?;
    }

    Ok(())
}
