//! Derivation loops (C9): promote completed snapshot outputs into webpage
//! attributes. Two near-identical loops, each with its own poll interval.
//! Idempotence comes from the selection query (the parent column is
//! already NULL), not from any conditional write here. Grounded on
//! `escriba/daemon/title.py` and `escriba/daemon/internet_archive.py`.

use std::sync::Arc;
use std::time::Duration;

use crate::store::StoreClient;

/// Matches the original's `listmany_ready_for_*_update(con, 100)` call.
const BATCH_LIMIT: i64 = 100;

pub async fn run_title(store: Arc<StoreClient>, interval: Duration) {
    loop {
        match tick_title(&store).await {
            Ok(0) => tokio::time::sleep(interval).await,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "title derivation loop iteration failed");
                tokio::time::sleep(interval).await;
            }
        }
    }
}

pub async fn tick_title(store: &StoreClient) -> escriba_common::Result<usize> {
    let ready = store
        .listmany_snapshots_ready_for_title_update(BATCH_LIMIT)
        .await?;

    for snapshot in &ready {
        let title = snapshot.stdout.as_deref().unwrap_or("").trim();
        if title.is_empty() {
            tracing::warn!(snapshot_id = %snapshot.id, "title snapshot succeeded but produced no title");
        }
        store.update_webpage_title(snapshot.webpage_id, title).await?;
        metrics::counter!("derivation.title.applied").increment(1);
    }

    Ok(ready.len())
}

pub async fn run_archive(store: Arc<StoreClient>, interval: Duration) {
    loop {
        match tick_archive(&store).await {
            Ok(0) => tokio::time::sleep(interval).await,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "archive-url derivation loop iteration failed");
                tokio::time::sleep(interval).await;
            }
        }
    }
}

pub async fn tick_archive(store: &StoreClient) -> escriba_common::Result<usize> {
    let ready = store
        .listmany_snapshots_ready_for_archivedotorg_update(BATCH_LIMIT)
        .await?;

    for snapshot in &ready {
        let archived_url = snapshot.stdout.as_deref().unwrap_or("");
        if archived_url.is_empty() {
            tracing::warn!(snapshot_id = %snapshot.id, "archivedotorg snapshot succeeded but produced no url");
        }
        store
            .update_webpage_internet_archive_url(snapshot.webpage_id, archived_url)
            .await?;
        metrics::counter!("derivation.archive_url.applied").increment(1);
    }

    Ok(ready.len())
}
