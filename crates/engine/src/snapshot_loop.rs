//! Snapshot-dispatch loop (C8): the hottest-concurrency loop in the
//! pipeline. Claims one pending snapshot per iteration, dispatches it over
//! the bus on its own blocking task, and reaps whichever in-flight task
//! finishes first — interleaving dispatch and reaping every iteration.
//! Grounded on `escriba/daemon/snapshot_job_worker.py`; the
//! `FIRST_EXCEPTION` → `FIRST_COMPLETED` correction is recorded in
//! DESIGN.md.

use std::sync::Arc;
use std::time::Duration;

use escriba_common::ids::SnapshotId;
use escriba_common::types::{JobState, SnapshotResult, Strategy};
use escriba_mdp::protocol::Message;
use tokio::task::JoinSet;

use crate::store::StoreClient;

/// The outcome of one dispatched snapshot: either a full bus reply, or
/// `None` if the client timed out or the bus call itself failed.
pub struct DispatchOutcome {
    pub snapshot_id: SnapshotId,
    pub reply: Option<Message>,
}

pub async fn run(store: Arc<StoreClient>, broker_endpoint: String, interval: Duration) {
    if let Err(e) = store
        .bulk_update_snapshot_state(JobState::Executing, JobState::Failed)
        .await
    {
        tracing::error!(error = %e, "startup recovery of snapshot rows failed");
    }

    let mut in_flight: JoinSet<DispatchOutcome> = JoinSet::new();

    loop {
        let claimed = match claim_and_spawn(&store, &broker_endpoint, &mut in_flight).await {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::error!(error = %e, "snapshot-dispatch loop claim failed");
                false
            }
        };

        if !in_flight.is_empty() {
            tokio::select! {
                Some(joined) = in_flight.join_next() => {
                    match joined {
                        Ok(outcome) => {
                            if let Err(e) = persist(&store, outcome).await {
                                tracing::error!(error = %e, "failed to persist snapshot outcome");
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "snapshot dispatch task panicked"),
                    }
                }
                _ = tokio::time::sleep(interval) => {}
            }
        } else if !claimed {
            tokio::time::sleep(interval).await;
        }
    }
}

async fn claim_and_spawn(
    store: &Arc<StoreClient>,
    broker_endpoint: &str,
    in_flight: &mut JoinSet<DispatchOutcome>,
) -> escriba_common::Result<bool> {
    let Some(snapshot) = store.claim_pending_snapshot().await? else {
        return Ok(false);
    };

    let webpage = store.get_webpage(snapshot.webpage_id).await?;
    let url = webpage.url.unsplit();
    let broker_endpoint = broker_endpoint.to_string();
    let snapshot_id = snapshot.id;
    let strategy = snapshot.strategy;

    metrics::counter!("snapshot.dispatched", "strategy" => strategy.name()).increment(1);
    in_flight.spawn_blocking(move || dispatch(snapshot_id, strategy, &broker_endpoint, &url));
    Ok(true)
}

/// Opens a short-lived client (C4) timed out at the strategy's own
/// timeout, sends `(strategy.name, [strategy.name, url])`, and awaits one
/// reply. Runs on a blocking thread — the client is a synchronous ZeroMQ
/// wrapper.
fn dispatch(snapshot_id: SnapshotId, strategy: Strategy, broker_endpoint: &str, url: &str) -> DispatchOutcome {
    let reply = (|| -> escriba_mdp::Result<Option<Message>> {
        let client = escriba_mdp::Client::connect_with_timeout(
            broker_endpoint,
            strategy.timeout_seconds() as i64 * 1000,
        )?;
        let body = vec![strategy.name().as_bytes().to_vec(), url.as_bytes().to_vec()];
        client.request(strategy.name(), body)
    })();

    match reply {
        Ok(reply) => DispatchOutcome { snapshot_id, reply },
        Err(e) => {
            tracing::error!(error = %e, snapshot_id = %snapshot_id, "bus error dispatching snapshot");
            DispatchOutcome {
                snapshot_id,
                reply: None,
            }
        }
    }
}

/// Persist a completed (or timed-out) dispatch. A reply is a 3-tuple
/// `(raw_json, stdout, stderr)`; `rc == 0` is `SUCCEEDED`, anything else
/// (including no reply at all) is `FAILED`.
pub async fn persist(store: &StoreClient, outcome: DispatchOutcome) -> escriba_common::Result<()> {
    let Some(frames) = outcome.reply else {
        metrics::counter!("snapshot.timeout").increment(1);
        store
            .set_snapshot_state(outcome.snapshot_id, JobState::Failed)
            .await?;
        return Ok(());
    };

    if frames.len() < 3 {
        tracing::warn!(snapshot_id = %outcome.snapshot_id, "malformed snapshot reply, marking failed");
        store
            .set_snapshot_state(outcome.snapshot_id, JobState::Failed)
            .await?;
        return Ok(());
    }

    let raw_json = String::from_utf8_lossy(&frames[0]);
    let stdout = String::from_utf8_lossy(&frames[1]);
    let stderr = String::from_utf8_lossy(&frames[2]);

    let result: SnapshotResult = match serde_json::from_str(&raw_json) {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, snapshot_id = %outcome.snapshot_id, "snapshot result failed to parse, marking failed");
            store
                .set_snapshot_state(outcome.snapshot_id, JobState::Failed)
                .await?;
            return Ok(());
        }
    };

    let state = if result.rc == 0 {
        metrics::counter!("snapshot.succeeded").increment(1);
        JobState::Succeeded
    } else {
        metrics::counter!("snapshot.failed").increment(1);
        JobState::Failed
    };

    store
        .set_snapshot_result(outcome.snapshot_id, state, &result, &stdout, &stderr)
        .await?;
    Ok(())
}
