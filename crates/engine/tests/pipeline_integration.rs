//! End-to-end tests for the job pipeline (C6-C9) against an in-memory
//! SQLite store, covering spec.md §8's scenarios: happy path, URL
//! deduplication, crash recovery, and title-derivation idempotence.

use escriba_common::types::{
    JobState, Snapshot, SnapshotResult, SplitUrl, Strategy, Transfer, TransferJob,
};
use escriba_engine::store::StoreClient;
use escriba_engine::{derivation_loop, snapshot_loop, transfer_loop, webpage_loop};

async fn setup() -> StoreClient {
    let store = StoreClient::connect(":memory:")
        .await
        .expect("failed to connect to in-memory store");
    store.migrate().await.expect("failed to run migrations");
    store
}

#[tokio::test]
async fn happy_path_fans_out_one_snapshot_per_strategy() {
    let store = setup().await;

    let transfer = Transfer::new("https://example.org/\n".to_string());
    store.create_transfer(&transfer).await.unwrap();
    let transfer_job = TransferJob::new(transfer.id);
    store.create_transfer_job(&transfer_job).await.unwrap();

    assert!(transfer_loop::tick(&store).await.unwrap());

    // Exactly one webpage job was fanned out; claim and run it.
    assert!(webpage_loop::tick(&store).await.unwrap());
    assert!(!webpage_loop::tick(&store).await.unwrap());

    // One snapshot per known strategy now exists, all PENDING.
    let mut seen_strategies = Vec::new();
    loop {
        let Some(snapshot) = store.claim_pending_snapshot().await.unwrap() else {
            break;
        };
        assert_eq!(snapshot.job_state, JobState::Executing);
        seen_strategies.push(snapshot.strategy);
    }
    assert_eq!(seen_strategies.len(), escriba_common::types::ALL_STRATEGIES.len());
}

#[tokio::test]
async fn deduplication_collapses_repeated_urls_in_one_transfer() {
    let store = setup().await;

    let transfer = Transfer::new("https://a/\nhttps://a/\nhttps://b/\n".to_string());
    store.create_transfer(&transfer).await.unwrap();
    let transfer_job = TransferJob::new(transfer.id);
    store.create_transfer_job(&transfer_job).await.unwrap();

    assert!(transfer_loop::tick(&store).await.unwrap());

    let mut claimed = 0;
    while webpage_loop::tick(&store).await.unwrap() {
        claimed += 1;
    }
    // Exactly two distinct webpages (one per unique URL) produced two
    // webpage jobs, despite three lines of input.
    assert_eq!(claimed, 2);
}

#[tokio::test]
async fn webpage_url_uniqueness_resolves_to_the_same_uid() {
    let store = setup().await;

    let transfer_job = TransferJob::new(escriba_common::ids::TransferId::new());
    store.create_transfer_job(&transfer_job).await.unwrap();

    let split = SplitUrl::split("https://example.org/a").unwrap();
    let first = store.create_webpage(&split, transfer_job.id).await.unwrap();
    let second = store.create_webpage(&split, transfer_job.id).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn crash_recovery_demotes_orphaned_executing_rows() {
    let store = setup().await;

    let split = SplitUrl::split("https://example.org/").unwrap();
    let transfer_job = TransferJob::new(escriba_common::ids::TransferId::new());
    store.create_transfer_job(&transfer_job).await.unwrap();
    let webpage_id = store.create_webpage(&split, transfer_job.id).await.unwrap();

    let snapshot = Snapshot::new(webpage_id, Strategy::Curl);
    store.create_snapshot(&snapshot).await.unwrap();
    store
        .set_snapshot_state(snapshot.id, JobState::Executing)
        .await
        .unwrap();

    store.recover_on_startup().await.unwrap();

    let recovered = store.get_snapshot(snapshot.id).await.unwrap();
    assert_eq!(recovered.job_state, JobState::Failed);
}

#[tokio::test]
async fn title_derivation_is_idempotent() {
    let store = setup().await;

    let split = SplitUrl::split("https://example.org/").unwrap();
    let transfer_job = TransferJob::new(escriba_common::ids::TransferId::new());
    store.create_transfer_job(&transfer_job).await.unwrap();
    let webpage_id = store.create_webpage(&split, transfer_job.id).await.unwrap();

    let mut snapshot = Snapshot::new(webpage_id, Strategy::Title);
    snapshot.job_state = JobState::Succeeded;
    snapshot.stdout = Some("  Hello  ".to_string());
    store.create_snapshot(&snapshot).await.unwrap();
    store
        .set_snapshot_result(
            snapshot.id,
            JobState::Succeeded,
            &SnapshotResult {
                rc: 0,
                help: "Work finished.".to_string(),
            },
            "  Hello  ",
            "",
        )
        .await
        .unwrap();

    assert_eq!(derivation_loop::tick_title(&store).await.unwrap(), 1);

    let webpage = store.get_webpage(webpage_id).await.unwrap();
    assert_eq!(webpage.title.as_deref(), Some("Hello"));

    // Second pass: selection query now excludes this row.
    assert_eq!(derivation_loop::tick_title(&store).await.unwrap(), 0);
}

#[tokio::test]
async fn snapshot_dispatch_reply_drives_terminal_state() {
    let store = setup().await;

    let split = SplitUrl::split("https://example.org/").unwrap();
    let transfer_job = TransferJob::new(escriba_common::ids::TransferId::new());
    store.create_transfer_job(&transfer_job).await.unwrap();
    let webpage_id = store.create_webpage(&split, transfer_job.id).await.unwrap();

    let succeeded = Snapshot::new(webpage_id, Strategy::Curl);
    store.create_snapshot(&succeeded).await.unwrap();
    let reply = vec![
        br#"{"rc":0,"help":"Work finished."}"#.to_vec(),
        b"stdout body".to_vec(),
        b"".to_vec(),
    ];
    snapshot_loop::persist(
        &store,
        snapshot_loop::DispatchOutcome {
            snapshot_id: succeeded.id,
            reply: Some(reply),
        },
    )
    .await
    .unwrap();

    let failed = Snapshot::new(webpage_id, Strategy::Curl);
    store.create_snapshot(&failed).await.unwrap();
    snapshot_loop::persist(
        &store,
        snapshot_loop::DispatchOutcome {
            snapshot_id: failed.id,
            reply: None,
        },
    )
    .await
    .unwrap();

    let succeeded = store.get_snapshot(succeeded.id).await.unwrap();
    assert_eq!(succeeded.job_state, JobState::Succeeded);
    assert_eq!(succeeded.stdout.as_deref(), Some("stdout body"));
    assert!(succeeded.result.is_some());

    // No reply (timeout) persists only the FAILED state, per spec.md §4.8
    // step 3 — `result` stays unset.
    let failed = store.get_snapshot(failed.id).await.unwrap();
    assert_eq!(failed.job_state, JobState::Failed);
    assert!(failed.result.is_none());
}
