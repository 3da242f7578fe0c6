//! Engine process entry point. Connects the store, recovers orphaned
//! `EXECUTING` rows left over from a crash (spec.md §3 invariant 3), then
//! runs the cooperating job-pipeline loops (C6-C9) as a fail-fast task
//! group alongside a minimal health/metrics HTTP surface (C13). Grounded
//! on the teacher's `engine/src/main.rs` fail-loudly startup convention.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::task::JoinSet;

use escriba_common::config::{EscribaConfig, LoopIntervals};
use escriba_engine::store::StoreClient;
use escriba_engine::{derivation_loop, snapshot_loop, transfer_loop, webpage_loop};

struct AppState {
    store: Arc<StoreClient>,
    metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Escriba engine starting");

    let config = match EscribaConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration — refusing to start");
            std::process::exit(1);
        }
    };

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus metrics recorder");

    let store = match StoreClient::connect(&config.db_uri).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to store");
            std::process::exit(1);
        }
    };

    if let Err(e) = store.migrate().await {
        tracing::error!(error = %e, "failed to run store migrations");
        std::process::exit(1);
    }

    if let Err(e) = store.recover_on_startup().await {
        tracing::error!(error = %e, "startup recovery failed");
        std::process::exit(1);
    }

    tracing::info!(db_uri = %config.db_uri, "store ready");

    let store = Arc::new(store);
    let intervals = LoopIntervals::default();

    let mut loops: JoinSet<&'static str> = JoinSet::new();
    {
        let store = Arc::clone(&store);
        loops.spawn(async move {
            transfer_loop::run(store, intervals.transfer_job).await;
            "transfer_job_loop"
        });
    }
    {
        let store = Arc::clone(&store);
        loops.spawn(async move {
            webpage_loop::run(store, intervals.webpage_job).await;
            "webpage_job_loop"
        });
    }
    {
        let store = Arc::clone(&store);
        let broker_endpoint = config.broker_endpoint.clone();
        loops.spawn(async move {
            snapshot_loop::run(store, broker_endpoint, intervals.snapshot_dispatch).await;
            "snapshot_dispatch_loop"
        });
    }
    {
        let store = Arc::clone(&store);
        loops.spawn(async move {
            derivation_loop::run_title(store, intervals.title_derivation).await;
            "title_derivation_loop"
        });
    }
    {
        let store = Arc::clone(&store);
        loops.spawn(async move {
            derivation_loop::run_archive(store, intervals.archive_derivation).await;
            "archive_derivation_loop"
        });
    }

    // These loops never return under normal operation, so any completion
    // is a process-fatal event — fail-fast task-group semantics (spec.md §5).
    tokio::spawn(async move {
        if let Some(result) = loops.join_next().await {
            match result {
                Ok(name) => {
                    tracing::error!(loop_name = name, "job-pipeline loop exited unexpectedly")
                }
                Err(e) => tracing::error!(error = %e, "job-pipeline loop task panicked"),
            }
            loops.abort_all();
            std::process::exit(1);
        }
    });

    let state = Arc::new(AppState {
        store,
        metrics_handle,
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    let port: u16 = std::env::var("ESCRIBA_ENGINE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8090);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("failed to bind TCP listener");

    tracing::info!(port = port, "Escriba engine listening");

    axum::serve(listener, app).await.expect("HTTP server error");
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let healthy = state.store.health_check().await.is_ok();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
        })),
    )
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
