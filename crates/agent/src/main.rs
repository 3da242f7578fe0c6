//! Agent (C10): the worker-side process. For each `(service_name,
//! concurrency, program_path)` entry in `ESCRIBA_SERVICES`, starts
//! `concurrency` listeners, each fronting a Worker (C3) under
//! `service_name` and forking `program_path` per request it receives.
//! Grounded on `escriba/daemon/agent.py` and `escriba/config.py`.

use std::process::Command;

use escriba_common::config::{AgentConfig, ServiceConfig};
use escriba_mdp::protocol::Message;
use escriba_mdp::Worker;
use serde::{Deserialize, Serialize};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
            |_| tracing_subscriber::EnvFilter::new("info"),
        ))
        .init();

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load agent configuration");
            std::process::exit(1);
        }
    };

    let _metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");

    tracing::info!(services = config.services.len(), "agent starting");

    let mut handles = Vec::new();
    for service in &config.services {
        for listener_index in 0..service.concurrency {
            let broker_endpoint = config.broker_endpoint.clone();
            let service = service.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                run_listener(&broker_endpoint, &service, listener_index)
            }));
        }
    }

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "agent listener task panicked");
        }
    }
}

/// One listener thread: binds a Worker under `service.name` and loops
/// forking `service.program_path` per request, until the bus gives up on
/// this worker (`recv` returns nothing) or the connection can't be made at
/// all. No graceful drain on exit — see DESIGN.md.
fn run_listener(broker_endpoint: &str, service: &ServiceConfig, listener_index: u32) {
    let mut worker = match Worker::connect(broker_endpoint, &service.name) {
        Ok(worker) => worker,
        Err(e) => {
            tracing::error!(error = %e, service = %service.name, "agent listener failed to connect");
            return;
        }
    };

    let mut reply: Option<Message> = None;
    loop {
        let request = match worker.recv(reply.take()) {
            Ok(Some(request)) => request,
            Ok(None) => {
                tracing::info!(
                    service = %service.name,
                    listener = listener_index,
                    "listener exiting, broker sent no further requests"
                );
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, service = %service.name, "agent listener recv failed");
                return;
            }
        };

        reply = Some(run_helper(&service.program_path, &request));
    }
}

/// The reply envelope an agent's helper produces (spec.md §4.10 step 4).
#[derive(Serialize, Deserialize)]
struct HelperResult {
    rc: i32,
    help: String,
}

/// Fork `program_path` with the request frames as `argv`, capture its exit
/// code, stdout, and stderr, and build the three-frame reply.
fn run_helper(program_path: &str, request: &Message) -> Message {
    let args: Vec<String> = request
        .iter()
        .map(|frame| String::from_utf8_lossy(frame).into_owned())
        .collect();

    let started = std::time::Instant::now();
    let output = Command::new(program_path).args(&args).output();

    let (rc, stdout, stderr) = match output {
        Ok(output) => (
            output.status.code().unwrap_or(-1),
            output.stdout,
            output.stderr,
        ),
        Err(e) => {
            tracing::error!(error = %e, program = program_path, "failed to spawn helper");
            (-1, Vec::new(), e.to_string().into_bytes())
        }
    };

    metrics::histogram!("agent.helper.duration", "program" => program_path.to_string())
        .record(started.elapsed().as_secs_f64());
    metrics::counter!("agent.helper.invocations", "program" => program_path.to_string()).increment(1);

    let result = HelperResult {
        rc,
        help: "Work finished.".to_string(),
    };
    let json = serde_json::to_vec(&result).unwrap_or_else(|_| b"{}".to_vec());

    vec![json, stdout, stderr]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_helper_surfaces_exit_code_and_streams() {
        let reply = run_helper("/bin/sh", &[b"-c".to_vec(), b"echo out; echo err 1>&2".to_vec()]);
        assert_eq!(reply.len(), 3);

        let result: HelperResult = serde_json::from_slice(&reply[0]).unwrap();
        assert_eq!(result.rc, 0);
        assert_eq!(String::from_utf8_lossy(&reply[1]).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&reply[2]).trim(), "err");
    }

    #[test]
    fn run_helper_surfaces_nonzero_exit_code() {
        let reply = run_helper("/bin/sh", &[b"-c".to_vec(), b"exit 7".to_vec()]);
        let result: HelperResult = serde_json::from_slice(&reply[0]).unwrap();
        assert_eq!(result.rc, 7);
    }

    #[test]
    fn run_helper_handles_missing_program() {
        let reply = run_helper("/no/such/helper-binary", &[]);
        let result: HelperResult = serde_json::from_slice(&reply[0]).unwrap();
        assert_eq!(result.rc, -1);
    }
}
