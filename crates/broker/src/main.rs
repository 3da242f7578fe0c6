mod broker;

use broker::Broker;
use escriba_common::config::EscribaConfig;

fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
            |_| tracing_subscriber::EnvFilter::new("info"),
        ))
        .init();

    let config = match EscribaConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let _metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");

    let ctx = zmq::Context::new();
    let mut broker = match Broker::new(&ctx) {
        Ok(broker) => broker,
        Err(e) => {
            tracing::error!(error = %e, "failed to create broker socket");
            std::process::exit(1);
        }
    };

    if let Err(e) = broker.bind(&config.broker_endpoint) {
        tracing::error!(error = %e, endpoint = %config.broker_endpoint, "failed to bind broker");
        std::process::exit(1);
    }

    tracing::info!(endpoint = %config.broker_endpoint, "broker starting");
    if let Err(e) = broker.run() {
        tracing::error!(error = %e, "broker event loop exited with an error");
        std::process::exit(1);
    }
}
